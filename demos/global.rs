//! Runs ordinary std code on top of [`GlobalArena`]: every `Box`, `Vec` and
//! `String` below is carved out of the static `HEAP` buffer.

use std::thread;

use arenalloc::{Arena, GlobalArena};

const HEAP_SIZE: usize = 4 * 1024 * 1024;

static mut HEAP: [u8; HEAP_SIZE] = [0; HEAP_SIZE];

#[global_allocator]
static ALLOCATOR: GlobalArena =
    GlobalArena::new(unsafe { Arena::from_raw_parts(&raw mut HEAP as *mut u8, HEAP_SIZE) });

fn main() {
    // Box example
    let val_box = Box::new(22);
    println!("Box Value: {}, At: {:p}", val_box, val_box);

    // Vec example
    let mut v = Vec::new();
    for i in 0..5 {
        v.push(i * 10);
        println!("Added {}; Capacity: {}; At: {:p}", v[i], v.capacity(), v.as_ptr());
    }

    // String example
    let msg = String::from("Heap Testing");
    println!("\nString '{}' - At: {:p}", msg, msg.as_ptr());

    // Merge example
    let a = Box::new([0u8; 64]);
    let b = Box::new([0u8; 64]);
    let ptr_a = a.as_ptr();

    drop(b);
    drop(a);

    let c = Box::new([0u8; 128]);
    println!("A was at {:p}, C is at {:p}", ptr_a, c.as_ptr());

    // Thread example, the spin lock serializes both threads.
    let t1 = thread::spawn(|| Box::new(222));
    let t2 = thread::spawn(|| Box::new(333));

    println!("Threads returned {} and {}", t1.join().unwrap(), t2.join().unwrap());

    // Printing may allocate, so don't hold the lock across it.
    let (stats, check) = {
        let heap = ALLOCATOR.lock();
        (heap.stats(), heap.check())
    };
    println!("{stats:?}, check: {check:?}");
}
