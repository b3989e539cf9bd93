//! LazyBox Usage Examples
//!
//! Demonstrates lazily computed struct fields shared across threads.

use lazybox::LazyBox;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

static METADATA_LOADS: AtomicUsize = AtomicUsize::new(0);

struct Image {
    path: String,
    metadata: LazyBox<HashMap<String, String>, Box<dyn FnOnce() -> HashMap<String, String> + Send>>,
}

impl Image {
    fn open(path: &str) -> Self {
        let owned = path.to_string();
        Self {
            path: path.to_string(),
            metadata: LazyBox::new(Box::new(move || {
                METADATA_LOADS.fetch_add(1, Ordering::SeqCst);
                println!("  Parsing metadata for {}...", owned);
                // Loading and parsing the file would happen here.
                let mut meta = HashMap::new();
                meta.insert("path".to_string(), owned.clone());
                meta.insert("format".to_string(), owned.rsplit('.').next().unwrap_or("").to_string());
                meta
            })),
        }
    }

    fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }
}

fn main() {
    println!("LazyBox Usage Examples");
    println!("======================");

    // Example 1: counter computed once
    println!("\n1. Single Computation:");
    let counter = AtomicUsize::new(0);
    let lazy = LazyBox::new(|| {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        n * 10
    });
    println!("  First read: {}", lazy.value());
    println!("  Second read: {}", lazy.value());
    println!("  Computations: {}", counter.load(Ordering::SeqCst));

    // Example 2: lazily computed struct field
    println!("\n2. Lazy Struct Field:");
    let image = Arc::new(Image::open("holiday.png"));
    println!("  Opened {} (metadata computed: {})", image.path, image.metadata.is_computed());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let image = Arc::clone(&image);
            thread::spawn(move || {
                let format = image.metadata()["format"].clone();
                println!("  Thread {} sees format {}", i, format);
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("reader thread panicked");
    }
    println!("  Metadata loads: {}", METADATA_LOADS.load(Ordering::SeqCst));

    // Example 3: poisoning
    println!("\n3. Failed Computation:");
    let broken = LazyBox::new(|| -> u32 { panic!("corrupt header") });
    let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| broken.value()));
    println!("  Poisoned: {}", broken.is_poisoned());
    match broken.try_force() {
        Ok(v) => println!("  Unexpected value {}", v),
        Err(e) => println!("  try_force: {}", e),
    }
}
