use parking_lot::Mutex;
use std::sync::Arc;

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// Swaps the whole value in a single lock acquisition and returns the old one.
pub fn replace<T>(slot: &Shared<T>, value: T) -> T {
    std::mem::replace(&mut *slot.lock(), value)
}
