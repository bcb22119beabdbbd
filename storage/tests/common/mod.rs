use std::thread;
use std::time::Duration;

use storage::{Result, StoreError};

/// Open a sled directory that may still be locked by a handle dropped a
/// moment ago. sled releases the file lock once its flusher thread exits.
pub fn retry_open<T>(open: impl Fn() -> Result<T>) -> T {
    for _ in 0..100 {
        match open() {
            Ok(value) => return value,
            Err(StoreError::Database(message)) if message.contains("lock") => {
                thread::sleep(Duration::from_millis(20));
            }
            Err(err) => panic!("open failed: {err}"),
        }
    }
    panic!("database still locked after 2s");
}
