//! Pending text buffer between producers and the flusher
//!
//! Producers append formatted records; the flusher swaps the whole buffer
//! out in one step. The lock is held only for those two operations.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Shared accumulation string for records not yet written to listeners
#[derive(Debug, Default)]
pub struct PendingBuffer {
    text: Mutex<String>,
}

impl PendingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, String> {
        self.text.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a formatted record
    pub fn append(&self, record: &str) {
        self.lock().push_str(record);
    }

    /// Take everything appended so far, leaving the buffer empty
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.lock())
    }

    /// Length in bytes of the pending text
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_append_and_take() {
        let buffer = PendingBuffer::new();
        buffer.append("one;\n");
        buffer.append("two;\n");
        assert_eq!(buffer.len(), 10);

        assert_eq!(buffer.take(), "one;\ntwo;\n");
        assert!(buffer.is_empty());
        assert_eq!(buffer.take(), "");
    }

    #[test]
    fn test_concurrent_appends_are_not_lost() {
        let buffer = Arc::new(PendingBuffer::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let buffer = Arc::clone(&buffer);
                thread::spawn(move || {
                    for j in 0..100 {
                        buffer.append(&format!("{}-{};\n", i, j));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let text = buffer.take();
        assert_eq!(text.matches(";\n").count(), 800);
        assert!(buffer.is_empty());
    }
}
