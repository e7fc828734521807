//! Process-scoped memoization.
//!
//! A [`Memo`] computes a value at most once per process lifetime and hands
//! out the cached result afterwards, no matter how many call sites ask.
//! The cache lives in memory only; a restarted process recomputes.

use std::sync::Mutex;

/// A compute-once cell.
///
/// The first successful computation is stored, including "no result" values
/// like `None`. A failed computation is returned to the caller and NOT
/// cached, so a transient failure can succeed on a later call within the
/// same process.
#[derive(Debug, Default)]
pub struct Memo<T> {
    cell: Mutex<Option<T>>,
}

impl<T: Clone> Memo<T> {
    pub fn new() -> Self {
        Self {
            cell: Mutex::new(None),
        }
    }

    /// Return the cached value, or run `compute` and cache its result.
    pub fn get_or_init(&self, compute: impl FnOnce() -> T) -> T {
        self.get_or_try_init(|| Ok::<T, std::convert::Infallible>(compute()))
            .unwrap_or_else(|never| match never {})
    }

    /// Return the cached value, or run `compute`; an `Ok` result is cached,
    /// an `Err` is passed through uncached.
    pub fn get_or_try_init<E>(&self, compute: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        // A poisoning panic can only have happened before the cell was
        // written, so recomputing is always sound.
        let mut guard = match self.cell.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(value) = guard.as_ref() {
            return Ok(value.clone());
        }
        let value = compute()?;
        *guard = Some(value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn computes_exactly_once() {
        let calls = AtomicU32::new(0);
        let memo = Memo::new();
        for _ in 0..5 {
            let value = memo.get_or_init(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                42u32
            });
            assert_eq!(value, 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn caches_none_as_a_result() {
        let calls = AtomicU32::new(0);
        let memo: Memo<Option<String>> = Memo::new();
        for _ in 0..3 {
            let value = memo.get_or_init(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                None
            });
            assert!(value.is_none());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn does_not_cache_failures() {
        let calls = AtomicU32::new(0);
        let memo: Memo<u32> = Memo::new();

        let first: Result<u32, &str> = memo.get_or_try_init(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("store offline")
        });
        assert!(first.is_err());

        // The failure was not cached; the next call computes again and its
        // success is what sticks.
        let second: Result<u32, &str> = memo.get_or_try_init(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        });
        assert_eq!(second, Ok(7));

        let third: Result<u32, &str> = memo.get_or_try_init(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(99)
        });
        assert_eq!(third, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn shared_across_threads() {
        use std::sync::Arc;
        let calls = Arc::new(AtomicU32::new(0));
        let memo = Arc::new(Memo::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let memo = Arc::clone(&memo);
                let calls = Arc::clone(&calls);
                std::thread::spawn(move || {
                    memo.get_or_init(|| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        "resolved".to_string()
                    })
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), "resolved");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
