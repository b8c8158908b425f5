//! Pool of reusable record encoders.

use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use strongbox_codec::RecordEncoder;
use tracing::trace;

/// A store-wide pool of [`RecordEncoder`]s.
///
/// Encoders are handed out as [`PooledEncoder`] guards and return to the
/// pool when the guard drops, on success and error paths alike. An encoder
/// whose buffer reached `retain_limit` bytes is dropped instead, and at
/// most `max_idle` encoders are kept.
#[derive(Debug)]
pub struct EncoderPool {
    idle: Mutex<Vec<RecordEncoder>>,
    retain_limit: usize,
    max_idle: usize,
}

impl EncoderPool {
    /// Creates an empty pool.
    pub fn new(retain_limit: usize, max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            retain_limit,
            max_idle,
        }
    }

    /// Takes an encoder from the pool, or creates one.
    pub fn acquire(&self) -> PooledEncoder<'_> {
        let encoder = self.idle.lock().pop().unwrap_or_default();
        PooledEncoder {
            encoder,
            pool: self,
        }
    }

    /// Number of idle encoders.
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    fn release(&self, mut encoder: RecordEncoder) {
        if encoder.capacity() >= self.retain_limit {
            trace!(capacity = encoder.capacity(), "dropping oversized encoder");
            return;
        }
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            encoder.reset();
            idle.push(encoder);
        }
    }
}

/// An encoder borrowed from an [`EncoderPool`].
pub struct PooledEncoder<'a> {
    encoder: RecordEncoder,
    pool: &'a EncoderPool,
}

impl Deref for PooledEncoder<'_> {
    type Target = RecordEncoder;

    fn deref(&self) -> &RecordEncoder {
        &self.encoder
    }
}

impl DerefMut for PooledEncoder<'_> {
    fn deref_mut(&mut self) -> &mut RecordEncoder {
        &mut self.encoder
    }
}

impl Drop for PooledEncoder<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.encoder));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoders_are_reused() {
        let pool = EncoderPool::new(1024, 4);
        {
            let mut encoder = pool.acquire();
            encoder.encode(1, "abc").unwrap();
        }
        assert_eq!(pool.idle(), 1);

        let encoder = pool.acquire();
        assert!(encoder.is_empty());
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn oversized_encoders_are_dropped() {
        let pool = EncoderPool::new(64, 4);
        {
            let mut encoder = pool.acquire();
            encoder.encode(1, &vec![7u8; 256]).unwrap();
            assert!(encoder.capacity() >= 64);
        }
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn idle_count_is_bounded() {
        let pool = EncoderPool::new(1024, 2);
        let guards: Vec<_> = (0..5).map(|_| pool.acquire()).collect();
        drop(guards);
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn released_on_error_path() {
        let pool = EncoderPool::new(1024, 4);
        let result: Result<(), ()> = (|| {
            let _encoder = pool.acquire();
            Err(())
        })();
        assert!(result.is_err());
        assert_eq!(pool.idle(), 1);
    }

    proptest::proptest! {
        #[test]
        fn pool_keeps_only_small_encoders(
            sizes in proptest::collection::vec(0usize..2048, 1..20),
            max_idle in 0usize..4,
        ) {
            let pool = EncoderPool::new(512, max_idle);
            let guards: Vec<_> = sizes
                .iter()
                .map(|size| {
                    let mut encoder = pool.acquire();
                    encoder.encode(1, &vec![0u8; *size]).unwrap();
                    encoder
                })
                .collect();
            drop(guards);

            proptest::prop_assert!(pool.idle() <= max_idle);
            let held: Vec<_> = (0..pool.idle()).map(|_| pool.acquire()).collect();
            for encoder in &held {
                proptest::prop_assert!(encoder.capacity() < 512);
                proptest::prop_assert!(encoder.is_empty());
            }
        }
    }
}
