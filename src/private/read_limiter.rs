// Copyright (c) 2013-2015 Sandstorm Development Group, Inc. and contributors
// Licensed under the MIT License:
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::{Error, ErrorKind, Result};

/// Remaining traversal budget of a reader, in words. Threads reading the same
/// message draw from one shared budget.
pub struct ReadLimiter {
    limit: AtomicUsize,
}

impl ReadLimiter {
    pub fn new(limit: u64) -> ReadLimiter {
        ReadLimiter {
            limit: AtomicUsize::new(usize::try_from(limit).unwrap_or(usize::MAX)),
        }
    }

    #[inline]
    pub fn can_read(&self, amount: u64) -> Result<()> {
        let taken = self
            .limit
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                usize::try_from(amount)
                    .ok()
                    .and_then(|amount| current.checked_sub(amount))
            });
        match taken {
            Ok(_) => Ok(()),
            Err(current) => {
                tracing::warn!(requested = amount, remaining = current, "read limit exceeded");
                Err(Error::from_kind(ErrorKind::ReadLimitExceeded))
            }
        }
    }

    pub fn remaining(&self) -> u64 {
        self.limit.load(Ordering::Relaxed) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::ReadLimiter;
    use crate::ErrorKind;

    #[test]
    fn exhausts() {
        let limiter = ReadLimiter::new(10);
        limiter.can_read(4).unwrap();
        limiter.can_read(6).unwrap();
        assert_eq!(limiter.remaining(), 0);
        assert_eq!(limiter.can_read(1).unwrap_err().kind, ErrorKind::ReadLimitExceeded);
        limiter.can_read(0).unwrap();
    }

    #[test]
    fn failed_read_takes_nothing() {
        let limiter = ReadLimiter::new(5);
        assert!(limiter.can_read(6).is_err());
        assert!(limiter.can_read(u64::MAX).is_err());
        assert_eq!(limiter.remaining(), 5);
    }

    #[test]
    fn threads_share_one_budget() {
        let limiter = ReadLimiter::new(1000);
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..250 {
                        limiter.can_read(1).unwrap();
                    }
                });
            }
        });
        assert_eq!(limiter.remaining(), 0);
        assert!(limiter.can_read(1).is_err());
    }
}
