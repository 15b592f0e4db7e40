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

//! Capability handles as they appear to users of a message.
//!
//! A message stores capabilities in a per-message table; pointers hold indexes
//! into it. This module provides the owned handle type, the promise returned by
//! calls, and the broken client that stands in for absent capabilities.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Poll;

use crate::private::capability::ClientHook;
use crate::private::layout::{PointerBuilder, PointerReader};
use crate::traits::{FromPointerBuilder, FromPointerReader, SetPointerBuilder};
use crate::{Error, ErrorKind, Result};

/// A computation that might eventually resolve to a value of type `T` or to an error
///  of type `E`. Dropping the promise cancels the computation.
#[must_use = "futures do nothing unless polled"]
pub struct Promise<T, E> {
    inner: PromiseInner<T, E>,
}

enum PromiseInner<T, E> {
    Immediate(std::result::Result<T, E>),
    Deferred(Pin<Box<dyn Future<Output = std::result::Result<T, E>> + 'static>>),
    Empty,
}

// Allow Promise<T,E> to be Unpin, regardless of whether T and E are.
impl<T, E> Unpin for PromiseInner<T, E> {}

impl<T, E> Promise<T, E> {
    pub fn ok(value: T) -> Promise<T, E> {
        Promise {
            inner: PromiseInner::Immediate(Ok(value)),
        }
    }

    pub fn err(error: E) -> Promise<T, E> {
        Promise {
            inner: PromiseInner::Immediate(Err(error)),
        }
    }

    pub fn from_future<F>(f: F) -> Promise<T, E>
    where
        F: Future<Output = std::result::Result<T, E>> + 'static,
    {
        Promise {
            inner: PromiseInner::Deferred(Box::pin(f)),
        }
    }
}

impl<T, E> Future for Promise<T, E> {
    type Output = std::result::Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut std::task::Context) -> Poll<Self::Output> {
        match self.get_mut().inner {
            PromiseInner::Empty => panic!("Promise polled after done."),
            ref mut imm @ PromiseInner::Immediate(_) => {
                match std::mem::replace(imm, PromiseInner::Empty) {
                    PromiseInner::Immediate(r) => Poll::Ready(r),
                    _ => unreachable!(),
                }
            }
            PromiseInner::Deferred(ref mut f) => f.as_mut().poll(cx),
        }
    }
}

/// An untyped client.
pub struct Client {
    pub hook: Box<dyn ClientHook>,
}

impl Client {
    pub fn new(hook: Box<dyn ClientHook>) -> Client {
        Client { hook }
    }

    /// Calls `method_id` of interface `interface_id` on the underlying capability.
    pub fn call(&self, interface_id: u64, method_id: u16) -> Promise<(), Error> {
        self.hook.call(interface_id, method_id)
    }

    /// True if this handle stands in for a missing capability.
    pub fn is_broken(&self) -> bool {
        self.hook.get_brand() == BROKEN_BRAND
    }
}

impl Clone for Client {
    fn clone(&self) -> Client {
        Client {
            hook: self.hook.add_ref(),
        }
    }
}

impl<'a> FromPointerReader<'a> for Client {
    fn get_from_pointer(reader: &PointerReader<'a>) -> Result<Client> {
        Ok(Client::new(reader.get_capability()?))
    }
}

impl<'a> FromPointerBuilder<'a> for Client {
    fn init_pointer(_builder: PointerBuilder<'a>, _size: u32) -> Result<Client> {
        Err(Error::failed(
            "capabilities cannot be initialized; use set_capability()".to_string(),
        ))
    }

    fn get_from_pointer(builder: PointerBuilder<'a>) -> Result<Client> {
        Ok(Client::new(builder.get_capability()?))
    }
}

impl SetPointerBuilder for Client {
    fn set_pointer_builder(mut pointer: PointerBuilder<'_>, value: Client) -> Result<()> {
        pointer.set_capability(value.hook);
        Ok(())
    }
}

/// Brand reported by broken clients. Real connections use the address of their state.
const BROKEN_BRAND: usize = 0;

struct BrokenInner {
    error: Error,
}

/// A capability that fails every call with the error it was created with.
struct Broken {
    inner: Arc<BrokenInner>,
}

impl ClientHook for Broken {
    fn add_ref(&self) -> Box<dyn ClientHook> {
        Box::new(Broken {
            inner: self.inner.clone(),
        })
    }

    fn call(&self, _interface_id: u64, _method_id: u16) -> Promise<(), Error> {
        Promise::err(self.inner.error.clone())
    }

    fn get_brand(&self) -> usize {
        BROKEN_BRAND
    }

    fn get_ptr(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }
}

/// Returns a hook whose calls fail with `CapabilityAbsent` and `reason`.
pub fn new_broken_hook(reason: &str) -> Box<dyn ClientHook> {
    let mut error = Error::from_kind(ErrorKind::CapabilityAbsent);
    error.extend_message(reason);
    Box::new(Broken {
        inner: Arc::new(BrokenInner { error }),
    })
}

pub fn new_broken_client(reason: &str) -> Client {
    Client::new(new_broken_hook(reason))
}

#[cfg(test)]
mod tests {
    use super::{new_broken_client, Promise};
    use crate::{ErrorCategory, ErrorKind};

    #[test]
    fn broken_client_fails_calls() {
        let client = new_broken_client("no handle");
        assert!(client.is_broken());
        let err = futures::executor::block_on(client.call(0x1234, 3)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CapabilityAbsent);
        assert_eq!(err.category(), ErrorCategory::CapabilityAbsent);
        assert!(err.to_string().contains("no handle"));
    }

    #[test]
    fn clones_share_identity() {
        let client = new_broken_client("x");
        let other = client.clone();
        assert_eq!(client.hook.get_ptr(), other.hook.get_ptr());
        assert_ne!(client.hook.get_ptr(), new_broken_client("x").hook.get_ptr());
    }

    #[test]
    fn deferred_promise() {
        let promise: Promise<u32, ()> = Promise::from_future(async { Ok(7) });
        assert_eq!(futures::executor::block_on(promise), Ok(7));
        let promise: Promise<u32, ()> = Promise::ok(3);
        assert_eq!(futures::executor::block_on(promise), Ok(3));
    }
}
