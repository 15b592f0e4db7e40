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

//! Hooks that a capability implementation plugs into a message's capability table.

use crate::capability::Promise;
use crate::Error;

/// Hooks live in a message's capability table, which readers on any thread may share.
pub trait ClientHook: Send + Sync {
    /// Returns a new reference to the same capability.
    fn add_ref(&self) -> Box<dyn ClientHook>;

    /// Starts a call of `method_id` on interface `interface_id`. Parameters and
    /// results travel outside of this layer.
    fn call(&self, interface_id: u64, method_id: u16) -> Promise<(), Error>;

    /// If this capability is associated with an rpc connection, then this method
    /// returns an identifier for that connection.
    fn get_brand(&self) -> usize;

    /// Returns a (locally) unique identifier for this capabilitiy.
    fn get_ptr(&self) -> usize;
}

impl Clone for Box<dyn ClientHook> {
    fn clone(&self) -> Self {
        self.add_ref()
    }
}

/// A message's capability table. A slot is `None` once its handle has been released.
pub type CapTable = Vec<Option<Box<dyn ClientHook>>>;

/// Returns a new reference to the handle at `index`, if there is one.
pub fn extract_cap(table: &CapTable, index: usize) -> Option<Box<dyn ClientHook>> {
    match table.get(index) {
        Some(Some(hook)) => Some(hook.add_ref()),
        _ => None,
    }
}
