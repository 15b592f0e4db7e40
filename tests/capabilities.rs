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

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use capnp_core::capability::{Client, Promise};
use capnp_core::layout::{StructReader, StructSize};
use capnp_core::message::{self, ReaderOptions};
use capnp_core::private::capability::ClientHook;
use capnp_core::{any_pointer, serialize, Error, ErrorCategory, ErrorKind};

#[derive(Default)]
struct Counters {
    live: AtomicUsize,
    calls: AtomicU32,
}

/// Test capability that tracks how many handles to it are alive.
struct Counted {
    counters: Arc<Counters>,
}

impl Counted {
    fn new_hook(counters: &Arc<Counters>) -> Box<dyn ClientHook> {
        counters.live.fetch_add(1, Ordering::SeqCst);
        Box::new(Counted {
            counters: counters.clone(),
        })
    }
}

impl Drop for Counted {
    fn drop(&mut self) {
        self.counters.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ClientHook for Counted {
    fn add_ref(&self) -> Box<dyn ClientHook> {
        Counted::new_hook(&self.counters)
    }

    fn call(&self, _interface_id: u64, _method_id: u16) -> Promise<(), Error> {
        self.counters.calls.fetch_add(1, Ordering::SeqCst);
        Promise::ok(())
    }

    fn get_brand(&self) -> usize {
        1
    }

    fn get_ptr(&self) -> usize {
        Arc::as_ptr(&self.counters) as usize
    }
}

const HOLDER: StructSize = StructSize {
    data: 0,
    pointers: 2,
};

fn message_with_cap(hook: Box<dyn ClientHook>) -> message::Builder<message::HeapAllocator> {
    let mut message = message::Builder::new_default();
    {
        let root: any_pointer::Builder = message.init_root().unwrap();
        let root = root.init_struct(HOLDER).unwrap();
        root.get_pointer_field(0).unwrap().set_capability(hook);
    }
    message
}

#[test]
fn same_handle_shares_a_table_entry() {
    let counters = Arc::new(Counters::default());
    let hook = Counted::new_hook(&counters);
    let ptr = hook.get_ptr();

    let mut message = message::Builder::new_default();
    {
        let root: any_pointer::Builder = message.init_root().unwrap();
        let mut root = root.init_struct(HOLDER).unwrap();
        root.reborrow()
            .get_pointer_field(0)
            .unwrap()
            .set_capability(hook.add_ref());
        root.get_pointer_field(1).unwrap().set_capability(hook);
    }
    assert_eq!(message.cap_table_len(), 1);

    // Capability pointers carry only the table index on the wire.
    let segments = message.get_segments_for_output();
    assert_eq!(&segments[0][8..24], &[3, 0, 0, 0, 0, 0, 0, 0, 3, 0, 0, 0, 0, 0, 0, 0]);

    let root: StructReader = message.get_root_as_reader().unwrap();
    let client = Client::new(root.get_pointer_field(1).get_capability().unwrap());
    assert_eq!(client.hook.get_ptr(), ptr);
    assert!(!client.is_broken());
    futures::executor::block_on(client.call(0xabcd, 2)).unwrap();
    assert_eq!(counters.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn copy_into_another_message_appends_one_entry() {
    let counters = Arc::new(Counters::default());
    let source = message_with_cap(Counted::new_hook(&counters));
    let source_root: StructReader = source.get_root_as_reader().unwrap();

    let other = Arc::new(Counters::default());
    let mut target = message::Builder::new_default();
    assert_eq!(target.add_cap(Counted::new_hook(&other)), 0);

    target.set_root(source_root).unwrap();
    assert_eq!(target.cap_table_len(), 2);
    let copied = target.get_cap(1).unwrap();
    assert_eq!(copied.get_ptr(), Arc::as_ptr(&counters) as usize);

    // Each cross-message copy takes a fresh entry.
    {
        let root: any_pointer::Builder = target.get_root().unwrap();
        let root = root.get_struct(HOLDER).unwrap();
        let mut slot = root.get_pointer_field(1).unwrap();
        slot.copy_from(source_root.get_pointer_field(0)).unwrap();
    }
    assert_eq!(target.cap_table_len(), 3);

    let root: StructReader = target.get_root_as_reader().unwrap();
    let first = root.get_pointer_field(0).get_capability().unwrap();
    let second = root.get_pointer_field(1).get_capability().unwrap();
    assert_eq!(first.get_ptr(), second.get_ptr());
}

#[test]
fn absent_capabilities_read_as_broken() {
    // One struct with a single capability pointer to index 0, and no table.
    let bytes = [
        0, 0, 0, 0, 2, 0, 0, 0, //
        0, 0, 0, 0, 0, 0, 1, 0, //
        3, 0, 0, 0, 0, 0, 0, 0,
    ];
    let message = serialize::read_message(&bytes[..], ReaderOptions::new()).unwrap();
    let root: StructReader = message.get_root().unwrap();

    let client = Client::new(root.get_pointer_field(0).get_capability().unwrap());
    assert!(client.is_broken());
    let err = futures::executor::block_on(client.call(1, 0)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::CapabilityAbsent);
    assert_eq!(err.category(), ErrorCategory::CapabilityAbsent);

    // Null slots are broken too.
    let null = Client::new(root.get_pointer_field(1).get_capability().unwrap());
    assert!(null.is_broken());

    // With a table attached the same bytes resolve.
    let counters = Arc::new(Counters::default());
    let message = serialize::read_message(&bytes[..], ReaderOptions::new())
        .unwrap()
        .with_cap_table(vec![Some(Counted::new_hook(&counters))]);
    let root: StructReader = message.get_root().unwrap();
    let client = Client::new(root.get_pointer_field(0).get_capability().unwrap());
    assert!(!client.is_broken());
    futures::executor::block_on(client.call(1, 0)).unwrap();
    assert_eq!(counters.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn non_capability_pointer_is_a_type_mismatch() {
    let mut message = message::Builder::new_default();
    {
        let root: any_pointer::Builder = message.init_root().unwrap();
        let root = root.init_struct(HOLDER).unwrap();
        root.get_pointer_field(0).unwrap().set_text("not a cap").unwrap();
    }
    let root: StructReader = message.get_root_as_reader().unwrap();
    let err = root.get_pointer_field(0).get_capability().err().unwrap();
    assert_eq!(
        err.kind,
        ErrorKind::MessageContainsNonCapabilityPointerWhereCapabilityPointerWasExpected
    );
    assert_eq!(err.category(), ErrorCategory::TypeMismatch);
}

#[test]
fn every_handle_is_released() {
    let counters = Arc::new(Counters::default());
    {
        let source = message_with_cap(Counted::new_hook(&counters));
        assert_eq!(counters.live.load(Ordering::SeqCst), 1);

        let mut copy = message::Builder::new_default();
        let source_root: StructReader = source.get_root_as_reader().unwrap();
        copy.set_root(source_root).unwrap();
        assert_eq!(counters.live.load(Ordering::SeqCst), 2);

        {
            let root: any_pointer::Builder = copy.get_root().unwrap();
            let root = root.get_struct(HOLDER).unwrap();
            // Clearing the pointer leaves the table entry alone.
            root.get_pointer_field(0).unwrap().clear();
        }
        assert_eq!(copy.cap_table_len(), 1);

        let reader = source.into_reader();
        let root: StructReader = reader.get_root().unwrap();
        let client = Client::new(root.get_pointer_field(0).get_capability().unwrap());
        let cloned = client.clone();
        assert_eq!(counters.live.load(Ordering::SeqCst), 5);
        drop(cloned);
        drop(client);
        assert_eq!(counters.live.load(Ordering::SeqCst), 3);
    }
    assert_eq!(counters.live.load(Ordering::SeqCst), 0);
}
