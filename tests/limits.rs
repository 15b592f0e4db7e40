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

use capnp_core::layout::{StructReader, StructSize};
use capnp_core::message::{self, HeapAllocator, ReaderOptions, SingleSegmentAllocator};
use capnp_core::{any_pointer, primitive_list, serialize, ErrorCategory, ErrorKind};

fn flat_message(words: &[[u8; 8]]) -> Vec<u8> {
    let mut bytes = vec![0, 0, 0, 0];
    bytes.extend_from_slice(&(words.len() as u32).to_le_bytes());
    for word in words {
        bytes.extend_from_slice(word);
    }
    bytes
}

// Four pointers that all reference the same eight-word struct.
fn amplified_struct() -> Vec<u8> {
    let mut words = vec![[0, 0, 0, 0, 0, 0, 4, 0]];
    for p in 1..5u8 {
        words.push([(4 - p) << 2, 0, 0, 0, 8, 0, 0, 0]);
    }
    for i in 0..8u8 {
        words.push([i + 1; 8]);
    }
    flat_message(&words)
}

#[test]
fn repeated_reads_are_charged() {
    let bytes = amplified_struct();

    let mut options = ReaderOptions::new();
    options.traversal_limit_in_words(20);
    let message = serialize::read_message_from_flat_slice(&mut &bytes[..], options).unwrap();
    let root: StructReader = message.get_root().unwrap();
    let first = root.get_pointer_field(0).get_struct().unwrap();
    assert_eq!(first.get_data_field::<u8>(0), 1);

    let err = root.get_pointer_field(1).get_struct().err().unwrap();
    assert_eq!(err.kind, ErrorKind::ReadLimitExceeded);
    assert_eq!(err.category(), ErrorCategory::ResourceLimit);

    // The same bytes pass under the default budget.
    let message =
        serialize::read_message_from_flat_slice(&mut &bytes[..], ReaderOptions::new()).unwrap();
    let root: StructReader = message.get_root().unwrap();
    for i in 0..4 {
        let inner = root.get_pointer_field(i).get_struct().unwrap();
        assert_eq!(inner.get_data_field::<u8>(56), 8);
    }
}

#[test]
fn void_lists_are_charged_by_element_count() {
    // A list of 1000 voids occupies no words at all.
    let bytes = flat_message(&[[1, 0, 0, 0, 0x40, 0x1f, 0, 0]]);

    let mut options = ReaderOptions::new();
    options.traversal_limit_in_words(100);
    let message = serialize::read_message_from_flat_slice(&mut &bytes[..], options).unwrap();
    let err = message
        .get_root::<primitive_list::Reader<()>>()
        .err()
        .unwrap();
    assert_eq!(err.kind, ErrorKind::ReadLimitExceeded);

    let message =
        serialize::read_message_from_flat_slice(&mut &bytes[..], ReaderOptions::new()).unwrap();
    let voids: primitive_list::Reader<()> = message.get_root().unwrap();
    assert_eq!(voids.len(), 1000);
}

#[test]
fn nesting_depth_is_bounded() {
    let mut builder = message::Builder::new_default();
    {
        let root: any_pointer::Builder = builder.init_root().unwrap();
        let link = StructSize {
            data: 0,
            pointers: 1,
        };
        let root = root.init_struct(link).unwrap();
        let child = root.get_pointer_field(0).unwrap().init_struct(link).unwrap();
        let mut leaf = child
            .get_pointer_field(0)
            .unwrap()
            .init_struct(StructSize {
                data: 1,
                pointers: 0,
            })
            .unwrap();
        leaf.set_data_field::<u16>(0, 77);
    }
    let bytes = serialize::write_message_to_bytes(&builder).unwrap();

    let mut options = ReaderOptions::new();
    options.nesting_limit(2);
    let message = serialize::read_message(&bytes[..], options).unwrap();
    let root: StructReader = message.get_root().unwrap();
    let child = root.get_pointer_field(0).get_struct().unwrap();
    let err = child.get_pointer_field(0).get_struct().err().unwrap();
    assert_eq!(err.kind, ErrorKind::MessageIsTooDeeplyNested);

    options.nesting_limit(3);
    let message = serialize::read_message(&bytes[..], options).unwrap();
    let root: StructReader = message.get_root().unwrap();
    let leaf = root
        .get_pointer_field(0)
        .get_struct()
        .unwrap()
        .get_pointer_field(0)
        .get_struct()
        .unwrap();
    assert_eq!(leaf.get_data_field::<u16>(0), 77);
}

#[test]
fn hostile_segment_tables() {
    let too_many = [0xff, 0x01, 0, 0, 0, 0, 0, 0];
    let err = serialize::read_message(&too_many[..], ReaderOptions::new())
        .err()
        .unwrap();
    assert_eq!(err.kind, ErrorKind::TooManySegments(512));

    let wrapped = [0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0];
    let err = serialize::read_message(&wrapped[..], ReaderOptions::new())
        .err()
        .unwrap();
    assert_eq!(err.kind, ErrorKind::InvalidNumberOfSegments(0));

    let huge = [0, 0, 0, 0, 0xff, 0xff, 0, 0];
    let mut options = ReaderOptions::new();
    options.traversal_limit_in_words(1000);
    let err = serialize::read_message(&huge[..], options).err().unwrap();
    assert_eq!(err.kind, ErrorKind::MessageTooLarge(0xffff));
    assert_eq!(err.category(), ErrorCategory::ResourceLimit);
}

#[test]
fn truncated_input() {
    let mut bytes = flat_message(&[[0; 8]; 4]);
    bytes.truncate(16);

    let err = serialize::read_message_from_flat_slice(&mut &bytes[..], ReaderOptions::new())
        .err()
        .unwrap();
    assert_eq!(err.kind, ErrorKind::MessageEndsPrematurely(4, 1));
    assert_eq!(err.category(), ErrorCategory::Format);

    let err = serialize::read_message(&bytes[..], ReaderOptions::new())
        .err()
        .unwrap();
    assert_eq!(err.kind, ErrorKind::PrematureEndOfFile);

    assert!(serialize::try_read_message(&b""[..], ReaderOptions::new())
        .unwrap()
        .is_none());
}

#[test]
fn heap_allocator_respects_size_limit() {
    let mut builder = message::Builder::new(HeapAllocator::new().max_message_words(16));
    let root: any_pointer::Builder = builder.init_root().unwrap();
    let err = root
        .into_pointer_builder()
        .init_data(20 * 8)
        .err()
        .unwrap();
    assert_eq!(err.kind, ErrorKind::MessageSizeLimitExceeded);

    let mut builder = message::Builder::new(HeapAllocator::new().max_message_words(16));
    let root: any_pointer::Builder = builder.init_root().unwrap();
    let data = root.into_pointer_builder().init_data(10 * 8).unwrap();
    data[79] = 1;
}

#[test]
fn single_segment_allocator_grows_in_place() {
    let mut builder = message::Builder::new(SingleSegmentAllocator::new().first_segment_words(2));
    {
        let root: any_pointer::Builder = builder.init_root().unwrap();
        let mut text = root.into_pointer_builder().init_text(100).unwrap();
        for _ in 0..100 {
            text.push_ascii(b'z');
        }
    }
    let segments = builder.get_segments_for_output();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].len(), 14 * 8);

    let reader: any_pointer::Reader = builder.get_root_as_reader().unwrap();
    assert_eq!(reader.get_as::<&str>().unwrap().len(), 100);

    let mut bounded = message::Builder::new(
        SingleSegmentAllocator::new()
            .first_segment_words(2)
            .max_message_words(8),
    );
    let root: any_pointer::Builder = bounded.init_root().unwrap();
    let err = root.into_pointer_builder().init_text(100).err().unwrap();
    assert_eq!(err.kind, ErrorKind::MessageSizeLimitExceeded);
}

fn four_word_struct() -> Vec<u8> {
    let mut builder = message::Builder::new_default();
    {
        let root: any_pointer::Builder = builder.init_root().unwrap();
        let mut root = root
            .init_struct(StructSize {
                data: 4,
                pointers: 0,
            })
            .unwrap();
        for i in 0..4 {
            root.set_data_field::<u64>(i, 100 + i as u64);
        }
    }
    serialize::write_message_to_bytes(&builder).unwrap()
}

fn sum_root(message: &message::Reader<serialize::OwnedSegments>) -> capnp_core::Result<u64> {
    let root: StructReader = message.get_root()?;
    Ok((0..4).map(|i| root.get_data_field::<u64>(i)).sum())
}

#[test]
fn one_reader_serves_many_threads() {
    let bytes = four_word_struct();
    let message = serialize::read_message(&bytes[..], ReaderOptions::new()).unwrap();

    let sums: Vec<u64> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| sum_root(&message).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(sums, vec![406; 4]);
}

#[test]
fn threads_draw_from_one_traversal_budget() {
    let bytes = four_word_struct();
    let mut options = ReaderOptions::new();
    options.traversal_limit_in_words(10);
    let message = serialize::read_message(&bytes[..], options).unwrap();

    // Every full read costs at least four words, so at most two of them fit.
    let results: Vec<capnp_core::Result<u64>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4).map(|_| scope.spawn(|| sum_root(&message))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert!(successes <= 2);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| e.kind == ErrorKind::ReadLimitExceeded));
    assert!(results.iter().all(|r| r.as_ref().map_or(true, |&sum| sum == 406)));
}
