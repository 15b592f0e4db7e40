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

use capnp_core::layout::{ElementSize, StructReader, StructSize};
use capnp_core::message::{self, AllocationStrategy, HeapAllocator, ReaderOptions};
use capnp_core::{any_pointer, primitive_list, serialize, text};

#[test]
fn text_field_matches_reference_bytes() {
    let mut message = message::Builder::new_default();
    {
        let root: any_pointer::Builder = message.init_root().unwrap();
        let root = root
            .init_struct(StructSize {
                data: 0,
                pointers: 2,
            })
            .unwrap();
        root.get_pointer_field(0).unwrap().set_text("abc").unwrap();
    }

    let bytes = serialize::write_message_to_bytes(&message).unwrap();
    assert_eq!(
        bytes,
        vec![
            0, 0, 0, 0, 4, 0, 0, 0, // segment table
            0, 0, 0, 0, 0, 0, 2, 0, // root struct pointer
            5, 0, 0, 0, 34, 0, 0, 0, // text pointer
            0, 0, 0, 0, 0, 0, 0, 0, // null pointer
            97, 98, 99, 0, 0, 0, 0, 0, // "abc" and NUL
        ]
    );
    assert_eq!(serialize::compute_serialized_size_in_words(&message), 5);

    let reader =
        serialize::read_message_from_flat_slice(&mut &bytes[..], ReaderOptions::new()).unwrap();
    let root: StructReader = reader.get_root().unwrap();
    assert_eq!(root.get_pointer_field(0).get_text().unwrap(), "abc");
    assert!(root.get_pointer_field(1).is_null());
}

#[test]
fn sixty_six_bools() {
    let mut message = message::Builder::new_default();
    {
        let root: any_pointer::Builder = message.init_root().unwrap();
        let mut list = root.initn_as::<primitive_list::Builder<bool>>(66).unwrap();
        list.set(64, true).unwrap();
        list.set(65, true).unwrap();
    }

    let segments = message.get_segments_for_output();
    let segment = segments[0];
    // Root pointer, then ceil(66 / 8) = 9 payload bytes padded to two words.
    assert_eq!(segment.len(), 3 * 8);
    assert_eq!(&segment[0..8], &[1, 0, 0, 0, (66 << 3 | 1) as u8, 2, 0, 0]);
    assert!(segment[8..16].iter().all(|&b| b == 0));
    assert_eq!(segment[16], 0b11);
    assert!(segment[17..24].iter().all(|&b| b == 0));

    let bytes = serialize::write_message_to_bytes(&message).unwrap();
    let reader = serialize::read_message(&bytes[..], ReaderOptions::new()).unwrap();
    let list: primitive_list::Reader<bool> = reader.get_root().unwrap();
    assert_eq!(list.len(), 66);
    for (i, value) in list.iter().enumerate() {
        assert_eq!(value, i >= 64, "element {i}");
    }
}

#[test]
fn blob_round_trip() {
    let mut message = message::Builder::new_default();
    {
        let root: any_pointer::Builder = message.init_root().unwrap();
        let mut root = root
            .init_struct(StructSize {
                data: 1,
                pointers: 3,
            })
            .unwrap();
        root.set_data_field::<f64>(0, 1.5);
        root.reborrow()
            .get_pointer_field(0)
            .unwrap()
            .set_data(&[0, 1, 2, 0xff])
            .unwrap();
        let mut text: text::Builder = root
            .reborrow()
            .get_pointer_field(1)
            .unwrap()
            .init_text(5)
            .unwrap();
        text.push_str("hé");
        text.push_ascii(b'y');
        assert_eq!(text.remaining(), 1);
        root.get_pointer_field(2)
            .unwrap()
            .init_data(3)
            .unwrap()
            .copy_from_slice(b"xyz");
    }

    let reader = message.into_reader();
    let root: StructReader = reader.get_root().unwrap();
    assert_eq!(root.get_data_field::<f64>(0), 1.5);
    assert_eq!(root.get_pointer_field(0).get_data().unwrap(), &[0, 1, 2, 0xff]);
    // Unused text space reads back as NUL padding inside the content.
    assert_eq!(root.get_pointer_field(1).get_text().unwrap(), "héy\0");
    assert_eq!(root.get_pointer_field(2).get_data().unwrap(), b"xyz");
}

#[test]
fn far_and_double_far_pointers() {
    let allocator = HeapAllocator::new()
        .first_segment_words(4)
        .allocation_strategy(AllocationStrategy::FixedSize);
    let mut message = message::Builder::new(allocator);
    {
        // Segment 0: root pointer, a one-pointer struct and two words of text.
        let root: any_pointer::Builder = message.init_root().unwrap();
        let root = root
            .init_struct(StructSize {
                data: 0,
                pointers: 1,
            })
            .unwrap();
        root.get_pointer_field(0).unwrap().set_text("hello world, hi").unwrap();
    }
    {
        // Growing the root moves it to segment 1 behind a far pointer. Segment 0 has
        // no room left for a landing pad, so the text is reached through a double-far.
        let root: any_pointer::Builder = message.get_root().unwrap();
        let mut root = root
            .get_struct(StructSize {
                data: 1,
                pointers: 1,
            })
            .unwrap();
        root.set_data_field::<u32>(1, 77);
    }

    {
        let segments = message.get_segments_for_output();
        assert_eq!(segments.len(), 3);
        // Single far pointer to the landing pad at word 0 of segment 1.
        assert_eq!(&segments[0][0..8], &[2, 0, 0, 0, 1, 0, 0, 0]);
        // Double-far pointer to the two-word pad at word 0 of segment 2.
        assert_eq!(&segments[1][16..24], &[6, 0, 0, 0, 2, 0, 0, 0]);
    }

    let root: StructReader = message.get_root_as_reader().unwrap();
    assert_eq!(root.get_data_field::<u32>(1), 77);
    assert_eq!(root.get_pointer_field(0).get_text().unwrap(), "hello world, hi");

    let bytes = serialize::write_message_to_bytes(&message).unwrap();
    let reader = serialize::read_message(&bytes[..], ReaderOptions::new()).unwrap();
    assert_eq!(reader.segment_count(), 3);
    let root: StructReader = reader.get_root().unwrap();
    assert_eq!(root.get_data_field::<u32>(1), 77);
    assert_eq!(root.get_pointer_field(0).get_text().unwrap(), "hello world, hi");
    assert_eq!(root.total_size().unwrap().word_count, 2 + 2);
}

#[test]
fn lists_of_every_primitive_size() {
    let mut message = message::Builder::new_default();
    {
        let root: any_pointer::Builder = message.init_root().unwrap();
        let mut root = root
            .init_struct(StructSize {
                data: 0,
                pointers: 5,
            })
            .unwrap();
        let mut bytes = root
            .reborrow()
            .get_pointer_field(0)
            .unwrap()
            .init_list(ElementSize::Byte, 3)
            .unwrap();
        <u8 as capnp_core::layout::PrimitiveElement>::set(&mut bytes, 2, 0xab);
        let mut halves = root
            .reborrow()
            .get_pointer_field(1)
            .unwrap()
            .init_list(ElementSize::TwoBytes, 2)
            .unwrap();
        <i16 as capnp_core::layout::PrimitiveElement>::set(&mut halves, 1, -2);
        let mut floats = root
            .reborrow()
            .get_pointer_field(2)
            .unwrap()
            .init_list(ElementSize::FourBytes, 2)
            .unwrap();
        <f32 as capnp_core::layout::PrimitiveElement>::set(&mut floats, 0, 0.25);
        let mut longs = root
            .reborrow()
            .get_pointer_field(3)
            .unwrap()
            .init_list(ElementSize::EightBytes, 1)
            .unwrap();
        <u64 as capnp_core::layout::PrimitiveElement>::set(&mut longs, 0, u64::MAX);
        let voids = root
            .get_pointer_field(4)
            .unwrap()
            .init_list(ElementSize::Void, 1000)
            .unwrap();
        assert_eq!(voids.len(), 1000);
    }

    let reader = message.into_reader();
    let root: StructReader = reader.get_root().unwrap();
    let get = |i| root.get_pointer_field(i);
    let bytes: primitive_list::Reader<u8> =
        capnp_core::traits::FromPointerReader::get_from_pointer(&get(0)).unwrap();
    assert_eq!(bytes.iter().collect::<Vec<_>>(), vec![0, 0, 0xab]);
    let halves: primitive_list::Reader<i16> =
        capnp_core::traits::FromPointerReader::get_from_pointer(&get(1)).unwrap();
    assert_eq!(halves.get(1), -2);
    let floats: primitive_list::Reader<f32> =
        capnp_core::traits::FromPointerReader::get_from_pointer(&get(2)).unwrap();
    assert_eq!(floats.get(0), 0.25);
    let longs: primitive_list::Reader<u64> =
        capnp_core::traits::FromPointerReader::get_from_pointer(&get(3)).unwrap();
    assert_eq!(longs.get(0), u64::MAX);
    let voids: primitive_list::Reader<()> =
        capnp_core::traits::FromPointerReader::get_from_pointer(&get(4)).unwrap();
    assert_eq!(voids.len(), 1000);
    // A void list occupies no words beyond its pointer.
    assert_eq!(get(4).total_size().unwrap().word_count, 0);
}
