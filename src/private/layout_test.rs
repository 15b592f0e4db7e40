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

use crate::message::ReaderOptions;
use crate::private::arena::ReaderArenaImpl;
use crate::private::layout::{ElementSize, PointerReader, PrimitiveElement};
use crate::ErrorKind;

fn with_root<F>(words: &[[u8; 8]], f: F)
where
    F: FnOnce(PointerReader<'_>),
{
    let bytes: Vec<u8> = words.iter().flatten().copied().collect();
    let segments: &[&[u8]] = &[&bytes[..]];
    let arena = ReaderArenaImpl::new(segments, ReaderOptions::new());
    f(PointerReader::get_root(&arena, 0, 0, 64).unwrap())
}

#[test]
fn simple_raw_data_struct() {
    with_root(
        &[
            [0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00],
            [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef],
        ],
        |root| {
            let reader = root.get_struct().unwrap();

            assert_eq!(0xefcdab8967452301u64, reader.get_data_field::<u64>(0));
            assert_eq!(0, reader.get_data_field::<u64>(1)); // past end of struct --> default value

            assert_eq!(0x67452301u32, reader.get_data_field::<u32>(0));
            assert_eq!(0xefcdab89u32, reader.get_data_field::<u32>(1));
            assert_eq!(0, reader.get_data_field::<u32>(2));

            assert_eq!(0x2301u16, reader.get_data_field::<u16>(0));
            assert_eq!(0x6745u16, reader.get_data_field::<u16>(1));
            assert_eq!(0xab89u16, reader.get_data_field::<u16>(2));
            assert_eq!(0xefcdu16, reader.get_data_field::<u16>(3));
            assert_eq!(0u16, reader.get_data_field::<u16>(4));

            assert_eq!(0x01u8, reader.get_data_field::<u8>(0));
            assert_eq!(-17i8, reader.get_data_field::<i8>(7));

            // Bits.
            let low_bits: Vec<bool> = (0..16).map(|i| reader.get_bool_field(i)).collect();
            assert_eq!(
                low_bits,
                vec![
                    true, false, false, false, false, false, false, false, true, true, false,
                    false, false, true, false, false,
                ]
            );
            assert!(reader.get_bool_field(63));
            assert!(!reader.get_bool_field(64)); // past end of struct --> default value

            assert!(reader.get_pointer_field(0).is_null());
        },
    );
}

#[test]
fn bool_list() {
    use crate::traits::FromPointerReader;

    // [true, false, true, false,
    //  true, true, true, false,
    //  false, true]
    with_root(
        &[
            [0x01, 0x00, 0x00, 0x00, 0x51, 0x00, 0x00, 0x00],
            [0x75, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        ],
        |root| {
            let expected = [
                true, false, true, false, true, true, true, false, false, true,
            ];

            let reader = root.get_list(ElementSize::Bit).unwrap();
            assert_eq!(reader.len(), 10);
            for (i, &bit) in expected.iter().enumerate() {
                assert_eq!(bool::get(&reader, i as u32), bit);
            }

            let reader = crate::primitive_list::Reader::<bool>::get_from_pointer(&root).unwrap();
            assert_eq!(reader.iter().collect::<Vec<_>>(), expected);

            // A bit list has no struct interpretation.
            assert_eq!(
                root.get_list(ElementSize::InlineComposite).err().map(|e| e.kind),
                Some(ErrorKind::FoundBitListWhereStructListWasExpected)
            );
        },
    );
}

#[test]
fn struct_size() {
    with_root(
        &[
            [0x00, 0x00, 0x00, 0x00, 0x2, 0x00, 0x01, 0x00],
            [0x0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
            [0x0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
            [0x0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        ],
        |root| {
            assert_eq!(root.total_size().unwrap().word_count, 3);
        },
    );
}

#[test]
fn struct_list_size() {
    // The list pointer claims three words of content, but the struct tag says there
    // is only one element and it has a size of one word. total_size() reports the
    // value computed from the tag, because that is what a copy would occupy.
    with_root(
        &[
            [0x01, 0, 0, 0, 0x1f, 0, 0, 0],
            [0x4, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00],
            [0x0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
            [0x0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
            [0x0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        ],
        |root| {
            assert_eq!(root.total_size().unwrap().word_count, 2);
        },
    );
}

#[test]
fn empty_struct_list_size() {
    with_root(
        &[
            // Struct, one pointer
            [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00],
            // Inline-composite list, zero words long
            [0x01, 0x00, 0x00, 0x00, 0x07, 0x00, 0x00, 0x00],
            // Tag
            [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        ],
        |root| {
            assert_eq!(2, root.total_size().unwrap().word_count);
        },
    );
}

#[test]
fn struct_pointer_out_of_bounds() {
    // Claims two data words, but the segment ends after the first.
    with_root(
        &[
            [0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00],
            [0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        ],
        |root| {
            assert_eq!(
                root.get_struct().err().map(|e| e.kind),
                Some(ErrorKind::MessageContainsOutOfBoundsPointer)
            );
        },
    );
}

#[test]
fn far_pointer_to_missing_segment() {
    // Far pointer, landing pad at word 0 of segment 5.
    with_root(&[[0x02, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00]], |root| {
        assert_eq!(
            root.get_struct().err().map(|e| e.kind),
            Some(ErrorKind::InvalidSegmentId(5))
        );
    });
}

#[test]
fn unknown_pointer_kind() {
    // Kind 3 with a nonzero offset field is neither null nor a capability.
    with_root(
        &[
            [0x07, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
            [0x00; 8],
            [0x00; 8],
        ],
        |root| {
            assert_eq!(
                root.get_pointer_type().err().map(|e| e.kind),
                Some(ErrorKind::UnknownPointerType)
            );
        },
    );
}

#[test]
fn nesting_limit_stops_deep_lists() {
    // A pointer list whose only element points back at the list itself.
    let bytes: Vec<u8> = [
        [0x01u8, 0x00, 0x00, 0x00, 0x0e, 0x00, 0x00, 0x00],
        [0xfd, 0xff, 0xff, 0xff, 0x0e, 0x00, 0x00, 0x00],
    ]
    .iter()
    .flatten()
    .copied()
    .collect();
    let segments: &[&[u8]] = &[&bytes[..]];
    let arena = ReaderArenaImpl::new(segments, ReaderOptions::new());
    let mut pointer = PointerReader::get_root(&arena, 0, 0, 8).unwrap();
    let mut depth = 0;
    let err = loop {
        match pointer.get_list(ElementSize::Pointer) {
            Ok(list) => {
                pointer = list.get_pointer_element(0);
                depth += 1;
            }
            Err(e) => break e,
        }
    };
    assert_eq!(depth, 8);
    assert_eq!(err.kind, ErrorKind::MessageIsTooDeeplyNested);
}
