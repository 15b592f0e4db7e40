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

//! Views over struct, list and pointer regions of a message.
//!
//! A view is a segment id plus word or byte positions within that segment. Every
//! access resolves those positions against the arena again, so a view never
//! holds a raw address.

use crate::data;
use crate::private::arena::{BuilderArena, NullArena, ReaderArena, SegmentId};
use crate::private::capability::ClientHook;
use crate::private::mask::Mask;
use crate::private::primitive::{get_at, set_at, Primitive};
use crate::private::units::*;
use crate::text;
use crate::{Error, ErrorKind, MessageSize, Result};

pub use self::ElementSize::{
    Bit, Byte, EightBytes, FourBytes, InlineComposite, Pointer, TwoBytes, Void,
};

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementSize {
    Void = 0,
    Bit = 1,
    Byte = 2,
    TwoBytes = 3,
    FourBytes = 4,
    EightBytes = 5,
    Pointer = 6,
    InlineComposite = 7,
}

impl ElementSize {
    fn from(val: u8) -> ElementSize {
        match val & 7 {
            0 => ElementSize::Void,
            1 => ElementSize::Bit,
            2 => ElementSize::Byte,
            3 => ElementSize::TwoBytes,
            4 => ElementSize::FourBytes,
            5 => ElementSize::EightBytes,
            6 => ElementSize::Pointer,
            _ => ElementSize::InlineComposite,
        }
    }
}

pub fn data_bits_per_element(size: ElementSize) -> BitCount32 {
    match size {
        Void => 0,
        Bit => 1,
        Byte => 8,
        TwoBytes => 16,
        FourBytes => 32,
        EightBytes => 64,
        Pointer => 0,
        InlineComposite => 0,
    }
}

pub fn pointers_per_element(size: ElementSize) -> WirePointerCount32 {
    match size {
        Pointer => 1,
        _ => 0,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StructSize {
    pub data: WordCount16,
    pub pointers: WirePointerCount16,
}

impl StructSize {
    pub fn total(&self) -> WordCount32 {
        self.data as WordCount32 + self.pointers as WordCount32 * WORDS_PER_POINTER as WordCount32
    }
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WirePointerKind {
    Struct = 0,
    List = 1,
    Far = 2,
    Other = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerType {
    Null,
    Struct,
    List,
    Capability,
}

impl WirePointerKind {
    fn from(val: u8) -> WirePointerKind {
        match val & 3 {
            0 => WirePointerKind::Struct,
            1 => WirePointerKind::List,
            2 => WirePointerKind::Far,
            _ => WirePointerKind::Other,
        }
    }
}

/// One pointer word, decoded into its two little-endian halves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WirePointer {
    offset_and_kind: u32,
    upper32bits: u32,
}

impl WirePointer {
    /// Reads the pointer stored at word `location`. Words past the end read as null.
    #[inline]
    pub fn load(segment: &[u8], location: usize) -> WirePointer {
        let byte = location * BYTES_PER_WORD;
        WirePointer {
            offset_and_kind: get_at(segment, byte),
            upper32bits: get_at(segment, byte + 4),
        }
    }

    #[inline]
    pub fn store(&self, segment: &mut [u8], location: usize) {
        let byte = location * BYTES_PER_WORD;
        set_at(segment, byte, self.offset_and_kind);
        set_at(segment, byte + 4, self.upper32bits);
    }

    #[inline]
    pub fn kind(&self) -> WirePointerKind {
        WirePointerKind::from(self.offset_and_kind as u8 & 3)
    }

    #[inline]
    pub fn is_positional(&self) -> bool {
        (self.offset_and_kind & 2) == 0 // match Struct and List but not Far and Other.
    }

    #[inline]
    pub fn is_capability(&self) -> bool {
        self.offset_and_kind == WirePointerKind::Other as u32
    }

    #[inline]
    fn offset(&self) -> i32 {
        (self.offset_and_kind as i32) >> 2
    }

    /// Word targeted by a pointer stored at `location`. Only valid for builder-owned data.
    #[inline]
    pub fn target(&self, location: usize) -> usize {
        (location as i64 + 1 + i64::from(self.offset())) as usize
    }

    #[inline]
    pub fn target_from_segment(
        &self,
        arena: &dyn ReaderArena,
        segment_id: u32,
        location: usize,
    ) -> Result<usize> {
        arena.check_offset(segment_id, location, 1 + self.offset())
    }

    #[inline]
    pub fn set_kind_and_target(&mut self, kind: WirePointerKind, location: usize, target: usize) {
        let offset = target as i64 - location as i64 - 1;
        self.offset_and_kind = ((offset as i32) << 2) as u32 | (kind as u32);
    }

    #[inline]
    pub fn set_kind_with_zero_offset(&mut self, kind: WirePointerKind) {
        self.offset_and_kind = kind as u32
    }

    #[inline]
    pub fn set_kind_and_target_for_empty_struct(&mut self) {
        // An offset of -1 points the empty struct at the pointer itself, which keeps the
        // word distinguishable from null.
        self.offset_and_kind = 0xfffffffc;
    }

    #[inline]
    pub fn inline_composite_list_element_count(&self) -> ElementCount32 {
        self.offset_and_kind >> 2
    }

    #[inline]
    pub fn set_kind_and_inline_composite_list_element_count(
        &mut self,
        kind: WirePointerKind,
        element_count: ElementCount32,
    ) {
        self.offset_and_kind = (element_count << 2) | (kind as u32)
    }

    #[inline]
    pub fn far_position_in_segment(&self) -> WordCount32 {
        self.offset_and_kind >> 3
    }

    #[inline]
    pub fn is_double_far(&self) -> bool {
        ((self.offset_and_kind >> 2) & 1) != 0
    }

    #[inline]
    pub fn set_far(&mut self, is_double_far: bool, pos: WordCount32) {
        self.offset_and_kind =
            (pos << 3) | ((is_double_far as u32) << 2) | WirePointerKind::Far as u32;
    }

    #[inline]
    pub fn set_cap(&mut self, index: u32) {
        self.offset_and_kind = WirePointerKind::Other as u32;
        self.upper32bits = index;
    }

    #[inline]
    pub fn struct_data_size(&self) -> WordCount16 {
        (self.upper32bits & 0xffff) as WordCount16
    }

    #[inline]
    pub fn struct_ptr_count(&self) -> WordCount16 {
        (self.upper32bits >> 16) as WordCount16
    }

    #[inline]
    pub fn struct_word_size(&self) -> WordCount32 {
        self.struct_data_size() as WordCount32
            + self.struct_ptr_count() as WordCount32 * WORDS_PER_POINTER as u32
    }

    #[inline]
    pub fn set_struct_size(&mut self, size: StructSize) {
        self.upper32bits = size.data as u32 | ((size.pointers as u32) << 16)
    }

    #[inline]
    pub fn set_struct_size_from_pieces(&mut self, ds: WordCount16, rc: WirePointerCount16) {
        self.set_struct_size(StructSize {
            data: ds,
            pointers: rc,
        })
    }

    #[inline]
    pub fn list_element_size(&self) -> ElementSize {
        ElementSize::from(self.upper32bits as u8 & 7)
    }

    #[inline]
    pub fn list_element_count(&self) -> ElementCount32 {
        self.upper32bits >> 3
    }

    #[inline]
    pub fn list_inline_composite_word_count(&self) -> WordCount32 {
        self.list_element_count()
    }

    /// `ec` must be below 2**29; callers check with `check_list_size`.
    #[inline]
    pub fn set_list_size_and_count(&mut self, es: ElementSize, ec: ElementCount32) {
        self.upper32bits = (ec << 3) | (es as u32);
    }

    #[inline]
    pub fn set_list_inline_composite(&mut self, wc: WordCount32) {
        self.upper32bits = (wc << 3) | (InlineComposite as u32);
    }

    #[inline]
    pub fn far_segment_id(&self) -> SegmentId {
        self.upper32bits as SegmentId
    }

    #[inline]
    pub fn set_far_segment_id(&mut self, si: SegmentId) {
        self.upper32bits = si
    }

    #[inline]
    pub fn cap_index(&self) -> u32 {
        self.upper32bits
    }

    #[inline]
    pub fn set_cap_index(&mut self, index: u32) {
        self.upper32bits = index
    }

    #[inline]
    fn copy_upper32bits_from(&mut self, other: &WirePointer) {
        self.upper32bits = other.upper32bits;
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.offset_and_kind == 0 && self.upper32bits == 0
    }
}

/// Lists are limited to 2**29 elements, and inline composite lists to 2**29 words.
const MAX_LIST_SIZE: u64 = 1 << 29;

fn check_list_size(size: u64) -> Result<u32> {
    if size >= MAX_LIST_SIZE {
        Err(Error::failed(format!(
            "list of {size} elements exceeds the limit of 2**29"
        )))
    } else {
        Ok(size as u32)
    }
}

mod wire_helpers {
    use crate::private::arena::*;
    use crate::private::capability::ClientHook;
    use crate::private::layout::ElementSize::*;
    use crate::private::layout::{check_list_size, data_bits_per_element, pointers_per_element};
    use crate::private::layout::{
        ElementSize, ListBuilder, ListReader, StructBuilder, StructReader, StructSize,
        WirePointer, WirePointerKind,
    };
    use crate::private::units::*;
    use crate::{capability, data, text};
    use crate::{Error, ErrorKind, MessageSize, Result};

    #[inline]
    pub fn bounds_check(
        arena: &dyn ReaderArena,
        segment_id: u32,
        start: usize,
        size_in_words: usize,
    ) -> Result<()> {
        arena.contains_interval(segment_id, start, size_in_words)
    }

    #[inline]
    pub fn amplified_read(arena: &dyn ReaderArena, virtual_amount: u64) -> Result<()> {
        arena.amplified_read(virtual_amount)
    }

    #[inline]
    pub fn nesting_limit_exceeded() -> Error {
        tracing::warn!("nesting limit exceeded");
        Error::from_kind(ErrorKind::MessageIsTooDeeplyNested)
    }

    /// Borrows `len` bytes at `start`, or reports an out-of-bounds pointer.
    #[inline]
    pub fn byte_slice(segment: &[u8], start: usize, len: usize) -> Result<&[u8]> {
        segment
            .get(start..start + len)
            .ok_or_else(|| Error::from_kind(ErrorKind::MessageContainsOutOfBoundsPointer))
    }

    #[inline]
    pub fn read_pointer(
        arena: &dyn ReaderArena,
        segment_id: u32,
        location: usize,
    ) -> Result<WirePointer> {
        Ok(WirePointer::load(arena.get_segment(segment_id)?, location))
    }

    #[inline]
    pub fn load(arena: &mut dyn BuilderArena, segment_id: u32, location: usize) -> WirePointer {
        WirePointer::load(arena.get_segment_mut(segment_id), location)
    }

    #[inline]
    pub fn store(
        arena: &mut dyn BuilderArena,
        segment_id: u32,
        location: usize,
        value: WirePointer,
    ) {
        value.store(arena.get_segment_mut(segment_id), location)
    }

    #[inline]
    pub fn zero_words(arena: &mut dyn BuilderArena, segment_id: u32, start: usize, count: usize) {
        let segment = arena.get_segment_mut(segment_id);
        segment[start * BYTES_PER_WORD..(start + count) * BYTES_PER_WORD].fill(0);
    }

    #[inline]
    pub fn zero_bytes(arena: &mut dyn BuilderArena, segment_id: u32, start: usize, count: usize) {
        arena.get_segment_mut(segment_id)[start..start + count].fill(0);
    }

    /// Copies `count` bytes between two builder positions that may lie in different segments.
    pub fn copy_bytes(
        arena: &mut dyn BuilderArena,
        src_segment_id: u32,
        src: usize,
        dst_segment_id: u32,
        dst: usize,
        count: usize,
    ) {
        if count == 0 {
            return;
        }
        if src_segment_id == dst_segment_id {
            arena
                .get_segment_mut(src_segment_id)
                .copy_within(src..src + count, dst);
        } else {
            let tmp = arena.get_segment_mut(src_segment_id)[src..src + count].to_vec();
            arena.get_segment_mut(dst_segment_id)[dst..dst + count].copy_from_slice(&tmp);
        }
    }

    pub fn allocate(
        arena: &mut dyn BuilderArena,
        reff: usize,
        segment_id: u32,
        amount: WordCount32,
        kind: WirePointerKind,
    ) -> Result<(usize, usize, u32)> {
        if !load(arena, segment_id, reff).is_null() {
            zero_object(arena, segment_id, reff);
        }

        if amount == 0 && kind == WirePointerKind::Struct {
            let mut pointer = WirePointer::default();
            pointer.set_kind_and_target_for_empty_struct();
            store(arena, segment_id, reff, pointer);
            return Ok((reff, reff, segment_id));
        }

        match arena.allocate(segment_id, amount)? {
            None => {
                //# Need to allocate in a different segment. We'll need to
                //# allocate an extra pointer worth of space to act as
                //# the landing pad for a far pointer.

                let amount_plus_ref = amount
                    .checked_add(POINTER_SIZE_IN_WORDS as u32)
                    .ok_or_else(|| Error::from_kind(ErrorKind::MessageSizeLimitExceeded))?;
                let (far_segment_id, word_idx) = arena.allocate_anywhere(amount_plus_ref)?;

                //# Set up the original pointer to be a far pointer to
                //# the new segment.
                let mut far = WirePointer::default();
                far.set_far(false, word_idx);
                far.set_far_segment_id(far_segment_id);
                store(arena, segment_id, reff, far);
                tracing::trace!(
                    from = segment_id,
                    to = far_segment_id,
                    position = word_idx,
                    "wrote far pointer"
                );

                //# Initialize the landing pad to indicate that the
                //# data immediately follows the pad.
                let pad = word_idx as usize;
                let ptr = pad + POINTER_SIZE_IN_WORDS;
                let mut landing_pad = WirePointer::default();
                landing_pad.set_kind_and_target(kind, pad, ptr);
                store(arena, far_segment_id, pad, landing_pad);
                Ok((ptr, pad, far_segment_id))
            }
            Some(idx) => {
                let ptr = idx as usize;
                let mut pointer = WirePointer::default();
                pointer.set_kind_and_target(kind, reff, ptr);
                store(arena, segment_id, reff, pointer);
                Ok((ptr, reff, segment_id))
            }
        }
    }

    /// If `reff` is a far pointer, follows it. Returns the object's first word, the
    /// pointer that describes it and the segment it lives in.
    #[inline]
    pub fn follow_builder_fars(
        arena: &mut dyn BuilderArena,
        reff: usize,
        segment_id: u32,
    ) -> (usize, WirePointer, u32) {
        let pointer = load(arena, segment_id, reff);
        if pointer.kind() == WirePointerKind::Far {
            let far_segment_id = pointer.far_segment_id();
            let pad_location = pointer.far_position_in_segment() as usize;
            let pad = load(arena, far_segment_id, pad_location);
            if !pointer.is_double_far() {
                (pad.target(pad_location), pad, far_segment_id)
            } else {
                //# Landing pad is another far pointer. It is followed by a
                //# tag describing the pointed-to object.
                let tag = load(arena, far_segment_id, pad_location + 1);
                (
                    pad.far_position_in_segment() as usize,
                    tag,
                    pad.far_segment_id(),
                )
            }
        } else {
            (pointer.target(reff), pointer, segment_id)
        }
    }

    #[inline]
    pub fn follow_fars(
        arena: &dyn ReaderArena,
        reff: WirePointer,
        location: usize,
        segment_id: u32,
    ) -> Result<(usize, WirePointer, u32)> {
        if reff.kind() == WirePointerKind::Far {
            let far_segment_id = reff.far_segment_id();
            let pad_location = reff.far_position_in_segment() as usize;
            let pad_words: usize = if reff.is_double_far() { 2 } else { 1 };
            bounds_check(arena, far_segment_id, pad_location, pad_words)?;
            let segment = arena.get_segment(far_segment_id)?;
            let pad = WirePointer::load(segment, pad_location);

            if !reff.is_double_far() {
                Ok((
                    pad.target_from_segment(arena, far_segment_id, pad_location)?,
                    pad,
                    far_segment_id,
                ))
            } else {
                //# Landing pad is another far pointer. It is
                //# followed by a tag describing the pointed-to
                //# object.
                if pad.kind() != WirePointerKind::Far {
                    return Err(Error::from_kind(ErrorKind::MalformedDoubleFarPointer));
                }
                let tag = WirePointer::load(segment, pad_location + 1);
                let target_segment_id = pad.far_segment_id();
                let ptr = arena.check_offset(
                    target_segment_id,
                    pad.far_position_in_segment() as usize,
                    0,
                )?;
                Ok((ptr, tag, target_segment_id))
            }
        } else {
            Ok((
                reff.target_from_segment(arena, segment_id, location)?,
                reff,
                segment_id,
            ))
        }
    }

    /// Zeroes the object `reff` points to, which is about to become unreachable.
    pub fn zero_object(arena: &mut dyn BuilderArena, segment_id: u32, reff: usize) {
        let pointer = load(arena, segment_id, reff);
        match pointer.kind() {
            WirePointerKind::Struct | WirePointerKind::List => {
                zero_object_helper(arena, segment_id, pointer, pointer.target(reff))
            }
            // Capability slots are released with the message, not here.
            WirePointerKind::Other => {}
            WirePointerKind::Far => {
                let far_segment_id = pointer.far_segment_id();
                let pad = pointer.far_position_in_segment() as usize;

                if pointer.is_double_far() {
                    let landing_pad = load(arena, far_segment_id, pad);
                    let tag = load(arena, far_segment_id, pad + 1);
                    zero_object_helper(
                        arena,
                        landing_pad.far_segment_id(),
                        tag,
                        landing_pad.far_position_in_segment() as usize,
                    );
                    zero_words(arena, far_segment_id, pad, 2);
                } else {
                    zero_object(arena, far_segment_id, pad);
                    zero_words(arena, far_segment_id, pad, 1);
                }
            }
        }
    }

    pub fn zero_object_helper(
        arena: &mut dyn BuilderArena,
        segment_id: u32,
        tag: WirePointer,
        ptr: usize,
    ) {
        match tag.kind() {
            WirePointerKind::Struct => {
                let pointer_section = ptr + tag.struct_data_size() as usize;
                for i in 0..tag.struct_ptr_count() as usize {
                    zero_object(arena, segment_id, pointer_section + i);
                }
                zero_words(arena, segment_id, ptr, tag.struct_word_size() as usize);
            }
            WirePointerKind::List => match tag.list_element_size() {
                Void => {}
                Bit | Byte | TwoBytes | FourBytes | EightBytes => zero_words(
                    arena,
                    segment_id,
                    ptr,
                    round_bits_up_to_words(
                        tag.list_element_count() as u64
                            * data_bits_per_element(tag.list_element_size()) as u64,
                    ) as usize,
                ),
                Pointer => {
                    let count = tag.list_element_count() as usize;
                    for i in 0..count {
                        zero_object(arena, segment_id, ptr + i);
                    }
                    zero_words(arena, segment_id, ptr, count);
                }
                InlineComposite => {
                    let element_tag = load(arena, segment_id, ptr);
                    let data_size = element_tag.struct_data_size() as usize;
                    let pointer_count = element_tag.struct_ptr_count() as usize;
                    let count = element_tag.inline_composite_list_element_count() as usize;
                    let mut pos = ptr + POINTER_SIZE_IN_WORDS;
                    if pointer_count > 0 {
                        for _ in 0..count {
                            pos += data_size;
                            for _ in 0..pointer_count {
                                zero_object(arena, segment_id, pos);
                                pos += POINTER_SIZE_IN_WORDS;
                            }
                        }
                    }
                    zero_words(
                        arena,
                        segment_id,
                        ptr,
                        element_tag.struct_word_size() as usize * count + POINTER_SIZE_IN_WORDS,
                    );
                }
            },
            // Tags never carry these kinds in builder-owned data.
            WirePointerKind::Far | WirePointerKind::Other => {}
        }
    }

    /// Zeroes the pointer itself and, if it is a far pointer, its landing pad as well,
    /// but not the object body. Used when upgrading.
    #[inline]
    pub fn zero_pointer_and_fars(arena: &mut dyn BuilderArena, segment_id: u32, reff: usize) {
        let pointer = load(arena, segment_id, reff);
        if pointer.kind() == WirePointerKind::Far {
            let num_words = if pointer.is_double_far() { 2 } else { 1 };
            zero_words(
                arena,
                pointer.far_segment_id(),
                pointer.far_position_in_segment() as usize,
                num_words,
            );
        }
        zero_words(arena, segment_id, reff, 1);
    }

    pub fn total_size(
        arena: &dyn ReaderArena,
        segment_id: u32,
        location: usize,
        mut nesting_limit: i32,
    ) -> Result<MessageSize> {
        let mut result = MessageSize {
            word_count: 0,
            cap_count: 0,
        };

        let reff = read_pointer(arena, segment_id, location)?;
        if reff.is_null() {
            return Ok(result);
        };

        if nesting_limit <= 0 {
            return Err(nesting_limit_exceeded());
        }

        nesting_limit -= 1;

        let (ptr, reff, segment_id) = follow_fars(arena, reff, location, segment_id)?;

        match reff.kind() {
            WirePointerKind::Struct => {
                bounds_check(arena, segment_id, ptr, reff.struct_word_size() as usize)?;
                result.word_count += reff.struct_word_size() as u64;

                let pointer_section = ptr + reff.struct_data_size() as usize;
                for i in 0..reff.struct_ptr_count() as usize {
                    result.plus_eq(total_size(
                        arena,
                        segment_id,
                        pointer_section + i,
                        nesting_limit,
                    )?);
                }
            }
            WirePointerKind::List => match reff.list_element_size() {
                Void => {}
                Bit | Byte | TwoBytes | FourBytes | EightBytes => {
                    let total_words = round_bits_up_to_words(
                        reff.list_element_count() as u64
                            * data_bits_per_element(reff.list_element_size()) as u64,
                    );
                    bounds_check(arena, segment_id, ptr, total_words as usize)?;
                    result.word_count += total_words as u64;
                }
                Pointer => {
                    let count = reff.list_element_count() as usize;
                    bounds_check(arena, segment_id, ptr, count * WORDS_PER_POINTER)?;

                    result.word_count += (count * WORDS_PER_POINTER) as u64;

                    for i in 0..count {
                        result.plus_eq(total_size(arena, segment_id, ptr + i, nesting_limit)?);
                    }
                }
                InlineComposite => {
                    let word_count = reff.list_inline_composite_word_count();
                    bounds_check(
                        arena,
                        segment_id,
                        ptr,
                        word_count as usize + POINTER_SIZE_IN_WORDS,
                    )?;

                    let element_tag = read_pointer(arena, segment_id, ptr)?;
                    let count = element_tag.inline_composite_list_element_count();

                    if element_tag.kind() != WirePointerKind::Struct {
                        return Err(Error::from_kind(
                            ErrorKind::InlineCompositeListsOfNonStructTypeAreNotSupported,
                        ));
                    }

                    let actual_size = element_tag.struct_word_size() as u64 * count as u64;
                    if actual_size > word_count as u64 {
                        return Err(Error::from_kind(
                            ErrorKind::InlineCompositeListsElementsOverrunItsWordCount,
                        ));
                    }

                    // Count the actual size rather than the claimed word count because
                    // that's what we end up with if we make a copy.
                    result.word_count += actual_size + POINTER_SIZE_IN_WORDS as u64;

                    let data_size = element_tag.struct_data_size() as usize;
                    let pointer_count = element_tag.struct_ptr_count() as usize;

                    if pointer_count > 0 {
                        let mut pos = ptr + POINTER_SIZE_IN_WORDS;
                        for _ in 0..count {
                            pos += data_size;

                            for _ in 0..pointer_count {
                                result.plus_eq(total_size(arena, segment_id, pos, nesting_limit)?);
                                pos += POINTER_SIZE_IN_WORDS;
                            }
                        }
                    }
                }
            },
            WirePointerKind::Far => {
                return Err(Error::from_kind(ErrorKind::MalformedDoubleFarPointer));
            }
            WirePointerKind::Other => {
                if reff.is_capability() {
                    result.cap_count += 1;
                } else {
                    return Err(Error::from_kind(ErrorKind::UnknownPointerType));
                }
            }
        }

        Ok(result)
    }

    /// Makes `dst` point to the same object as `src`. Both must reside in the same
    /// message. The caller zeroes the source pointer afterwards.
    pub fn transfer_pointer(
        arena: &mut dyn BuilderArena,
        dst_segment_id: u32,
        dst: usize,
        src_segment_id: u32,
        src: usize,
    ) -> Result<()> {
        let src_pointer = load(arena, src_segment_id, src);
        if src_pointer.is_null() {
            zero_words(arena, dst_segment_id, dst, 1);
            Ok(())
        } else if src_pointer.is_positional() {
            transfer_pointer_split(
                arena,
                dst_segment_id,
                dst,
                src_segment_id,
                src_pointer,
                src_pointer.target(src),
            )
        } else {
            store(arena, dst_segment_id, dst, src_pointer);
            Ok(())
        }
    }

    /// Like `transfer_pointer`, but with the source split into its tag and its target.
    pub fn transfer_pointer_split(
        arena: &mut dyn BuilderArena,
        dst_segment_id: u32,
        dst: usize,
        src_segment_id: u32,
        src_tag: WirePointer,
        src_ptr: usize,
    ) -> Result<()> {
        if dst_segment_id == src_segment_id {
            let mut pointer = WirePointer::default();
            if src_tag.kind() == WirePointerKind::Struct && src_tag.struct_word_size() == 0 {
                pointer.set_kind_and_target_for_empty_struct();
            } else {
                pointer.set_kind_and_target(src_tag.kind(), dst, src_ptr);
            }
            pointer.copy_upper32bits_from(&src_tag);
            store(arena, dst_segment_id, dst, pointer);
            return Ok(());
        }

        // Need a far pointer. Try to put the landing pad in the same segment as the
        // source, so that it doesn't need to be a double-far.
        match arena.allocate(src_segment_id, 1)? {
            None => {
                //# Darn, need a double-far.
                let (far_segment_id, word_idx) = arena.allocate_anywhere(2)?;
                let pad = word_idx as usize;

                let mut landing_pad = WirePointer::default();
                landing_pad.set_far(false, src_ptr as u32);
                landing_pad.set_far_segment_id(src_segment_id);
                store(arena, far_segment_id, pad, landing_pad);

                let mut tag = WirePointer::default();
                tag.set_kind_with_zero_offset(src_tag.kind());
                tag.copy_upper32bits_from(&src_tag);
                store(arena, far_segment_id, pad + 1, tag);

                let mut pointer = WirePointer::default();
                pointer.set_far(true, word_idx);
                pointer.set_far_segment_id(far_segment_id);
                store(arena, dst_segment_id, dst, pointer);
                tracing::trace!(
                    from = dst_segment_id,
                    pad_segment = far_segment_id,
                    object_segment = src_segment_id,
                    "wrote double-far pointer"
                );
            }
            Some(landing_pad_word) => {
                //# Simple landing pad is just a pointer.
                let pad = landing_pad_word as usize;
                let mut landing_pad = WirePointer::default();
                landing_pad.set_kind_and_target(src_tag.kind(), pad, src_ptr);
                landing_pad.copy_upper32bits_from(&src_tag);
                store(arena, src_segment_id, pad, landing_pad);

                let mut pointer = WirePointer::default();
                pointer.set_far(false, landing_pad_word);
                pointer.set_far_segment_id(src_segment_id);
                store(arena, dst_segment_id, dst, pointer);
                tracing::trace!(
                    from = dst_segment_id,
                    to = src_segment_id,
                    position = landing_pad_word,
                    "wrote far pointer"
                );
            }
        }
        Ok(())
    }

    #[inline]
    pub fn init_struct_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        reff: usize,
        segment_id: u32,
        size: StructSize,
    ) -> Result<StructBuilder<'a>> {
        let (ptr, reff, segment_id) =
            allocate(arena, reff, segment_id, size.total(), WirePointerKind::Struct)?;
        let mut pointer = load(arena, segment_id, reff);
        pointer.set_struct_size(size);
        store(arena, segment_id, reff, pointer);

        Ok(StructBuilder {
            arena,
            segment_id,
            data: ptr * BYTES_PER_WORD,
            pointers: ptr + size.data as usize,
            data_size: size.data as WordCount32 * (BITS_PER_WORD as BitCount32),
            pointer_count: size.pointers,
        })
    }

    #[inline]
    pub fn get_writable_struct_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        reff: usize,
        segment_id: u32,
        size: StructSize,
    ) -> Result<StructBuilder<'a>> {
        if load(arena, segment_id, reff).is_null() {
            return init_struct_pointer(arena, reff, segment_id, size);
        }

        let (old_ptr, old_ref, old_segment_id) = follow_builder_fars(arena, reff, segment_id);
        if old_ref.kind() != WirePointerKind::Struct {
            return Err(Error::from_kind(
                ErrorKind::MessageContainsNonStructPointerWhereStructPointerWasExpected,
            ));
        }

        let old_data_size = old_ref.struct_data_size();
        let old_pointer_count = old_ref.struct_ptr_count();
        let old_pointer_section = old_ptr + old_data_size as usize;

        if old_data_size < size.data || old_pointer_count < size.pointers {
            //# The space allocated for this struct is too small.
            //# Unlike with readers, we can't just run with it and do
            //# bounds checks at access time, because how would we
            //# handle writes? Instead, we have to copy the struct to a
            //# new space now.

            let new_data_size = ::core::cmp::max(old_data_size, size.data);
            let new_pointer_count = ::core::cmp::max(old_pointer_count, size.pointers);
            let total_size =
                new_data_size as u32 + new_pointer_count as u32 * WORDS_PER_POINTER as u32;

            //# Don't let allocate() zero out the object just yet.
            zero_pointer_and_fars(arena, segment_id, reff);

            let (ptr, reff, segment_id) =
                allocate(arena, reff, segment_id, total_size, WirePointerKind::Struct)?;
            let mut pointer = load(arena, segment_id, reff);
            pointer.set_struct_size_from_pieces(new_data_size, new_pointer_count);
            store(arena, segment_id, reff, pointer);

            // Copy data section.
            copy_bytes(
                arena,
                old_segment_id,
                old_ptr * BYTES_PER_WORD,
                segment_id,
                ptr * BYTES_PER_WORD,
                old_data_size as usize * BYTES_PER_WORD,
            );

            //# Copy pointer section.
            let new_pointer_section = ptr + new_data_size as usize;
            for i in 0..old_pointer_count as usize {
                transfer_pointer(
                    arena,
                    segment_id,
                    new_pointer_section + i,
                    old_segment_id,
                    old_pointer_section + i,
                )?;
            }

            zero_words(
                arena,
                old_segment_id,
                old_ptr,
                old_data_size as usize + old_pointer_count as usize,
            );

            Ok(StructBuilder {
                arena,
                segment_id,
                data: ptr * BYTES_PER_WORD,
                pointers: new_pointer_section,
                data_size: new_data_size as u32 * BITS_PER_WORD as u32,
                pointer_count: new_pointer_count,
            })
        } else {
            Ok(StructBuilder {
                arena,
                segment_id: old_segment_id,
                data: old_ptr * BYTES_PER_WORD,
                pointers: old_pointer_section,
                data_size: old_data_size as u32 * BITS_PER_WORD as u32,
                pointer_count: old_pointer_count,
            })
        }
    }

    #[inline]
    pub fn init_list_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        reff: usize,
        segment_id: u32,
        element_count: ElementCount32,
        element_size: ElementSize,
    ) -> Result<ListBuilder<'a>> {
        if element_size == InlineComposite {
            return Err(Error::failed(
                "use init_struct_list() to initialize a list of structs".to_string(),
            ));
        }
        check_list_size(element_count as u64)?;

        let data_size = data_bits_per_element(element_size);
        let pointer_count = pointers_per_element(element_size);
        let step = data_size + pointer_count * BITS_PER_POINTER as u32;
        let word_count = round_bits_up_to_words(element_count as ElementCount64 * (step as u64));
        let (ptr, reff, segment_id) =
            allocate(arena, reff, segment_id, word_count, WirePointerKind::List)?;

        let mut pointer = load(arena, segment_id, reff);
        pointer.set_list_size_and_count(element_size, element_count);
        store(arena, segment_id, reff, pointer);

        Ok(ListBuilder {
            arena,
            segment_id,
            ptr: ptr * BYTES_PER_WORD,
            step,
            element_count,
            element_size,
            struct_data_size: data_size,
            struct_pointer_count: pointer_count as u16,
        })
    }

    #[inline]
    pub fn init_struct_list_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        reff: usize,
        segment_id: u32,
        element_count: ElementCount32,
        element_size: StructSize,
    ) -> Result<ListBuilder<'a>> {
        let words_per_element = element_size.total();

        //# Allocate the list, prefixed by a single WirePointer.
        let word_count = check_list_size(element_count as u64 * words_per_element as u64)?;
        let (ptr, reff, segment_id) = allocate(
            arena,
            reff,
            segment_id,
            POINTER_SIZE_IN_WORDS as u32 + word_count,
            WirePointerKind::List,
        )?;

        //# Initialize the pointer.
        let mut pointer = load(arena, segment_id, reff);
        pointer.set_list_inline_composite(word_count);
        store(arena, segment_id, reff, pointer);

        let mut tag = WirePointer::default();
        tag.set_kind_and_inline_composite_list_element_count(
            WirePointerKind::Struct,
            element_count,
        );
        tag.set_struct_size(element_size);
        store(arena, segment_id, ptr, tag);

        Ok(ListBuilder {
            arena,
            segment_id,
            ptr: (ptr + POINTER_SIZE_IN_WORDS) * BYTES_PER_WORD,
            step: words_per_element * BITS_PER_WORD as u32,
            element_count,
            element_size: ElementSize::InlineComposite,
            struct_data_size: element_size.data as u32 * (BITS_PER_WORD as u32),
            struct_pointer_count: element_size.pointers,
        })
    }

    #[inline]
    pub fn get_writable_list_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        orig_ref: usize,
        orig_segment_id: u32,
        element_size: ElementSize,
    ) -> Result<ListBuilder<'a>> {
        if element_size == InlineComposite {
            return Err(Error::failed(
                "use get_struct_list() for struct lists".to_string(),
            ));
        }

        if load(arena, orig_segment_id, orig_ref).is_null() {
            return Ok(ListBuilder::new_default(arena));
        }

        // We must verify that the pointer has the right size. Unlike in
        // get_writable_struct_list_pointer(), we never need to "upgrade" the data, because this
        // method is called only for non-struct lists, and there is no allowed upgrade path *to* a
        // non-struct list, only *from* them.

        let (mut ptr, reff, segment_id) = follow_builder_fars(arena, orig_ref, orig_segment_id);

        if reff.kind() != WirePointerKind::List {
            return Err(Error::from_kind(ErrorKind::ExistingPointerIsNotAList));
        }

        let old_size = reff.list_element_size();

        if old_size == InlineComposite {
            // The existing element size is InlineComposite, which means that it is at least two
            // words, which makes it bigger than the expected element size. Since fields can only
            // grow when upgraded, the existing data must have been written with a newer version of
            // the protocol. We therefore never need to upgrade the data in this case, but we do
            // need to validate that it is a valid upgrade from what we expected.

            // Read the tag to get the actual element count.
            let tag = load(arena, segment_id, ptr);

            if tag.kind() != WirePointerKind::Struct {
                return Err(Error::from_kind(
                    ErrorKind::InlineCompositeListsOfNonStructTypeAreNotSupported,
                ));
            }

            ptr += POINTER_SIZE_IN_WORDS;

            let data_size = tag.struct_data_size();
            let pointer_count = tag.struct_ptr_count();

            match element_size {
                Void => {} // Anything is a valid upgrade from Void.
                Bit => {
                    return Err(Error::from_kind(
                        ErrorKind::FoundStructListWhereBitListWasExpected,
                    ));
                }
                Byte | TwoBytes | FourBytes | EightBytes => {
                    if data_size < 1 {
                        return Err(Error::from_kind(
                            ErrorKind::ExistingListValueIsIncompatibleWithExpectedType,
                        ));
                    }
                }
                Pointer => {
                    if pointer_count < 1 {
                        return Err(Error::from_kind(
                            ErrorKind::ExistingListValueIsIncompatibleWithExpectedType,
                        ));
                    }
                    // Adjust the pointer to point at the reference segment.
                    ptr += data_size as usize;
                }
                InlineComposite => {}
            }
            // OK, looks valid.

            Ok(ListBuilder {
                arena,
                segment_id,
                ptr: ptr * BYTES_PER_WORD,
                element_count: tag.inline_composite_list_element_count(),
                element_size: ElementSize::InlineComposite,
                step: tag.struct_word_size() * BITS_PER_WORD as u32,
                struct_data_size: data_size as u32 * BITS_PER_WORD as u32,
                struct_pointer_count: pointer_count,
            })
        } else {
            let data_size = data_bits_per_element(old_size);
            let pointer_count = pointers_per_element(old_size);

            if data_size < data_bits_per_element(element_size)
                || pointer_count < pointers_per_element(element_size)
            {
                return Err(Error::from_kind(
                    ErrorKind::ExistingListValueIsIncompatibleWithExpectedType,
                ));
            }

            let step = data_size + pointer_count * BITS_PER_POINTER as u32;

            Ok(ListBuilder {
                arena,
                segment_id,
                ptr: ptr * BYTES_PER_WORD,
                step,
                element_count: reff.list_element_count(),
                element_size: old_size,
                struct_data_size: data_size,
                struct_pointer_count: pointer_count as u16,
            })
        }
    }

    #[inline]
    pub fn get_writable_struct_list_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        orig_ref: usize,
        orig_segment_id: u32,
        element_size: StructSize,
    ) -> Result<ListBuilder<'a>> {
        if load(arena, orig_segment_id, orig_ref).is_null() {
            return Ok(ListBuilder::new_default(arena));
        }

        // We must verify that the pointer has the right size and potentially upgrade it if not.

        let (mut old_ptr, old_ref, old_segment_id) =
            follow_builder_fars(arena, orig_ref, orig_segment_id);

        if old_ref.kind() != WirePointerKind::List {
            return Err(Error::from_kind(ErrorKind::ExistingPointerIsNotAList));
        }

        let old_size = old_ref.list_element_size();

        if old_size == InlineComposite {
            // Existing list is InlineComposite, but we need to verify that the sizes match.

            let old_tag = load(arena, old_segment_id, old_ptr);
            old_ptr += POINTER_SIZE_IN_WORDS;
            if old_tag.kind() != WirePointerKind::Struct {
                return Err(Error::from_kind(
                    ErrorKind::InlineCompositeListsOfNonStructTypeAreNotSupported,
                ));
            }

            let old_data_size = old_tag.struct_data_size();
            let old_pointer_count = old_tag.struct_ptr_count();
            let old_step =
                old_data_size as u32 + old_pointer_count as u32 * WORDS_PER_POINTER as u32;
            let element_count = old_tag.inline_composite_list_element_count();

            if old_data_size >= element_size.data && old_pointer_count >= element_size.pointers {
                // Old size is at least as large as we need. Ship it.
                return Ok(ListBuilder {
                    arena,
                    segment_id: old_segment_id,
                    ptr: old_ptr * BYTES_PER_WORD,
                    element_count,
                    element_size: ElementSize::InlineComposite,
                    step: old_step * BITS_PER_WORD as u32,
                    struct_data_size: old_data_size as u32 * BITS_PER_WORD as u32,
                    struct_pointer_count: old_pointer_count,
                });
            }

            // The structs in this list are smaller than expected, probably written using an older
            // version of the protocol. We need to make a copy and expand them.

            let new_data_size = ::core::cmp::max(old_data_size, element_size.data);
            let new_pointer_count = ::core::cmp::max(old_pointer_count, element_size.pointers);
            let new_step =
                new_data_size as u32 + new_pointer_count as u32 * WORDS_PER_POINTER as u32;
            let total_size = check_list_size(new_step as u64 * element_count as u64)?;

            // Don't let allocate() zero out the object just yet.
            zero_pointer_and_fars(arena, orig_segment_id, orig_ref);

            let (new_ptr, new_ref, new_segment_id) = allocate(
                arena,
                orig_ref,
                orig_segment_id,
                total_size + POINTER_SIZE_IN_WORDS as u32,
                WirePointerKind::List,
            )?;
            let mut pointer = load(arena, new_segment_id, new_ref);
            pointer.set_list_inline_composite(total_size);
            store(arena, new_segment_id, new_ref, pointer);

            let mut new_tag = WirePointer::default();
            new_tag.set_kind_and_inline_composite_list_element_count(
                WirePointerKind::Struct,
                element_count,
            );
            new_tag.set_struct_size_from_pieces(new_data_size, new_pointer_count);
            store(arena, new_segment_id, new_ptr, new_tag);
            let new_ptr = new_ptr + POINTER_SIZE_IN_WORDS;

            let mut src = old_ptr;
            let mut dst = new_ptr;
            for _ in 0..element_count {
                // Copy data section.
                copy_bytes(
                    arena,
                    old_segment_id,
                    src * BYTES_PER_WORD,
                    new_segment_id,
                    dst * BYTES_PER_WORD,
                    old_data_size as usize * BYTES_PER_WORD,
                );

                // Copy pointer section
                let new_pointer_section = dst + new_data_size as usize;
                let old_pointer_section = src + old_data_size as usize;
                for jj in 0..old_pointer_count as usize {
                    transfer_pointer(
                        arena,
                        new_segment_id,
                        new_pointer_section + jj,
                        old_segment_id,
                        old_pointer_section + jj,
                    )?;
                }

                dst += new_step as usize;
                src += old_step as usize;
            }

            zero_words(
                arena,
                old_segment_id,
                old_ptr - POINTER_SIZE_IN_WORDS,
                old_step as usize * element_count as usize + POINTER_SIZE_IN_WORDS,
            );

            Ok(ListBuilder {
                arena,
                segment_id: new_segment_id,
                ptr: new_ptr * BYTES_PER_WORD,
                element_count,
                element_size: ElementSize::InlineComposite,
                step: new_step * BITS_PER_WORD as u32,
                struct_data_size: new_data_size as u32 * BITS_PER_WORD as u32,
                struct_pointer_count: new_pointer_count,
            })
        } else {
            // We're upgrading from a non-struct list.

            let old_data_size = data_bits_per_element(old_size);
            let old_pointer_count = pointers_per_element(old_size);
            let old_step = old_data_size + old_pointer_count * BITS_PER_POINTER as u32;
            let element_count = old_ref.list_element_count();

            if old_size == ElementSize::Void {
                // Nothing to copy, just allocate a new list.
                return init_struct_list_pointer(
                    arena,
                    orig_ref,
                    orig_segment_id,
                    element_count,
                    element_size,
                );
            }

            // Upgrade to an inline composite list.

            if old_size == ElementSize::Bit {
                return Err(Error::from_kind(
                    ErrorKind::FoundBitListWhereStructListWasExpected,
                ));
            }

            let mut new_data_size = element_size.data;
            let mut new_pointer_count = element_size.pointers;

            if old_size == ElementSize::Pointer {
                new_pointer_count = ::core::cmp::max(new_pointer_count, 1);
            } else {
                // Old list contains data elements, so we need at least one word of data.
                new_data_size = ::core::cmp::max(new_data_size, 1);
            }

            let new_step =
                new_data_size as u32 + new_pointer_count as u32 * WORDS_PER_POINTER as u32;
            let total_words = check_list_size(element_count as u64 * new_step as u64)?;

            // Don't let allocate() zero out the object just yet.
            zero_pointer_and_fars(arena, orig_segment_id, orig_ref);

            let (new_ptr, new_ref, new_segment_id) = allocate(
                arena,
                orig_ref,
                orig_segment_id,
                total_words + POINTER_SIZE_IN_WORDS as u32,
                WirePointerKind::List,
            )?;
            let mut pointer = load(arena, new_segment_id, new_ref);
            pointer.set_list_inline_composite(total_words);
            store(arena, new_segment_id, new_ref, pointer);

            let mut tag = WirePointer::default();
            tag.set_kind_and_inline_composite_list_element_count(
                WirePointerKind::Struct,
                element_count,
            );
            tag.set_struct_size_from_pieces(new_data_size, new_pointer_count);
            store(arena, new_segment_id, new_ptr, tag);
            let new_ptr = new_ptr + POINTER_SIZE_IN_WORDS;

            if old_size == ElementSize::Pointer {
                let mut dst = new_ptr + new_data_size as usize;
                let mut src = old_ptr;
                for _ in 0..element_count {
                    transfer_pointer(arena, new_segment_id, dst, old_segment_id, src)?;
                    dst += new_step as usize / WORDS_PER_POINTER;
                    src += 1;
                }
            } else {
                let mut dst = new_ptr * BYTES_PER_WORD;
                let mut src = old_ptr * BYTES_PER_WORD;
                let old_byte_step = (old_data_size / BITS_PER_BYTE as u32) as usize;
                for _ in 0..element_count {
                    copy_bytes(arena, old_segment_id, src, new_segment_id, dst, old_byte_step);
                    src += old_byte_step;
                    dst += new_step as usize * BYTES_PER_WORD;
                }
            }

            // Zero out old location.
            zero_bytes(
                arena,
                old_segment_id,
                old_ptr * BYTES_PER_WORD,
                round_bits_up_to_bytes(old_step as u64 * element_count as u64) as usize,
            );

            Ok(ListBuilder {
                arena,
                segment_id: new_segment_id,
                ptr: new_ptr * BYTES_PER_WORD,
                element_count,
                element_size: ElementSize::InlineComposite,
                step: new_step * BITS_PER_WORD as u32,
                struct_data_size: new_data_size as u32 * BITS_PER_WORD as u32,
                struct_pointer_count: new_pointer_count,
            })
        }
    }

    #[inline]
    pub fn init_text_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        reff: usize,
        segment_id: u32,
        size: ByteCount32,
    ) -> Result<text::Builder<'a>> {
        //# The byte list must include a NUL terminator.
        let byte_size = check_list_size(size as u64 + 1)?;

        //# Allocate the space.
        let (ptr, reff, segment_id) = allocate(
            arena,
            reff,
            segment_id,
            round_bytes_up_to_words(byte_size),
            WirePointerKind::List,
        )?;

        //# Initialize the pointer.
        let mut pointer = load(arena, segment_id, reff);
        pointer.set_list_size_and_count(Byte, byte_size);
        store(arena, segment_id, reff, pointer);

        let start = ptr * BYTES_PER_WORD;
        let segment = arena.get_segment_mut(segment_id);
        Ok(text::Builder::new(&mut segment[start..start + size as usize]))
    }

    #[inline]
    pub fn set_text_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        reff: usize,
        segment_id: u32,
        value: &str,
    ) -> Result<text::Builder<'a>> {
        let value_bytes = value.as_bytes();
        let mut allocation = init_text_pointer(arena, reff, segment_id, value_bytes.len() as u32)?;
        allocation.push_str(value);
        Ok(allocation)
    }

    #[inline]
    pub fn get_writable_text_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        reff: usize,
        segment_id: u32,
    ) -> Result<text::Builder<'a>> {
        if load(arena, segment_id, reff).is_null() {
            return Ok(text::Builder::new(&mut []));
        }
        let (ptr, reff, segment_id) = follow_builder_fars(arena, reff, segment_id);

        if reff.kind() != WirePointerKind::List {
            return Err(Error::from_kind(
                ErrorKind::MessageContainsNonListPointerWhereTextWasExpected,
            ));
        }
        if reff.list_element_size() != Byte {
            return Err(Error::from_kind(
                ErrorKind::MessageContainsListPointerOfNonBytesWhereTextWasExpected,
            ));
        }

        let count = reff.list_element_count() as usize;
        let start = ptr * BYTES_PER_WORD;
        let segment = arena.get_segment_mut(segment_id);
        if count == 0 || segment[start + count - 1] != 0 {
            return Err(Error::from_kind(ErrorKind::TextBlobMissingNULTerminator));
        }

        // Subtract 1 from the size for the NUL terminator.
        text::Builder::with_pos(&mut segment[start..start + count - 1], count - 1)
    }

    #[inline]
    pub fn init_data_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        reff: usize,
        segment_id: u32,
        size: ByteCount32,
    ) -> Result<data::Builder<'a>> {
        let size = check_list_size(size as u64)?;

        //# Allocate the space.
        let (ptr, reff, segment_id) = allocate(
            arena,
            reff,
            segment_id,
            round_bytes_up_to_words(size),
            WirePointerKind::List,
        )?;

        //# Initialize the pointer.
        let mut pointer = load(arena, segment_id, reff);
        pointer.set_list_size_and_count(Byte, size);
        store(arena, segment_id, reff, pointer);

        let start = ptr * BYTES_PER_WORD;
        Ok(&mut arena.get_segment_mut(segment_id)[start..start + size as usize])
    }

    #[inline]
    pub fn set_data_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        reff: usize,
        segment_id: u32,
        value: &[u8],
    ) -> Result<data::Builder<'a>> {
        let allocation = init_data_pointer(arena, reff, segment_id, value.len() as u32)?;
        allocation.copy_from_slice(value);
        Ok(allocation)
    }

    #[inline]
    pub fn get_writable_data_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        reff: usize,
        segment_id: u32,
    ) -> Result<data::Builder<'a>> {
        if load(arena, segment_id, reff).is_null() {
            return Ok(&mut []);
        }
        let (ptr, reff, segment_id) = follow_builder_fars(arena, reff, segment_id);

        if reff.kind() != WirePointerKind::List {
            return Err(Error::from_kind(
                ErrorKind::MessageContainsNonListPointerWhereDataWasExpected,
            ));
        }
        if reff.list_element_size() != Byte {
            return Err(Error::from_kind(
                ErrorKind::MessageContainsListPointerOfNonBytesWhereDataWasExpected,
            ));
        }

        let start = ptr * BYTES_PER_WORD;
        let count = reff.list_element_count() as usize;
        Ok(&mut arena.get_segment_mut(segment_id)[start..start + count])
    }

    /// Deep-copies `value` into a freshly allocated struct. Each section gets the larger of
    /// the source's size and `requested`, so data written under a newer layout survives and
    /// fields of the requested layout stay addressable.
    pub fn set_struct_pointer(
        arena: &mut dyn BuilderArena,
        segment_id: u32,
        reff: usize,
        value: &StructReader,
        requested: Option<StructSize>,
    ) -> Result<(usize, u32)> {
        let data_bytes: ByteCount32 = round_bits_up_to_bytes(value.data_size as u64);
        let mut data_words = round_bytes_up_to_words(data_bytes);
        let mut ptr_count = value.pointer_count;
        if let Some(size) = requested {
            data_words = ::core::cmp::max(data_words, size.data as u32);
            ptr_count = ::core::cmp::max(ptr_count, size.pointers);
        }

        let total_size: WordCount32 = data_words + ptr_count as u32 * WORDS_PER_POINTER as u32;

        let (ptr, reff, segment_id) =
            allocate(arena, reff, segment_id, total_size, WirePointerKind::Struct)?;
        let mut pointer = load(arena, segment_id, reff);
        pointer.set_struct_size_from_pieces(data_words as u16, ptr_count);
        store(arena, segment_id, reff, pointer);

        let start = ptr * BYTES_PER_WORD;
        if value.data_size == 1 {
            arena.get_segment_mut(segment_id)[start] = value.get_bool_field(0) as u8;
        } else {
            let len = ::core::cmp::min(data_bytes as usize, value.data.len());
            arena.get_segment_mut(segment_id)[start..start + len]
                .copy_from_slice(&value.data[..len]);
        }

        let pointer_section = ptr + data_words as usize;
        for i in 0..value.pointer_count as usize {
            copy_pointer(
                arena,
                segment_id,
                pointer_section + i,
                value.arena,
                value.segment_id,
                value.pointers + i,
                value.nesting_limit,
            )?;
        }

        Ok((ptr, segment_id))
    }

    /// Writes a capability pointer. A handle already in the table keeps its index.
    pub fn set_capability_pointer(
        arena: &mut dyn BuilderArena,
        segment_id: u32,
        reff: usize,
        cap: Box<dyn ClientHook>,
    ) {
        if !load(arena, segment_id, reff).is_null() {
            zero_object(arena, segment_id, reff);
        }
        let index = match arena.find_cap(cap.get_ptr()) {
            Some(index) => index,
            None => arena.inject_cap(cap),
        };
        let mut pointer = WirePointer::default();
        pointer.set_cap(index);
        store(arena, segment_id, reff, pointer);
    }

    pub fn set_list_pointer(
        arena: &mut dyn BuilderArena,
        segment_id: u32,
        reff: usize,
        value: &ListReader,
    ) -> Result<(usize, u32)> {
        let total_size = round_bits_up_to_words(value.element_count as u64 * value.step as u64);

        if value.element_size != ElementSize::InlineComposite {
            //# List of non-structs.
            let (ptr, reff, segment_id) =
                allocate(arena, reff, segment_id, total_size, WirePointerKind::List)?;

            let mut pointer = load(arena, segment_id, reff);
            pointer.set_list_size_and_count(value.element_size, value.element_count);
            store(arena, segment_id, reff, pointer);

            if value.element_size == Pointer {
                //# List of pointers.
                for i in 0..value.element_count as usize {
                    copy_pointer(
                        arena,
                        segment_id,
                        ptr + i,
                        value.arena,
                        value.segment_id,
                        value.ptr / BYTES_PER_WORD + i,
                        value.nesting_limit,
                    )?;
                }
            } else {
                //# List of data. Be careful to avoid copying any bits past the end of the list.
                let bit_size = value.element_count as u64 * value.step as u64;
                let whole_byte_size = (bit_size / BITS_PER_BYTE as u64) as usize;
                let start = ptr * BYTES_PER_WORD;
                let src = byte_slice(value.segment, value.ptr, whole_byte_size)?;
                arena.get_segment_mut(segment_id)[start..start + whole_byte_size]
                    .copy_from_slice(src);
                let leftover_bits = bit_size % BITS_PER_BYTE as u64;
                if leftover_bits > 0 {
                    let mask: u8 = (1 << leftover_bits as u8) - 1;
                    let last = byte_slice(value.segment, value.ptr + whole_byte_size, 1)?[0];
                    arena.get_segment_mut(segment_id)[start + whole_byte_size] = mask & last;
                }
            }

            Ok((ptr, segment_id))
        } else {
            //# List of structs.
            let data_size = value.struct_data_size / BITS_PER_WORD as u32;
            let ptr_count = value.struct_pointer_count;

            let (ptr, reff, segment_id) = allocate(
                arena,
                reff,
                segment_id,
                total_size + POINTER_SIZE_IN_WORDS as u32,
                WirePointerKind::List,
            )?;
            let mut pointer = load(arena, segment_id, reff);
            pointer.set_list_inline_composite(total_size);
            store(arena, segment_id, reff, pointer);

            let mut tag = WirePointer::default();
            tag.set_kind_and_inline_composite_list_element_count(
                WirePointerKind::Struct,
                value.element_count,
            );
            tag.set_struct_size_from_pieces(data_size as u16, ptr_count);
            store(arena, segment_id, ptr, tag);

            let data_bytes = data_size as usize * BYTES_PER_WORD;
            let mut dst = ptr + POINTER_SIZE_IN_WORDS;
            let mut src = value.ptr / BYTES_PER_WORD;
            for _ in 0..value.element_count {
                let bytes = byte_slice(value.segment, src * BYTES_PER_WORD, data_bytes)?;
                let start = dst * BYTES_PER_WORD;
                arena.get_segment_mut(segment_id)[start..start + data_bytes]
                    .copy_from_slice(bytes);
                dst += data_size as usize;
                src += data_size as usize;

                for _ in 0..ptr_count {
                    copy_pointer(
                        arena,
                        segment_id,
                        dst,
                        value.arena,
                        value.segment_id,
                        src,
                        value.nesting_limit,
                    )?;
                    dst += POINTER_SIZE_IN_WORDS;
                    src += POINTER_SIZE_IN_WORDS;
                }
            }
            Ok((ptr, segment_id))
        }
    }

    pub fn copy_pointer(
        dst_arena: &mut dyn BuilderArena,
        dst_segment_id: u32,
        dst: usize,
        src_arena: &dyn ReaderArena,
        src_segment_id: u32,
        src_location: usize,
        nesting_limit: i32,
    ) -> Result<()> {
        let src = read_pointer(src_arena, src_segment_id, src_location)?;

        if src.is_null() {
            zero_words(dst_arena, dst_segment_id, dst, 1);
            return Ok(());
        }

        let (ptr, src, src_segment_id) =
            follow_fars(src_arena, src, src_location, src_segment_id)?;

        match src.kind() {
            WirePointerKind::Struct => {
                if nesting_limit <= 0 {
                    return Err(nesting_limit_exceeded());
                }

                bounds_check(src_arena, src_segment_id, ptr, src.struct_word_size() as usize)?;

                let segment = src_arena.get_segment(src_segment_id)?;
                let data_size = src.struct_data_size() as usize;
                let value = StructReader {
                    arena: src_arena,
                    segment_id: src_segment_id,
                    data: byte_slice(segment, ptr * BYTES_PER_WORD, data_size * BYTES_PER_WORD)?,
                    pointers: ptr + data_size,
                    data_size: data_size as u32 * BITS_PER_WORD as u32,
                    pointer_count: src.struct_ptr_count(),
                    nesting_limit: nesting_limit - 1,
                };
                set_struct_pointer(dst_arena, dst_segment_id, dst, &value, None)?;
                Ok(())
            }
            WirePointerKind::List => {
                if nesting_limit <= 0 {
                    return Err(nesting_limit_exceeded());
                }
                let value = list_reader_for(
                    src_arena,
                    src_segment_id,
                    src,
                    ptr,
                    None,
                    nesting_limit,
                )?;
                set_list_pointer(dst_arena, dst_segment_id, dst, &value)?;
                Ok(())
            }
            WirePointerKind::Far => Err(Error::from_kind(ErrorKind::MalformedDoubleFarPointer)),
            WirePointerKind::Other => {
                if !src.is_capability() {
                    return Err(Error::from_kind(ErrorKind::UnknownPointerType));
                }
                let cap = match src_arena.extract_cap(src.cap_index() as usize) {
                    Some(cap) => cap,
                    None => capability::new_broken_hook(&format!(
                        "capability index {} is not in the source message's table",
                        src.cap_index()
                    )),
                };
                // A copy always gets its own table entry.
                let index = dst_arena.inject_cap(cap);
                let mut pointer = WirePointer::default();
                pointer.set_cap(index);
                store(dst_arena, dst_segment_id, dst, pointer);
                Ok(())
            }
        }
    }

    #[inline]
    pub fn read_struct_pointer<'a>(
        arena: &'a dyn ReaderArena,
        segment_id: u32,
        location: usize,
        nesting_limit: i32,
    ) -> Result<StructReader<'a>> {
        let reff = read_pointer(arena, segment_id, location)?;

        if reff.is_null() {
            return Ok(StructReader::new_default());
        }

        if nesting_limit <= 0 {
            return Err(nesting_limit_exceeded());
        }

        let (ptr, reff, segment_id) = follow_fars(arena, reff, location, segment_id)?;

        if reff.kind() != WirePointerKind::Struct {
            return Err(Error::from_kind(
                ErrorKind::MessageContainsNonStructPointerWhereStructPointerWasExpected,
            ));
        }

        bounds_check(arena, segment_id, ptr, reff.struct_word_size() as usize)?;

        let data_size_words = reff.struct_data_size() as usize;
        let segment = arena.get_segment(segment_id)?;
        Ok(StructReader {
            arena,
            segment_id,
            data: byte_slice(segment, ptr * BYTES_PER_WORD, data_size_words * BYTES_PER_WORD)?,
            pointers: ptr + data_size_words,
            data_size: data_size_words as u32 * BITS_PER_WORD as BitCount32,
            pointer_count: reff.struct_ptr_count(),
            nesting_limit: nesting_limit - 1,
        })
    }

    /// A null slot, or an index with no live handle, reads as a broken capability.
    #[inline]
    pub fn read_capability_pointer(
        arena: &dyn ReaderArena,
        segment_id: u32,
        location: usize,
    ) -> Result<Box<dyn ClientHook>> {
        let reff = read_pointer(arena, segment_id, location)?;
        if reff.is_null() {
            Ok(capability::new_broken_hook("capability pointer is null"))
        } else if !reff.is_capability() {
            Err(Error::from_kind(
                ErrorKind::MessageContainsNonCapabilityPointerWhereCapabilityPointerWasExpected,
            ))
        } else {
            let n = reff.cap_index() as usize;
            match arena.extract_cap(n) {
                Some(client_hook) => Ok(client_hook),
                None => Ok(capability::new_broken_hook(&format!(
                    "capability index {n} has no handle"
                ))),
            }
        }
    }

    /// Builds a list view of the object described by `reff`, whose content starts at word `ptr`.
    fn list_reader_for<'a>(
        arena: &'a dyn ReaderArena,
        segment_id: u32,
        reff: WirePointer,
        mut ptr: usize,
        expected_element_size: Option<ElementSize>,
        nesting_limit: i32,
    ) -> Result<ListReader<'a>> {
        let element_size = reff.list_element_size();
        match element_size {
            InlineComposite => {
                let word_count = reff.list_inline_composite_word_count();

                bounds_check(arena, segment_id, ptr, word_count as usize + POINTER_SIZE_IN_WORDS)?;

                let tag = read_pointer(arena, segment_id, ptr)?;
                ptr += POINTER_SIZE_IN_WORDS;

                if tag.kind() != WirePointerKind::Struct {
                    return Err(Error::from_kind(
                        ErrorKind::InlineCompositeListsOfNonStructTypeAreNotSupported,
                    ));
                }

                let size = tag.inline_composite_list_element_count();
                let data_size = tag.struct_data_size();
                let ptr_count = tag.struct_ptr_count();
                let words_per_element = tag.struct_word_size();

                if size as u64 * words_per_element as u64 > word_count as u64 {
                    return Err(Error::from_kind(
                        ErrorKind::InlineCompositeListsElementsOverrunItsWordCount,
                    ));
                }

                if words_per_element == 0 {
                    // Watch out for lists of zero-sized structs, which can claim to be
                    // arbitrarily large without having sent actual data.
                    amplified_read(arena, size as u64)?;
                }

                // If a struct list was not expected, then presumably a non-struct list was upgraded
                // to a struct list. We need to manipulate the pointer to point at the first field
                // of the struct. Together with the `step` field, this will allow the struct list to
                // be accessed as if it were a primitive list without branching.

                // Check whether the size is compatible.
                match expected_element_size {
                    None | Some(Void) | Some(InlineComposite) => (),
                    Some(Bit) => {
                        return Err(Error::from_kind(
                            ErrorKind::FoundStructListWhereBitListWasExpected,
                        ));
                    }
                    Some(Byte) | Some(TwoBytes) | Some(FourBytes) | Some(EightBytes) => {
                        if data_size == 0 {
                            return Err(Error::from_kind(
                                ErrorKind::ExpectedAPrimitiveListButGotAListOfPointerOnlyStructs,
                            ));
                        }
                    }
                    Some(Pointer) => {
                        if ptr_count == 0 {
                            return Err(Error::from_kind(
                                ErrorKind::ExpectedAPointerListButGotAListOfDataOnlyStructs,
                            ));
                        }
                        // We expected a list of pointers but got a list of structs. Assuming the
                        // first field in the struct is the pointer we were looking for, we want to
                        // munge the pointer to point at the first element's pointer section.
                        ptr += data_size as usize;
                    }
                }

                Ok(ListReader {
                    arena,
                    segment: arena.get_segment(segment_id)?,
                    segment_id,
                    ptr: ptr * BYTES_PER_WORD,
                    element_count: size,
                    element_size,
                    step: words_per_element * BITS_PER_WORD as u32,
                    struct_data_size: data_size as u32 * (BITS_PER_WORD as u32),
                    struct_pointer_count: ptr_count,
                    nesting_limit: nesting_limit - 1,
                })
            }
            _ => {
                // This is a primitive or pointer list, but all such lists can also be interpreted
                // as struct lists. We need to compute the data size and pointer count for such
                // structs.
                let data_size = data_bits_per_element(element_size);
                let pointer_count = pointers_per_element(element_size);
                let element_count = reff.list_element_count();
                let step = data_size + pointer_count * BITS_PER_POINTER as u32;

                let word_count = round_bits_up_to_words(element_count as u64 * step as u64);
                bounds_check(arena, segment_id, ptr, word_count as usize)?;

                if element_size == Void {
                    // Watch out for lists of void, which can claim to be arbitrarily large
                    // without having sent actual data.
                    amplified_read(arena, element_count as u64)?;
                }

                if let Some(expected_element_size) = expected_element_size {
                    if element_size == ElementSize::Bit && expected_element_size != ElementSize::Bit
                    {
                        return Err(Error::from_kind(
                            ErrorKind::FoundBitListWhereStructListWasExpected,
                        ));
                    }

                    // Verify that the elements are at least as large as the expected type. Note that if
                    // we expected InlineComposite, the expected sizes here will be zero, because bounds
                    // checking will be performed at field access time. So this check here is for the
                    // case where we expected a list of some primitive or pointer type.

                    let expected_data_bits_per_element =
                        data_bits_per_element(expected_element_size);
                    let expected_pointers_per_element = pointers_per_element(expected_element_size);

                    if expected_data_bits_per_element > data_size
                        || expected_pointers_per_element > pointer_count
                    {
                        return Err(Error::from_kind(
                            ErrorKind::MessageContainsListWithIncompatibleElementType,
                        ));
                    }
                }

                Ok(ListReader {
                    arena,
                    segment: arena.get_segment(segment_id)?,
                    segment_id,
                    ptr: ptr * BYTES_PER_WORD,
                    element_count,
                    element_size,
                    step,
                    struct_data_size: data_size,
                    struct_pointer_count: pointer_count as u16,
                    nesting_limit: nesting_limit - 1,
                })
            }
        }
    }

    #[inline]
    pub fn read_list_pointer<'a>(
        arena: &'a dyn ReaderArena,
        segment_id: u32,
        location: usize,
        expected_element_size: Option<ElementSize>,
        nesting_limit: i32,
    ) -> Result<ListReader<'a>> {
        let reff = read_pointer(arena, segment_id, location)?;

        if reff.is_null() {
            return Ok(ListReader::new_default());
        }

        if nesting_limit <= 0 {
            return Err(nesting_limit_exceeded());
        }

        let (ptr, reff, segment_id) = follow_fars(arena, reff, location, segment_id)?;

        if reff.kind() != WirePointerKind::List {
            return Err(Error::from_kind(
                ErrorKind::MessageContainsNonListPointerWhereListPointerWasExpected,
            ));
        }

        list_reader_for(
            arena,
            segment_id,
            reff,
            ptr,
            expected_element_size,
            nesting_limit,
        )
    }

    #[inline]
    pub fn read_text_pointer<'a>(
        arena: &'a dyn ReaderArena,
        segment_id: u32,
        location: usize,
    ) -> Result<text::Reader<'a>> {
        let reff = read_pointer(arena, segment_id, location)?;
        if reff.is_null() {
            return Ok("");
        }

        let (ptr, reff, segment_id) = follow_fars(arena, reff, location, segment_id)?;
        let size = reff.list_element_count();

        if reff.kind() != WirePointerKind::List {
            return Err(Error::from_kind(
                ErrorKind::MessageContainsNonListPointerWhereTextWasExpected,
            ));
        }

        if reff.list_element_size() != Byte {
            return Err(Error::from_kind(
                ErrorKind::MessageContainsListPointerOfNonBytesWhereTextWasExpected,
            ));
        }

        bounds_check(arena, segment_id, ptr, round_bytes_up_to_words(size) as usize)?;

        if size == 0 {
            return Err(Error::from_kind(
                ErrorKind::MessageContainsTextThatIsNotNULTerminated,
            ));
        }

        let bytes = byte_slice(
            arena.get_segment(segment_id)?,
            ptr * BYTES_PER_WORD,
            size as usize,
        )?;

        if bytes[size as usize - 1] != 0u8 {
            return Err(Error::from_kind(
                ErrorKind::MessageContainsTextThatIsNotNULTerminated,
            ));
        }

        text::new_reader(&bytes[..size as usize - 1])
    }

    #[inline]
    pub fn read_data_pointer<'a>(
        arena: &'a dyn ReaderArena,
        segment_id: u32,
        location: usize,
    ) -> Result<data::Reader<'a>> {
        let reff = read_pointer(arena, segment_id, location)?;
        if reff.is_null() {
            return Ok(&[]);
        }

        let (ptr, reff, segment_id) = follow_fars(arena, reff, location, segment_id)?;

        let size: u32 = reff.list_element_count();

        if reff.kind() != WirePointerKind::List {
            return Err(Error::from_kind(
                ErrorKind::MessageContainsNonListPointerWhereDataWasExpected,
            ));
        }

        if reff.list_element_size() != Byte {
            return Err(Error::from_kind(
                ErrorKind::MessageContainsListPointerOfNonBytesWhereDataWasExpected,
            ));
        }

        bounds_check(arena, segment_id, ptr, round_bytes_up_to_words(size) as usize)?;

        byte_slice(
            arena.get_segment(segment_id)?,
            ptr * BYTES_PER_WORD,
            size as usize,
        )
    }
}

static NULL_ARENA: NullArena = NullArena;

#[derive(Clone, Copy)]
pub struct PointerReader<'a> {
    arena: &'a dyn ReaderArena,
    segment_id: u32,
    /// Word holding the pointer, or `None` for a default (null) reader.
    pointer: Option<usize>,
    nesting_limit: i32,
}

impl<'a> PointerReader<'a> {
    pub fn new_default<'b>() -> PointerReader<'b> {
        PointerReader {
            arena: &NULL_ARENA,
            segment_id: 0,
            pointer: None,
            nesting_limit: 0x7fffffff,
        }
    }

    pub fn get_root(
        arena: &'a dyn ReaderArena,
        segment_id: u32,
        location: usize,
        nesting_limit: i32,
    ) -> Result<Self> {
        wire_helpers::bounds_check(arena, segment_id, location, POINTER_SIZE_IN_WORDS)?;

        Ok(PointerReader {
            arena,
            segment_id,
            pointer: Some(location),
            nesting_limit,
        })
    }

    pub fn reborrow(&self) -> PointerReader<'_> {
        PointerReader { ..*self }
    }

    pub fn is_null(&self) -> bool {
        match self.pointer {
            None => true,
            Some(location) => {
                match wire_helpers::read_pointer(self.arena, self.segment_id, location) {
                    Ok(pointer) => pointer.is_null(),
                    Err(_) => true,
                }
            }
        }
    }

    pub fn total_size(&self) -> Result<MessageSize> {
        match self.pointer {
            None => Ok(MessageSize {
                word_count: 0,
                cap_count: 0,
            }),
            Some(location) => wire_helpers::total_size(
                self.arena,
                self.segment_id,
                location,
                self.nesting_limit,
            ),
        }
    }

    pub fn get_struct(self) -> Result<StructReader<'a>> {
        match self.pointer {
            None => Ok(StructReader::new_default()),
            Some(location) => wire_helpers::read_struct_pointer(
                self.arena,
                self.segment_id,
                location,
                self.nesting_limit,
            ),
        }
    }

    pub fn get_list(self, expected_element_size: ElementSize) -> Result<ListReader<'a>> {
        match self.pointer {
            None => Ok(ListReader::new_default()),
            Some(location) => wire_helpers::read_list_pointer(
                self.arena,
                self.segment_id,
                location,
                Some(expected_element_size),
                self.nesting_limit,
            ),
        }
    }

    pub fn get_list_any_size(self) -> Result<ListReader<'a>> {
        match self.pointer {
            None => Ok(ListReader::new_default()),
            Some(location) => wire_helpers::read_list_pointer(
                self.arena,
                self.segment_id,
                location,
                None,
                self.nesting_limit,
            ),
        }
    }

    pub fn get_text(self) -> Result<text::Reader<'a>> {
        match self.pointer {
            None => Ok(""),
            Some(location) => {
                wire_helpers::read_text_pointer(self.arena, self.segment_id, location)
            }
        }
    }

    pub fn get_data(&self) -> Result<data::Reader<'a>> {
        match self.pointer {
            None => Ok(&[]),
            Some(location) => {
                wire_helpers::read_data_pointer(self.arena, self.segment_id, location)
            }
        }
    }

    pub fn get_capability(&self) -> Result<Box<dyn ClientHook>> {
        match self.pointer {
            None => Ok(crate::capability::new_broken_hook(
                "capability pointer is null",
            )),
            Some(location) => {
                wire_helpers::read_capability_pointer(self.arena, self.segment_id, location)
            }
        }
    }

    pub fn get_pointer_type(&self) -> Result<PointerType> {
        let location = match self.pointer {
            None => return Ok(PointerType::Null),
            Some(location) => location,
        };
        let pointer = wire_helpers::read_pointer(self.arena, self.segment_id, location)?;
        if pointer.is_null() {
            return Ok(PointerType::Null);
        }
        if pointer.is_capability() {
            return Ok(PointerType::Capability);
        }

        let (_, reff, _) =
            wire_helpers::follow_fars(self.arena, pointer, location, self.segment_id)?;

        match reff.kind() {
            WirePointerKind::Far => Err(Error::from_kind(ErrorKind::MalformedDoubleFarPointer)),
            WirePointerKind::Struct => Ok(PointerType::Struct),
            WirePointerKind::List => Ok(PointerType::List),
            WirePointerKind::Other => {
                if reff.is_capability() {
                    Ok(PointerType::Capability)
                } else {
                    Err(Error::from_kind(ErrorKind::UnknownPointerType))
                }
            }
        }
    }
}

pub struct PointerBuilder<'a> {
    arena: &'a mut dyn BuilderArena,
    segment_id: u32,
    pointer: usize,
}

impl<'a> PointerBuilder<'a> {
    #[inline]
    pub fn get_root(arena: &'a mut dyn BuilderArena, segment_id: u32, location: usize) -> Self {
        PointerBuilder {
            arena,
            segment_id,
            pointer: location,
        }
    }

    pub fn reborrow(&mut self) -> PointerBuilder<'_> {
        PointerBuilder {
            arena: &mut *self.arena,
            ..*self
        }
    }

    pub fn is_null(&self) -> bool {
        let segment = self.arena.get_segment(self.segment_id).unwrap_or(&[]);
        WirePointer::load(segment, self.pointer).is_null()
    }

    pub fn get_struct(self, size: StructSize) -> Result<StructBuilder<'a>> {
        wire_helpers::get_writable_struct_pointer(self.arena, self.pointer, self.segment_id, size)
    }

    pub fn get_list(self, element_size: ElementSize) -> Result<ListBuilder<'a>> {
        wire_helpers::get_writable_list_pointer(
            self.arena,
            self.pointer,
            self.segment_id,
            element_size,
        )
    }

    pub fn get_struct_list(self, element_size: StructSize) -> Result<ListBuilder<'a>> {
        wire_helpers::get_writable_struct_list_pointer(
            self.arena,
            self.pointer,
            self.segment_id,
            element_size,
        )
    }

    pub fn get_text(self) -> Result<text::Builder<'a>> {
        wire_helpers::get_writable_text_pointer(self.arena, self.pointer, self.segment_id)
    }

    pub fn get_data(self) -> Result<data::Builder<'a>> {
        wire_helpers::get_writable_data_pointer(self.arena, self.pointer, self.segment_id)
    }

    pub fn get_capability(&self) -> Result<Box<dyn ClientHook>> {
        wire_helpers::read_capability_pointer(self.arena.as_reader(), self.segment_id, self.pointer)
    }

    pub fn init_struct(self, size: StructSize) -> Result<StructBuilder<'a>> {
        wire_helpers::init_struct_pointer(self.arena, self.pointer, self.segment_id, size)
    }

    pub fn init_list(
        self,
        element_size: ElementSize,
        element_count: ElementCount32,
    ) -> Result<ListBuilder<'a>> {
        wire_helpers::init_list_pointer(
            self.arena,
            self.pointer,
            self.segment_id,
            element_count,
            element_size,
        )
    }

    pub fn init_struct_list(
        self,
        element_count: ElementCount32,
        element_size: StructSize,
    ) -> Result<ListBuilder<'a>> {
        wire_helpers::init_struct_list_pointer(
            self.arena,
            self.pointer,
            self.segment_id,
            element_count,
            element_size,
        )
    }

    pub fn init_text(self, size: ByteCount32) -> Result<text::Builder<'a>> {
        wire_helpers::init_text_pointer(self.arena, self.pointer, self.segment_id, size)
    }

    pub fn init_data(self, size: ByteCount32) -> Result<data::Builder<'a>> {
        wire_helpers::init_data_pointer(self.arena, self.pointer, self.segment_id, size)
    }

    /// Deep-copies `value`, keeping the section sizes it was written with.
    pub fn set_struct(&mut self, value: &StructReader) -> Result<()> {
        wire_helpers::set_struct_pointer(
            &mut *self.arena,
            self.segment_id,
            self.pointer,
            value,
            None,
        )?;
        Ok(())
    }

    /// Deep-copies `value` into a struct that has at least `size` words in each section.
    pub fn set_struct_with_size(&mut self, value: &StructReader, size: StructSize) -> Result<()> {
        wire_helpers::set_struct_pointer(
            &mut *self.arena,
            self.segment_id,
            self.pointer,
            value,
            Some(size),
        )?;
        Ok(())
    }

    pub fn set_list(&mut self, value: &ListReader) -> Result<()> {
        wire_helpers::set_list_pointer(&mut *self.arena, self.segment_id, self.pointer, value)?;
        Ok(())
    }

    pub fn set_text(&mut self, value: &str) -> Result<()> {
        wire_helpers::set_text_pointer(&mut *self.arena, self.pointer, self.segment_id, value)?;
        Ok(())
    }

    pub fn set_data(&mut self, value: &[u8]) -> Result<()> {
        wire_helpers::set_data_pointer(&mut *self.arena, self.pointer, self.segment_id, value)?;
        Ok(())
    }

    pub fn set_capability(&mut self, cap: Box<dyn ClientHook>) {
        wire_helpers::set_capability_pointer(&mut *self.arena, self.segment_id, self.pointer, cap);
    }

    pub fn copy_from(&mut self, other: PointerReader) -> Result<()> {
        self.clear();
        match other.pointer {
            None => Ok(()),
            Some(location) => wire_helpers::copy_pointer(
                &mut *self.arena,
                self.segment_id,
                self.pointer,
                other.arena,
                other.segment_id,
                location,
                other.nesting_limit,
            ),
        }
    }

    /// Nulls the slot and zeroes the object it referenced. Capability table entries are kept.
    pub fn clear(&mut self) {
        wire_helpers::zero_object(&mut *self.arena, self.segment_id, self.pointer);
        wire_helpers::zero_words(&mut *self.arena, self.segment_id, self.pointer, 1);
    }

    pub fn as_reader(&self) -> PointerReader<'_> {
        PointerReader {
            arena: self.arena.as_reader(),
            segment_id: self.segment_id,
            pointer: Some(self.pointer),
            nesting_limit: 0x7fffffff,
        }
    }

    pub fn into_reader(self) -> PointerReader<'a> {
        let arena: &'a dyn BuilderArena = self.arena;
        PointerReader {
            arena: arena.as_reader(),
            segment_id: self.segment_id,
            pointer: Some(self.pointer),
            nesting_limit: 0x7fffffff,
        }
    }
}

#[derive(Clone, Copy)]
pub struct StructReader<'a> {
    arena: &'a dyn ReaderArena,
    segment_id: u32,
    /// The data section.
    data: &'a [u8],
    /// First word of the pointer section.
    pointers: usize,
    data_size: BitCount32,
    pointer_count: WirePointerCount16,
    nesting_limit: i32,
}

impl<'a> StructReader<'a> {
    pub fn new_default<'b>() -> StructReader<'b> {
        StructReader {
            arena: &NULL_ARENA,
            segment_id: 0,
            data: &[],
            pointers: 0,
            data_size: 0,
            pointer_count: 0,
            nesting_limit: 0x7fffffff,
        }
    }

    pub fn get_data_section_size(&self) -> BitCount32 {
        self.data_size
    }

    pub fn get_pointer_section_size(&self) -> WirePointerCount16 {
        self.pointer_count
    }

    pub fn get_data_section_as_blob(&self) -> &'a [u8] {
        self.data
    }

    #[inline]
    pub fn get_data_field<T: Primitive>(&self, offset: ElementCount) -> T {
        if (offset + 1) * T::SIZE * BITS_PER_BYTE <= self.data_size as usize {
            get_at(self.data, offset * T::SIZE)
        } else {
            T::default()
        }
    }

    #[inline]
    pub fn get_bool_field(&self, offset: ElementCount) -> bool {
        let boffset: BitCount32 = offset as BitCount32;
        if boffset < self.data_size {
            let b: u8 = get_at(self.data, boffset as usize / BITS_PER_BYTE);
            (b & (1u8 << (boffset % BITS_PER_BYTE as u32))) != 0
        } else {
            false
        }
    }

    #[inline]
    pub fn get_data_field_mask<T: Primitive + Mask>(
        &self,
        offset: ElementCount,
        mask: <T as Mask>::T,
    ) -> T {
        Mask::mask(self.get_data_field(offset), mask)
    }

    #[inline]
    pub fn get_bool_field_mask(&self, offset: ElementCount, mask: bool) -> bool {
        self.get_bool_field(offset) ^ mask
    }

    /// Slots beyond the pointer section read as null.
    #[inline]
    pub fn get_pointer_field(&self, ptr_index: WirePointerCount) -> PointerReader<'a> {
        if ptr_index < self.pointer_count as WirePointerCount {
            PointerReader {
                arena: self.arena,
                segment_id: self.segment_id,
                pointer: Some(self.pointers + ptr_index),
                nesting_limit: self.nesting_limit,
            }
        } else {
            PointerReader::new_default()
        }
    }

    pub fn total_size(&self) -> Result<MessageSize> {
        let mut result = MessageSize {
            word_count: round_bits_up_to_words(self.data_size as u64) as u64
                + self.pointer_count as u64 * WORDS_PER_POINTER as u64,
            cap_count: 0,
        };

        for i in 0..self.pointer_count as usize {
            result.plus_eq(wire_helpers::total_size(
                self.arena,
                self.segment_id,
                self.pointers + i,
                self.nesting_limit,
            )?);
        }

        Ok(result)
    }
}

fn reader_from_parts(
    arena: &dyn ReaderArena,
    segment_id: u32,
    data: usize,
    pointers: usize,
    data_size: BitCount32,
    pointer_count: WirePointerCount16,
) -> StructReader<'_> {
    let segment = arena.get_segment(segment_id).unwrap_or(&[]);
    let data_len = round_bits_up_to_bytes(data_size as u64) as usize;
    StructReader {
        arena,
        segment_id,
        data: segment.get(data..data + data_len).unwrap_or(&[]),
        pointers,
        data_size,
        pointer_count,
        nesting_limit: 0x7fffffff,
    }
}

pub struct StructBuilder<'a> {
    arena: &'a mut dyn BuilderArena,
    segment_id: u32,
    /// Byte offset of the data section.
    data: usize,
    /// First word of the pointer section.
    pointers: usize,
    data_size: BitCount32,
    pointer_count: WirePointerCount16,
}

impl<'a> StructBuilder<'a> {
    pub fn reborrow(&mut self) -> StructBuilder<'_> {
        StructBuilder {
            arena: &mut *self.arena,
            ..*self
        }
    }

    pub fn as_reader(&self) -> StructReader<'_> {
        reader_from_parts(
            self.arena.as_reader(),
            self.segment_id,
            self.data,
            self.pointers,
            self.data_size,
            self.pointer_count,
        )
    }

    pub fn into_reader(self) -> StructReader<'a> {
        let arena: &'a dyn BuilderArena = self.arena;
        reader_from_parts(
            arena.as_reader(),
            self.segment_id,
            self.data,
            self.pointers,
            self.data_size,
            self.pointer_count,
        )
    }

    pub fn get_data_section_size(&self) -> BitCount32 {
        self.data_size
    }

    pub fn get_pointer_section_size(&self) -> WirePointerCount16 {
        self.pointer_count
    }

    /// Writes past the end of the data section are dropped.
    #[inline]
    pub fn set_data_field<T: Primitive>(&mut self, offset: ElementCount, value: T) {
        if (offset + 1) * T::SIZE * BITS_PER_BYTE <= self.data_size as usize {
            let segment = self.arena.get_segment_mut(self.segment_id);
            set_at(segment, self.data + offset * T::SIZE, value)
        }
    }

    #[inline]
    pub fn set_data_field_mask<T: Primitive + Mask>(
        &mut self,
        offset: ElementCount,
        value: T,
        mask: <T as Mask>::T,
    ) {
        self.set_data_field(offset, Mask::mask(value, mask));
    }

    #[inline]
    pub fn get_data_field<T: Primitive>(&self, offset: ElementCount) -> T {
        if (offset + 1) * T::SIZE * BITS_PER_BYTE <= self.data_size as usize {
            let segment = self.arena.get_segment(self.segment_id).unwrap_or(&[]);
            get_at(segment, self.data + offset * T::SIZE)
        } else {
            T::default()
        }
    }

    #[inline]
    pub fn get_data_field_mask<T: Primitive + Mask>(
        &self,
        offset: ElementCount,
        mask: <T as Mask>::T,
    ) -> T {
        Mask::mask(self.get_data_field(offset), mask)
    }

    #[inline]
    pub fn set_bool_field(&mut self, offset: ElementCount, value: bool) {
        if offset < self.data_size as usize {
            let byte = self.data + offset / BITS_PER_BYTE;
            let bitnum = offset % BITS_PER_BYTE;
            let segment = self.arena.get_segment_mut(self.segment_id);
            segment[byte] = (segment[byte] & !(1 << bitnum)) | ((value as u8) << bitnum);
        }
    }

    #[inline]
    pub fn set_bool_field_mask(&mut self, offset: ElementCount, value: bool, mask: bool) {
        self.set_bool_field(offset, value ^ mask);
    }

    #[inline]
    pub fn get_bool_field(&self, offset: ElementCount) -> bool {
        if offset < self.data_size as usize {
            let segment = self.arena.get_segment(self.segment_id).unwrap_or(&[]);
            let b: u8 = get_at(segment, self.data + offset / BITS_PER_BYTE);
            (b & (1 << (offset % BITS_PER_BYTE))) != 0
        } else {
            false
        }
    }

    #[inline]
    pub fn get_bool_field_mask(&self, offset: ElementCount, mask: bool) -> bool {
        self.get_bool_field(offset) ^ mask
    }

    /// Fails with `PointerIndexOutOfRange` if `ptr_index` is outside the pointer section.
    #[inline]
    pub fn get_pointer_field(self, ptr_index: WirePointerCount) -> Result<PointerBuilder<'a>> {
        if ptr_index >= self.pointer_count as usize {
            return Err(Error::from_kind(ErrorKind::PointerIndexOutOfRange(
                ptr_index,
                self.pointer_count,
            )));
        }
        Ok(PointerBuilder {
            arena: self.arena,
            segment_id: self.segment_id,
            pointer: self.pointers + ptr_index,
        })
    }
}

#[derive(Clone, Copy)]
pub struct ListReader<'a> {
    arena: &'a dyn ReaderArena,
    segment: &'a [u8],
    segment_id: u32,
    /// Byte offset of the first element.
    ptr: usize,
    element_count: ElementCount32,
    step: BitCount32,
    struct_data_size: BitCount32,
    nesting_limit: i32,
    struct_pointer_count: WirePointerCount16,
    element_size: ElementSize,
}

impl<'a> ListReader<'a> {
    pub fn new_default<'b>() -> ListReader<'b> {
        ListReader {
            arena: &NULL_ARENA,
            segment: &[],
            segment_id: 0,
            ptr: 0,
            element_count: 0,
            element_size: ElementSize::Void,
            step: 0,
            struct_data_size: 0,
            struct_pointer_count: 0,
            nesting_limit: 0x7fffffff,
        }
    }

    #[inline]
    pub fn len(&self) -> ElementCount32 {
        self.element_count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_element_size(&self) -> ElementSize {
        self.element_size
    }

    /// Byte offset of element `index` from the start of the segment.
    #[inline]
    fn element_byte(&self, index: ElementCount32) -> usize {
        self.ptr + (index as u64 * self.step as u64 / BITS_PER_BYTE as u64) as usize
    }

    /// The list's elements as raw bytes. Only meaningful for byte-sized elements.
    pub fn into_raw_bytes(self) -> &'a [u8] {
        let len = (self.element_count as u64 * self.step as u64 / BITS_PER_BYTE as u64) as usize;
        self.segment.get(self.ptr..self.ptr + len).unwrap_or(&[])
    }

    #[inline]
    pub fn get_struct_element(&self, index: ElementCount32) -> StructReader<'a> {
        let struct_data = self.element_byte(index);
        let data_len = round_bits_up_to_bytes(self.struct_data_size as u64) as usize;
        let struct_pointers = (struct_data + self.struct_data_size as usize / BITS_PER_BYTE)
            / BYTES_PER_WORD;

        StructReader {
            arena: self.arena,
            segment_id: self.segment_id,
            data: self
                .segment
                .get(struct_data..struct_data + data_len)
                .unwrap_or(&[]),
            pointers: struct_pointers,
            data_size: self.struct_data_size,
            pointer_count: self.struct_pointer_count,
            nesting_limit: self.nesting_limit - 1,
        }
    }

    #[inline]
    pub fn get_pointer_element(self, index: ElementCount32) -> PointerReader<'a> {
        PointerReader {
            arena: self.arena,
            segment_id: self.segment_id,
            pointer: Some(self.element_byte(index) / BYTES_PER_WORD),
            nesting_limit: self.nesting_limit,
        }
    }
}

pub struct ListBuilder<'a> {
    arena: &'a mut dyn BuilderArena,
    segment_id: u32,
    /// Byte offset of the first element.
    ptr: usize,
    element_count: ElementCount32,
    step: BitCount32,
    struct_data_size: BitCount32,
    struct_pointer_count: WirePointerCount16,
    element_size: ElementSize,
}

impl<'a> ListBuilder<'a> {
    /// An empty list that stays attached to `arena`.
    #[inline]
    pub fn new_default(arena: &'a mut dyn BuilderArena) -> ListBuilder<'a> {
        ListBuilder {
            arena,
            segment_id: 0,
            ptr: 0,
            element_count: 0,
            element_size: ElementSize::Void,
            step: 0,
            struct_data_size: 0,
            struct_pointer_count: 0,
        }
    }

    pub fn reborrow(&mut self) -> ListBuilder<'_> {
        ListBuilder {
            arena: &mut *self.arena,
            ..*self
        }
    }

    pub fn as_reader(&self) -> ListReader<'_> {
        ListReader {
            arena: self.arena.as_reader(),
            segment: self.arena.get_segment(self.segment_id).unwrap_or(&[]),
            segment_id: self.segment_id,
            ptr: self.ptr,
            element_count: self.element_count,
            element_size: self.element_size,
            step: self.step,
            struct_data_size: self.struct_data_size,
            struct_pointer_count: self.struct_pointer_count,
            nesting_limit: 0x7fffffff,
        }
    }

    pub fn into_reader(self) -> ListReader<'a> {
        let arena: &'a dyn BuilderArena = self.arena;
        ListReader {
            arena: arena.as_reader(),
            segment: arena.get_segment(self.segment_id).unwrap_or(&[]),
            segment_id: self.segment_id,
            ptr: self.ptr,
            element_count: self.element_count,
            element_size: self.element_size,
            step: self.step,
            struct_data_size: self.struct_data_size,
            struct_pointer_count: self.struct_pointer_count,
            nesting_limit: 0x7fffffff,
        }
    }

    #[inline]
    pub fn len(&self) -> ElementCount32 {
        self.element_count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_element_size(&self) -> ElementSize {
        self.element_size
    }

    #[inline]
    fn element_byte(&self, index: ElementCount32) -> usize {
        self.ptr + (index as u64 * self.step as u64 / BITS_PER_BYTE as u64) as usize
    }

    #[inline]
    pub fn get_struct_element(self, index: ElementCount32) -> StructBuilder<'a> {
        let struct_data = self.element_byte(index);
        let struct_pointers = (struct_data + self.struct_data_size as usize / BITS_PER_BYTE)
            / BYTES_PER_WORD;
        StructBuilder {
            arena: self.arena,
            segment_id: self.segment_id,
            data: struct_data,
            pointers: struct_pointers,
            data_size: self.struct_data_size,
            pointer_count: self.struct_pointer_count,
        }
    }

    #[inline]
    pub fn get_pointer_element(self, index: ElementCount32) -> PointerBuilder<'a> {
        let pointer = self.element_byte(index) / BYTES_PER_WORD;
        PointerBuilder {
            arena: self.arena,
            segment_id: self.segment_id,
            pointer,
        }
    }
}

/// A value that can be an element of a primitive list.
pub trait PrimitiveElement: Sized {
    fn get(list_reader: &ListReader, index: ElementCount32) -> Self;
    fn get_from_builder(list_builder: &ListBuilder, index: ElementCount32) -> Self;
    fn set(list_builder: &mut ListBuilder, index: ElementCount32, value: Self);
    fn element_size() -> ElementSize;
}

macro_rules! primitive_element(
    ($t:ty, $size:ident) => (
        impl PrimitiveElement for $t {
            #[inline]
            fn get(list_reader: &ListReader, index: ElementCount32) -> Self {
                get_at(list_reader.segment, list_reader.element_byte(index))
            }

            #[inline]
            fn get_from_builder(list_builder: &ListBuilder, index: ElementCount32) -> Self {
                let segment = list_builder
                    .arena
                    .get_segment(list_builder.segment_id)
                    .unwrap_or(&[]);
                get_at(segment, list_builder.element_byte(index))
            }

            #[inline]
            fn set(list_builder: &mut ListBuilder, index: ElementCount32, value: Self) {
                let byte = list_builder.element_byte(index);
                let segment = list_builder.arena.get_segment_mut(list_builder.segment_id);
                set_at(segment, byte, value)
            }

            fn element_size() -> ElementSize {
                $size
            }
        }
    )
);

primitive_element!(u8, Byte);
primitive_element!(i8, Byte);
primitive_element!(u16, TwoBytes);
primitive_element!(i16, TwoBytes);
primitive_element!(u32, FourBytes);
primitive_element!(i32, FourBytes);
primitive_element!(f32, FourBytes);
primitive_element!(u64, EightBytes);
primitive_element!(i64, EightBytes);
primitive_element!(f64, EightBytes);

impl PrimitiveElement for bool {
    #[inline]
    fn get(list: &ListReader, index: ElementCount32) -> bool {
        let bindex = index as u64 * list.step as u64;
        let b: u8 = get_at(list.segment, list.ptr + (bindex / BITS_PER_BYTE as u64) as usize);
        (b & (1 << (bindex % BITS_PER_BYTE as u64))) != 0
    }

    #[inline]
    fn get_from_builder(list: &ListBuilder, index: ElementCount32) -> bool {
        let bindex = index as u64 * list.step as u64;
        let segment = list.arena.get_segment(list.segment_id).unwrap_or(&[]);
        let b: u8 = get_at(segment, list.ptr + (bindex / BITS_PER_BYTE as u64) as usize);
        (b & (1 << (bindex % BITS_PER_BYTE as u64))) != 0
    }

    #[inline]
    fn set(list: &mut ListBuilder, index: ElementCount32, value: bool) {
        let bindex = index as u64 * list.step as u64;
        let byte = list.ptr + (bindex / BITS_PER_BYTE as u64) as usize;
        let bitnum = bindex % BITS_PER_BYTE as u64;
        let segment = list.arena.get_segment_mut(list.segment_id);
        if let Some(b) = segment.get_mut(byte) {
            *b = (*b & !(1 << bitnum)) | ((value as u8) << bitnum);
        }
    }

    fn element_size() -> ElementSize {
        Bit
    }
}

impl PrimitiveElement for () {
    #[inline]
    fn get(_list: &ListReader, _index: ElementCount32) {}

    #[inline]
    fn get_from_builder(_list: &ListBuilder, _index: ElementCount32) {}

    #[inline]
    fn set(_list: &mut ListBuilder, _index: ElementCount32, _value: ()) {}

    fn element_size() -> ElementSize {
        Void
    }
}
