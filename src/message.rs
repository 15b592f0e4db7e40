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

//! Untyped root container for a Cap'n Proto value.

use crate::any_pointer;
use crate::private::arena::{BuilderArena, BuilderArenaImpl, ReaderArenaImpl};
use crate::private::capability::{extract_cap, CapTable, ClientHook};
use crate::private::layout;
use crate::traits::{FromPointerBuilder, FromPointerReader, SetPointerBuilder};
use crate::{Error, ErrorKind, OutputSegments, Result};

/// Options controlling how data is read.
#[derive(Clone, Copy, Debug)]
pub struct ReaderOptions {
    /// Limits how many total words of data are allowed to be traversed. Traversal is counted when
    /// a new struct or list builder is obtained, e.g. from a get() accessor. This means that calling
    /// the getter for the same sub-struct multiple times will cause it to be double-counted. Once
    /// the traversal limit is reached, an error will be reported.
    ///
    /// This limit exists for security reasons. It is possible for an attacker to construct a message
    /// in which multiple pointers point at the same location. This is technically invalid, but hard
    /// to detect. Using such a message, an attacker could cause a message which is small on the wire
    /// to appear much larger when actually traversed, possibly exhausting server resources leading to
    /// denial-of-service.
    ///
    /// It makes sense to set a traversal limit that is much larger than the underlying message.
    /// Together with sensible coding practices (e.g. trying to avoid calling sub-object getters
    /// multiple times, which is expensive anyway), this should provide adequate protection without
    /// inconvenience.
    pub traversal_limit_in_words: u64,

    /// Limits how deeply nested a message structure can be, e.g. structs containing other structs or
    /// lists of structs.
    ///
    /// Like the traversal limit, this limit exists for security reasons. Since it is common to use
    /// recursive code to traverse recursive data structures, an attacker could easily cause a stack
    /// overflow by sending a very-deeply-nested (or even cyclic) message, without the message even
    /// being very large. The default limit of 64 is probably low enough to prevent any chance of
    /// stack overflow, yet high enough that it is never a problem in practice.
    pub nesting_limit: i32,
}

pub const DEFAULT_READER_OPTIONS: ReaderOptions = ReaderOptions {
    traversal_limit_in_words: 8 * 1024 * 1024,
    nesting_limit: 64,
};

impl Default for ReaderOptions {
    fn default() -> ReaderOptions {
        DEFAULT_READER_OPTIONS
    }
}

impl ReaderOptions {
    pub fn new() -> ReaderOptions {
        DEFAULT_READER_OPTIONS
    }

    pub fn nesting_limit(&mut self, value: i32) -> &mut ReaderOptions {
        self.nesting_limit = value;
        self
    }

    pub fn traversal_limit_in_words(&mut self, value: u64) -> &mut ReaderOptions {
        self.traversal_limit_in_words = value;
        self
    }
}

/// An object that manages the buffers underlying a Cap'n Proto message reader.
pub trait ReaderSegments {
    /// Gets the segment with index `idx`. Returns `None` if `idx` is out of range.
    fn get_segment(&self, idx: u32) -> Option<&[u8]>;

    /// Gets the number of segments.
    fn len(&self) -> usize {
        let mut i = 0;
        while self.get_segment(i as u32).is_some() {
            i += 1;
        }
        i
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S> ReaderSegments for &S
where
    S: ReaderSegments + ?Sized,
{
    fn get_segment(&self, idx: u32) -> Option<&[u8]> {
        (**self).get_segment(idx)
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

/// An array of segments.
pub struct SegmentArray<'a> {
    segments: &'a [&'a [u8]],
}

impl<'a> SegmentArray<'a> {
    pub fn new(segments: &'a [&'a [u8]]) -> SegmentArray<'a> {
        SegmentArray { segments }
    }
}

impl<'b> ReaderSegments for SegmentArray<'b> {
    fn get_segment(&self, id: u32) -> Option<&[u8]> {
        self.segments.get(id as usize).copied()
    }

    fn len(&self) -> usize {
        self.segments.len()
    }
}

impl<'b> ReaderSegments for [&'b [u8]] {
    fn get_segment(&self, id: u32) -> Option<&[u8]> {
        self.get(id as usize).copied()
    }

    fn len(&self) -> usize {
        <[&[u8]]>::len(self)
    }
}

/// A container used to read a message.
pub struct Reader<S>
where
    S: ReaderSegments,
{
    arena: ReaderArenaImpl<S>,
    nesting_limit: i32,
}

impl<S> Reader<S>
where
    S: ReaderSegments,
{
    pub fn new(segments: S, options: ReaderOptions) -> Self {
        Reader {
            arena: ReaderArenaImpl::new(segments, options),
            nesting_limit: options.nesting_limit,
        }
    }

    /// Attaches the capability table that travels alongside the message's bytes.
    pub fn with_cap_table(mut self, cap_table: CapTable) -> Self {
        self.arena.set_cap_table(cap_table);
        self
    }

    fn get_root_internal(&self) -> Result<any_pointer::Reader<'_>> {
        let pointer_reader = layout::PointerReader::get_root(&self.arena, 0, 0, self.nesting_limit)?;
        Ok(any_pointer::Reader::new(pointer_reader))
    }

    /// Gets the root of the message, interpreting it as the given type.
    pub fn get_root<'a, T: FromPointerReader<'a>>(&'a self) -> Result<T> {
        self.get_root_internal()?.get_as()
    }

    pub fn get_segment(&self, id: u32) -> Option<&[u8]> {
        self.arena.segments().get_segment(id)
    }

    pub fn segment_count(&self) -> usize {
        self.arena.segments().len()
    }

    /// Returns a new reference to the capability at `index`, if the table holds one.
    pub fn get_cap(&self, index: u32) -> Option<Box<dyn ClientHook>> {
        extract_cap(self.arena.cap_table(), index as usize)
    }

    pub fn cap_table_len(&self) -> usize {
        self.arena.cap_table().len()
    }

    pub fn into_segments(self) -> S {
        self.arena.into_segments()
    }
}

/// Decides how large the segments of a message under construction are.
///
/// The arena owns the memory; an allocator only hands out sizes, and may refuse.
pub trait Allocator {
    /// Returns the capacity, in words, of a new segment that must hold at least `minimum_size`
    /// words.
    fn allocate_segment(&mut self, minimum_size: u32) -> Result<u32>;

    /// Asks for segment `segment_id`, currently `current_size` words, to grow to at least
    /// `minimum_size` words. Returns the new capacity, or `None` to have the caller use
    /// another segment instead.
    fn grow_segment(
        &mut self,
        _segment_id: u32,
        _current_size: u32,
        _minimum_size: u32,
    ) -> Result<Option<u32>> {
        Ok(None)
    }
}

/// A container used to build a message.
pub struct Builder<A>
where
    A: Allocator,
{
    arena: BuilderArenaImpl<A>,
}

impl<A> Builder<A>
where
    A: Allocator,
{
    pub fn new(allocator: A) -> Self {
        Builder {
            arena: BuilderArenaImpl::new(allocator),
        }
    }

    fn get_root_internal(&mut self) -> Result<any_pointer::Builder<'_>> {
        if self.arena.is_empty() {
            self.arena.allocate_segment(1)?;
            if self.arena.allocate(0, 1)?.is_none() {
                return Err(Error::from_kind(ErrorKind::MessageSizeLimitExceeded));
            }
        }
        Ok(any_pointer::Builder::new(layout::PointerBuilder::get_root(
            &mut self.arena,
            0,
            0,
        )))
    }

    /// Initializes the root as a value of the given type.
    pub fn init_root<'a, T: FromPointerBuilder<'a>>(&'a mut self) -> Result<T> {
        self.get_root_internal()?.init_as()
    }

    /// Gets the root, interpreting it as the given type.
    pub fn get_root<'a, T: FromPointerBuilder<'a>>(&'a mut self) -> Result<T> {
        self.get_root_internal()?.get_as()
    }

    pub fn get_root_as_reader<'a, T: FromPointerReader<'a>>(&'a self) -> Result<T> {
        if self.arena.is_empty() {
            any_pointer::Reader::new(layout::PointerReader::new_default()).get_as()
        } else {
            let pointer_reader =
                layout::PointerReader::get_root(self.arena.as_reader(), 0, 0, 0x7fffffff)?;
            any_pointer::Reader::new(pointer_reader).get_as()
        }
    }

    /// Sets the root to a deep copy of the given value.
    pub fn set_root<From: SetPointerBuilder>(&mut self, value: From) -> Result<()> {
        self.get_root_internal()?.set_as(value)
    }

    /// Appends `cap` to the capability table and returns its index.
    pub fn add_cap(&mut self, cap: Box<dyn ClientHook>) -> u32 {
        self.arena.inject_cap(cap)
    }

    /// Returns a new reference to the capability at `index`, if the table holds one.
    pub fn get_cap(&self, index: u32) -> Option<Box<dyn ClientHook>> {
        extract_cap(self.arena.cap_table(), index as usize)
    }

    pub fn cap_table_len(&self) -> usize {
        self.arena.cap_table().len()
    }

    pub fn get_segments_for_output(&self) -> OutputSegments<'_> {
        self.arena.get_segments_for_output()
    }

    /// Turns the builder into a reader without limits. The reader holds its own references to
    /// the capability table.
    pub fn into_reader(self) -> Reader<Builder<A>> {
        let cap_table = self
            .arena
            .cap_table()
            .iter()
            .map(|slot| slot.as_ref().map(|hook| hook.add_ref()))
            .collect();
        Reader::new(
            self,
            ReaderOptions {
                traversal_limit_in_words: u64::MAX,
                nesting_limit: i32::MAX,
            },
        )
        .with_cap_table(cap_table)
    }

    pub fn into_allocator(self) -> A {
        self.arena.into_allocator()
    }
}

impl<A> ReaderSegments for Builder<A>
where
    A: Allocator,
{
    fn get_segment(&self, id: u32) -> Option<&[u8]> {
        self.get_segments_for_output().get(id as usize).copied()
    }

    fn len(&self) -> usize {
        self.arena.len()
    }
}

/// Standard segment allocator with a simple growth heuristic.
#[derive(Debug)]
pub struct HeapAllocator {
    // Minimum number of words in the next allocation.
    next_size: u32,

    // How to update next_size after an allocation.
    allocation_strategy: AllocationStrategy,

    // Upper bound on the words handed out across all segments.
    max_message_words: u32,

    allocated_words: u64,
}

#[derive(Clone, Copy, Debug)]
pub enum AllocationStrategy {
    /// Allocates the same number of words for each segment, to the extent possible.
    /// This strategy is primarily useful for testing cross-segment pointers.
    FixedSize,

    /// Increases segment size by a multiplicative factor for each subsequent segment.
    GrowHeuristically,
}

pub const SUGGESTED_FIRST_SEGMENT_WORDS: u32 = 1024;
pub const SUGGESTED_ALLOCATION_STRATEGY: AllocationStrategy = AllocationStrategy::GrowHeuristically;

impl Default for HeapAllocator {
    fn default() -> Self {
        HeapAllocator::new()
    }
}

impl HeapAllocator {
    pub fn new() -> HeapAllocator {
        HeapAllocator {
            next_size: SUGGESTED_FIRST_SEGMENT_WORDS,
            allocation_strategy: SUGGESTED_ALLOCATION_STRATEGY,
            max_message_words: u32::MAX,
            allocated_words: 0,
        }
    }

    /// Sets the size of the initial segment in words, where 1 word = 8 bytes.
    pub fn first_segment_words(mut self, value: u32) -> HeapAllocator {
        self.next_size = value;
        self
    }

    /// Sets the allocation strategy for segments after the first one.
    pub fn allocation_strategy(mut self, value: AllocationStrategy) -> HeapAllocator {
        self.allocation_strategy = value;
        self
    }

    /// Caps the total number of words across all segments of the message.
    pub fn max_message_words(mut self, value: u32) -> HeapAllocator {
        self.max_message_words = value;
        self
    }
}

impl Allocator for HeapAllocator {
    fn allocate_segment(&mut self, minimum_size: u32) -> Result<u32> {
        let remaining = u64::from(self.max_message_words).saturating_sub(self.allocated_words);
        if u64::from(minimum_size) > remaining {
            tracing::warn!(
                requested = minimum_size,
                limit = self.max_message_words,
                "message size limit exceeded"
            );
            return Err(Error::from_kind(ErrorKind::MessageSizeLimitExceeded));
        }
        let size = ::core::cmp::max(minimum_size, self.next_size);
        let size = ::core::cmp::min(u64::from(size), remaining) as u32;
        self.allocated_words += u64::from(size);

        if let AllocationStrategy::GrowHeuristically = self.allocation_strategy {
            self.next_size = self.next_size.saturating_add(size);
        }
        Ok(size)
    }
}

impl Builder<HeapAllocator> {
    pub fn new_default() -> Builder<HeapAllocator> {
        Builder::new(HeapAllocator::new())
    }
}

/// Keeps the whole message in one segment, which grows in place as needed.
#[derive(Debug)]
pub struct SingleSegmentAllocator {
    first_segment_words: u32,
    max_message_words: u32,
    allocated: bool,
}

impl Default for SingleSegmentAllocator {
    fn default() -> Self {
        SingleSegmentAllocator::new()
    }
}

impl SingleSegmentAllocator {
    pub fn new() -> SingleSegmentAllocator {
        SingleSegmentAllocator {
            first_segment_words: SUGGESTED_FIRST_SEGMENT_WORDS,
            max_message_words: u32::MAX,
            allocated: false,
        }
    }

    pub fn first_segment_words(mut self, value: u32) -> SingleSegmentAllocator {
        self.first_segment_words = value;
        self
    }

    pub fn max_message_words(mut self, value: u32) -> SingleSegmentAllocator {
        self.max_message_words = value;
        self
    }
}

impl Allocator for SingleSegmentAllocator {
    fn allocate_segment(&mut self, minimum_size: u32) -> Result<u32> {
        if self.allocated || minimum_size > self.max_message_words {
            tracing::warn!(
                requested = minimum_size,
                limit = self.max_message_words,
                "message size limit exceeded"
            );
            return Err(Error::from_kind(ErrorKind::MessageSizeLimitExceeded));
        }
        self.allocated = true;
        let size = ::core::cmp::max(minimum_size, self.first_segment_words);
        Ok(::core::cmp::min(size, self.max_message_words))
    }

    fn grow_segment(
        &mut self,
        segment_id: u32,
        current_size: u32,
        minimum_size: u32,
    ) -> Result<Option<u32>> {
        if segment_id != 0 || minimum_size > self.max_message_words {
            return Ok(None);
        }
        let doubled = current_size.saturating_mul(2);
        let size = ::core::cmp::min(
            ::core::cmp::max(doubled, minimum_size),
            self.max_message_words,
        );
        tracing::debug!(from = current_size, to = size, "growing segment 0");
        Ok(Some(size))
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AllocationStrategy, Allocator, Builder, HeapAllocator, ReaderOptions,
        SingleSegmentAllocator,
    };
    use crate::layout::StructSize;
    use crate::{any_pointer, ErrorKind};

    #[test]
    fn reader_options_chain() {
        let mut options = ReaderOptions::new();
        options.nesting_limit(3).traversal_limit_in_words(10);
        assert_eq!(options.nesting_limit, 3);
        assert_eq!(options.traversal_limit_in_words, 10);
        assert_eq!(ReaderOptions::default().nesting_limit, 64);
    }

    #[test]
    fn heap_allocator_grows_and_caps() {
        let mut allocator = HeapAllocator::new()
            .first_segment_words(4)
            .max_message_words(20);
        assert_eq!(allocator.allocate_segment(1).unwrap(), 4);
        assert_eq!(allocator.allocate_segment(1).unwrap(), 8);
        // Only 8 words left under the cap.
        assert_eq!(allocator.allocate_segment(2).unwrap(), 8);
        assert_eq!(
            allocator.allocate_segment(1).unwrap_err().kind,
            ErrorKind::MessageSizeLimitExceeded
        );

        let mut fixed = HeapAllocator::new()
            .first_segment_words(4)
            .allocation_strategy(AllocationStrategy::FixedSize);
        assert_eq!(fixed.allocate_segment(1).unwrap(), 4);
        assert_eq!(fixed.allocate_segment(1).unwrap(), 4);
        assert_eq!(fixed.allocate_segment(6).unwrap(), 6);
    }

    #[test]
    fn single_segment_grows_in_place() {
        let mut message = Builder::new(SingleSegmentAllocator::new().first_segment_words(2));
        {
            let root: any_pointer::Builder = message.init_root().unwrap();
            let mut s = root
                .init_struct(StructSize {
                    data: 1,
                    pointers: 1,
                })
                .unwrap();
            s.set_data_field::<u64>(0, 17);
            s.get_pointer_field(0).unwrap().init_data(100).unwrap()[99] = 5;
        }
        let segments = message.get_segments_for_output();
        assert_eq!(segments.len(), 1);
        // root + struct + 13 words of data
        assert_eq!(segments[0].len(), 16 * 8);
    }

    #[test]
    fn single_segment_respects_limit() {
        let mut message = Builder::new(
            SingleSegmentAllocator::new()
                .first_segment_words(4)
                .max_message_words(8),
        );
        let root: any_pointer::Builder = message.init_root().unwrap();
        let err = root.initn_as::<crate::data::Builder>(100).err().unwrap();
        assert_eq!(err.kind, ErrorKind::MessageSizeLimitExceeded);
    }

    #[test]
    fn empty_builder_reads_as_null() {
        let message = Builder::new_default();
        let root: any_pointer::Reader = message.get_root_as_reader().unwrap();
        assert!(root.is_null());
        assert_eq!(message.get_segments_for_output().len(), 0);
    }
}
