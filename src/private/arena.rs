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

use crate::message;
use crate::message::{Allocator, ReaderSegments};
use crate::private::capability::{extract_cap, CapTable, ClientHook};
use crate::private::read_limiter::ReadLimiter;
use crate::private::units::*;
use crate::OutputSegments;
use crate::{Error, ErrorKind, Result};

pub type SegmentId = u32;

/// Positions handed to an arena are word indexes within a segment.
pub trait ReaderArena {
    /// Returns the bytes of segment `id`, truncated to a whole number of words.
    fn get_segment(&self, id: u32) -> Result<&[u8]>;

    /// Resolves `start + offset_in_words`, failing if the result leaves the segment.
    fn check_offset(&self, segment_id: u32, start: usize, offset_in_words: i32) -> Result<usize>;
    fn contains_interval(&self, segment_id: u32, start: usize, size_in_words: usize) -> Result<()>;
    fn amplified_read(&self, virtual_amount: u64) -> Result<()>;

    fn nesting_limit(&self) -> i32;

    /// Returns a new reference to the capability at `index` of the message's table.
    fn extract_cap(&self, index: usize) -> Option<Box<dyn ClientHook>>;
}

fn segment_words(segment: &[u8]) -> usize {
    segment.len() / BYTES_PER_WORD
}

fn checked_offset(segment: &[u8], start: usize, offset_in_words: i32) -> Result<usize> {
    let len = segment_words(segment) as i64;
    let target = start as i64 + i64::from(offset_in_words);
    if start as i64 > len || target < 0 || target > len {
        Err(Error::from_kind(ErrorKind::MessageContainsOutOfBoundsPointer))
    } else {
        Ok(target as usize)
    }
}

fn check_interval(segment: &[u8], start: usize, size_in_words: usize) -> Result<()> {
    match start.checked_add(size_in_words) {
        Some(end) if end <= segment_words(segment) => Ok(()),
        _ => Err(Error::from_kind(ErrorKind::MessageContainsOutOfBoundsPointer)),
    }
}

pub struct ReaderArenaImpl<S> {
    segments: S,
    read_limiter: ReadLimiter,
    nesting_limit: i32,
    cap_table: CapTable,
}

impl<S> ReaderArenaImpl<S>
where
    S: ReaderSegments,
{
    pub fn new(segments: S, options: message::ReaderOptions) -> Self {
        let limiter = ReadLimiter::new(options.traversal_limit_in_words);
        Self {
            segments,
            read_limiter: limiter,
            nesting_limit: options.nesting_limit,
            cap_table: Vec::new(),
        }
    }

    pub fn into_segments(self) -> S {
        self.segments
    }

    pub fn segments(&self) -> &S {
        &self.segments
    }

    pub fn set_cap_table(&mut self, cap_table: CapTable) {
        self.cap_table = cap_table;
    }

    pub fn cap_table(&self) -> &CapTable {
        &self.cap_table
    }
}

impl<S> ReaderArena for ReaderArenaImpl<S>
where
    S: ReaderSegments,
{
    fn get_segment(&self, id: u32) -> Result<&[u8]> {
        match self.segments.get_segment(id) {
            Some(seg) => Ok(&seg[..segment_words(seg) * BYTES_PER_WORD]),
            None => Err(Error::from_kind(ErrorKind::InvalidSegmentId(id))),
        }
    }

    fn check_offset(&self, segment_id: u32, start: usize, offset_in_words: i32) -> Result<usize> {
        checked_offset(self.get_segment(segment_id)?, start, offset_in_words)
    }

    fn contains_interval(&self, id: u32, start: usize, size_in_words: usize) -> Result<()> {
        check_interval(self.get_segment(id)?, start, size_in_words)?;
        self.read_limiter.can_read(size_in_words as u64)
    }

    fn amplified_read(&self, virtual_amount: u64) -> Result<()> {
        self.read_limiter.can_read(virtual_amount)
    }

    fn nesting_limit(&self) -> i32 {
        self.nesting_limit
    }

    fn extract_cap(&self, index: usize) -> Option<Box<dyn ClientHook>> {
        extract_cap(&self.cap_table, index)
    }
}

pub trait BuilderArena: ReaderArena {
    /// Reserves `amount` words at the end of segment `segment_id`. Returns `None` if
    /// the segment cannot hold them, in which case the caller needs a far pointer.
    fn allocate(&mut self, segment_id: u32, amount: WordCount32) -> Result<Option<u32>>;
    fn allocate_anywhere(&mut self, amount: u32) -> Result<(SegmentId, u32)>;

    /// Returns the full capacity of a segment, including words not yet allocated.
    fn get_segment_mut(&mut self, id: u32) -> &mut [u8];

    /// Appends `cap` to the capability table and returns its index.
    fn inject_cap(&mut self, cap: Box<dyn ClientHook>) -> u32;

    /// Returns the index of a live table entry whose `get_ptr()` equals `ptr`.
    fn find_cap(&self, ptr: usize) -> Option<u32>;

    fn as_reader(&self) -> &dyn ReaderArena;
}

/// A memory segment used in building a message.
struct BuilderSegment {
    /// Zero-initialized storage for `capacity` words.
    data: Vec<u8>,

    /// Total number of words the segment could potentially use.
    capacity: u32,

    /// Number of words already used in the segment.
    allocated: u32,
}

pub struct BuilderArenaImpl<A>
where
    A: Allocator,
{
    allocator: A,
    segments: Vec<BuilderSegment>,
    cap_table: CapTable,
}

impl<A> BuilderArenaImpl<A>
where
    A: Allocator,
{
    pub fn new(allocator: A) -> Self {
        Self {
            allocator,
            segments: Vec::new(),
            cap_table: Vec::new(),
        }
    }

    /// Allocates a new segment with capacity for at least `minimum_size` words.
    pub fn allocate_segment(&mut self, minimum_size: u32) -> Result<()> {
        let capacity = self.allocator.allocate_segment(minimum_size)?;
        tracing::debug!(
            segment = self.segments.len(),
            capacity,
            "allocated new segment"
        );
        self.segments.push(BuilderSegment {
            data: vec![0; capacity as usize * BYTES_PER_WORD],
            capacity,
            allocated: 0,
        });
        Ok(())
    }

    pub fn get_segments_for_output(&self) -> OutputSegments {
        if self.segments.len() == 1 {
            let seg = &self.segments[0];
            OutputSegments::SingleSegment([&seg.data[..seg.allocated as usize * BYTES_PER_WORD]])
        } else {
            OutputSegments::MultiSegment(
                self.segments
                    .iter()
                    .map(|seg| &seg.data[..seg.allocated as usize * BYTES_PER_WORD])
                    .collect(),
            )
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cap_table(&self) -> &CapTable {
        &self.cap_table
    }

    pub fn into_allocator(self) -> A {
        self.allocator
    }
}

impl<A> ReaderArena for BuilderArenaImpl<A>
where
    A: Allocator,
{
    fn get_segment(&self, id: u32) -> Result<&[u8]> {
        match self.segments.get(id as usize) {
            Some(seg) => Ok(&seg.data[..seg.allocated as usize * BYTES_PER_WORD]),
            None => Err(Error::from_kind(ErrorKind::InvalidSegmentId(id))),
        }
    }

    fn check_offset(&self, segment_id: u32, start: usize, offset_in_words: i32) -> Result<usize> {
        checked_offset(self.get_segment(segment_id)?, start, offset_in_words)
    }

    fn contains_interval(&self, id: u32, start: usize, size_in_words: usize) -> Result<()> {
        check_interval(self.get_segment(id)?, start, size_in_words)
    }

    fn amplified_read(&self, _virtual_amount: u64) -> Result<()> {
        Ok(())
    }

    fn nesting_limit(&self) -> i32 {
        0x7fffffff
    }

    fn extract_cap(&self, index: usize) -> Option<Box<dyn ClientHook>> {
        extract_cap(&self.cap_table, index)
    }
}

impl<A> BuilderArena for BuilderArenaImpl<A>
where
    A: Allocator,
{
    fn allocate(&mut self, segment_id: u32, amount: WordCount32) -> Result<Option<u32>> {
        let seg = &mut self.segments[segment_id as usize];
        if amount > seg.capacity - seg.allocated {
            let needed = u64::from(seg.allocated) + u64::from(amount);
            if needed > u64::from(u32::MAX) {
                return Ok(None);
            }
            match self
                .allocator
                .grow_segment(segment_id, seg.capacity, needed as u32)?
            {
                Some(capacity) if capacity >= needed as u32 => {
                    tracing::debug!(segment = segment_id, capacity, "grew segment in place");
                    seg.data.resize(capacity as usize * BYTES_PER_WORD, 0);
                    seg.capacity = capacity;
                }
                _ => return Ok(None),
            }
        }
        let result = seg.allocated;
        seg.allocated += amount;
        Ok(Some(result))
    }

    fn allocate_anywhere(&mut self, amount: u32) -> Result<(SegmentId, u32)> {
        // first try the existing segments, then try allocating a new segment.
        let allocated_len = self.segments.len() as u32;
        for segment_id in 0..allocated_len {
            if let Some(idx) = self.allocate(segment_id, amount)? {
                return Ok((segment_id, idx));
            }
        }

        self.allocate_segment(amount)?;
        match self.allocate(allocated_len, amount)? {
            Some(idx) => Ok((allocated_len, idx)),
            None => Err(Error::from_kind(ErrorKind::MessageSizeLimitExceeded)),
        }
    }

    fn get_segment_mut(&mut self, id: u32) -> &mut [u8] {
        &mut self.segments[id as usize].data
    }

    fn inject_cap(&mut self, cap: Box<dyn ClientHook>) -> u32 {
        self.cap_table.push(Some(cap));
        self.cap_table.len() as u32 - 1
    }

    fn find_cap(&self, ptr: usize) -> Option<u32> {
        self.cap_table
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|hook| hook.get_ptr() == ptr))
            .map(|idx| idx as u32)
    }

    fn as_reader(&self) -> &dyn ReaderArena {
        self
    }
}

/// Backs default-valued readers, which never touch a segment.
pub struct NullArena;

impl ReaderArena for NullArena {
    fn get_segment(&self, id: u32) -> Result<&[u8]> {
        Err(Error::from_kind(ErrorKind::InvalidSegmentId(id)))
    }

    fn check_offset(&self, segment_id: u32, _start: usize, _offset_in_words: i32) -> Result<usize> {
        Err(Error::from_kind(ErrorKind::InvalidSegmentId(segment_id)))
    }

    fn contains_interval(&self, id: u32, _start: usize, _size: usize) -> Result<()> {
        Err(Error::from_kind(ErrorKind::InvalidSegmentId(id)))
    }

    fn amplified_read(&self, _virtual_amount: u64) -> Result<()> {
        Ok(())
    }

    fn nesting_limit(&self) -> i32 {
        0x7fffffff
    }

    fn extract_cap(&self, _index: usize) -> Option<Box<dyn ClientHook>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{BuilderArena, BuilderArenaImpl, ReaderArena, ReaderArenaImpl};
    use crate::message::{AllocationStrategy, HeapAllocator, ReaderOptions};
    use crate::ErrorKind;

    #[test]
    fn reader_bounds() {
        let seg = [0u8; 24];
        let segments: &[&[u8]] = &[&seg];
        let arena = ReaderArenaImpl::new(segments, *ReaderOptions::new().traversal_limit_in_words(4));
        arena.contains_interval(0, 1, 2).unwrap();
        assert_eq!(
            arena.contains_interval(0, 2, 2).unwrap_err().kind,
            ErrorKind::MessageContainsOutOfBoundsPointer
        );
        assert_eq!(arena.check_offset(0, 1, 2).unwrap(), 3);
        assert!(arena.check_offset(0, 1, 3).is_err());
        assert!(arena.check_offset(0, 1, -2).is_err());
        assert_eq!(arena.get_segment(1).unwrap_err().kind, ErrorKind::InvalidSegmentId(1));

        // two words were charged above
        arena.amplified_read(2).unwrap();
        assert_eq!(arena.amplified_read(1).unwrap_err().kind, ErrorKind::ReadLimitExceeded);
    }

    #[test]
    fn allocate_spills_into_new_segment() {
        let mut arena = BuilderArenaImpl::new(
            HeapAllocator::new()
                .first_segment_words(4)
                .allocation_strategy(AllocationStrategy::FixedSize),
        );
        arena.allocate_segment(1).unwrap();
        assert_eq!(arena.allocate(0, 3).unwrap(), Some(0));
        assert_eq!(arena.allocate(0, 2).unwrap(), None);
        assert_eq!(arena.allocate_anywhere(2).unwrap(), (1, 0));
        assert_eq!(arena.allocate_anywhere(1).unwrap(), (0, 3));
        assert_eq!(arena.allocate_anywhere(9).unwrap(), (2, 0));
        assert_eq!(arena.len(), 3);
        let output = arena.get_segments_for_output();
        assert_eq!(output.len(), 3);
        assert_eq!(output[0].len(), 32);
        assert_eq!(output[1].len(), 16);
        assert_eq!(output[2].len(), 72);
    }
}
