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

//! Reading and writing of messages using the
//! [standard stream framing](https://capnproto.org/encoding.html#serialization-over-a-stream).

use std::io::{Read, Write};

use byteorder::{ByteOrder, LittleEndian};

use crate::message;
use crate::private::units::BYTES_PER_WORD;
use crate::{Error, ErrorKind, Result};

/// Segment tables declaring this many segments or more are rejected.
pub const SEGMENTS_COUNT_LIMIT: usize = 512;

/// Segments read from a single flat slice of bytes.
pub struct SliceSegments<'a> {
    words: &'a [u8],
    segment_slices: Vec<(usize, usize)>,
}

impl<'a> message::ReaderSegments for SliceSegments<'a> {
    fn get_segment(&self, id: u32) -> Option<&[u8]> {
        let (a, b) = *self.segment_slices.get(id as usize)?;
        Some(&self.words[a * BYTES_PER_WORD..b * BYTES_PER_WORD])
    }

    fn len(&self) -> usize {
        self.segment_slices.len()
    }
}

/// Reads a serialized message from the front of `slice` without copying, and advances
/// `slice` past the message.
pub fn read_message_from_flat_slice<'a>(
    slice: &mut &'a [u8],
    options: message::ReaderOptions,
) -> Result<message::Reader<SliceSegments<'a>>> {
    let all_bytes = *slice;
    let mut bytes = *slice;
    let (num_words, segment_slices) = match read_segment_table(&mut bytes, options)? {
        Some(table) => table,
        None => return Err(Error::from_kind(ErrorKind::PrematureEndOfFile)),
    };
    let available_words = bytes.len() / BYTES_PER_WORD;
    if num_words > available_words {
        return Err(Error::from_kind(ErrorKind::MessageEndsPrematurely(
            num_words,
            available_words,
        )));
    }
    let header_len = all_bytes.len() - bytes.len();
    let message_len = num_words * BYTES_PER_WORD;
    *slice = &all_bytes[header_len + message_len..];
    Ok(message::Reader::new(
        SliceSegments {
            words: &bytes[..message_len],
            segment_slices,
        },
        options,
    ))
}

/// Segments read from a stream into a single owned buffer.
pub struct OwnedSegments {
    segment_slices: Vec<(usize, usize)>,
    owned_space: Vec<u8>,
}

impl message::ReaderSegments for OwnedSegments {
    fn get_segment(&self, id: u32) -> Option<&[u8]> {
        let (a, b) = *self.segment_slices.get(id as usize)?;
        Some(&self.owned_space[a * BYTES_PER_WORD..b * BYTES_PER_WORD])
    }

    fn len(&self) -> usize {
        self.segment_slices.len()
    }
}

/// Reads a serialized message from a stream with the provided options.
///
/// For optimal performance, `read` should be a buffered reader type.
pub fn read_message<R>(
    read: R,
    options: message::ReaderOptions,
) -> Result<message::Reader<OwnedSegments>>
where
    R: Read,
{
    match try_read_message(read, options)? {
        Some(message) => Ok(message),
        None => Err(Error::from_kind(ErrorKind::PrematureEndOfFile)),
    }
}

/// Like `read_message`, but returns `None` if the stream is already at a clean end of file.
pub fn try_read_message<R>(
    mut read: R,
    options: message::ReaderOptions,
) -> Result<Option<message::Reader<OwnedSegments>>>
where
    R: Read,
{
    let (total_words, segment_slices) = match read_segment_table(&mut read, options)? {
        Some(table) => table,
        None => return Ok(None),
    };
    Ok(Some(read_segments(
        &mut read,
        total_words,
        segment_slices,
        options,
    )?))
}

/// Fills `buf`, unless the stream ends before the first byte. Returns whether anything was read.
fn read_exact_or_eof<R>(read: &mut R, buf: &mut [u8]) -> Result<bool>
where
    R: Read,
{
    let mut pos = 0;
    while pos < buf.len() {
        match read.read(&mut buf[pos..]) {
            Ok(0) if pos == 0 => return Ok(false),
            Ok(0) => return Err(Error::from_kind(ErrorKind::PrematureEndOfFile)),
            Ok(n) => pos += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

/// Reads a segment table from `read` and returns the total number of words across all
/// segments, as well as the segment offsets. Returns `None` on a clean end of file.
///
/// The segment table format for streams is defined in the Cap'n Proto
/// [encoding documentation](https://capnproto.org/encoding.html)
fn read_segment_table<R>(
    read: &mut R,
    options: message::ReaderOptions,
) -> Result<Option<(usize, Vec<(usize, usize)>)>>
where
    R: Read,
{
    let mut buf: [u8; 8] = [0; 8];

    // read the first Word, which contains segment_count and the 1st segment length
    if !read_exact_or_eof(read, &mut buf)? {
        return Ok(None);
    }
    let segment_count = LittleEndian::read_u32(&buf[0..4]).wrapping_add(1) as usize;

    if segment_count >= SEGMENTS_COUNT_LIMIT {
        tracing::warn!(segment_count, "segment table declares too many segments");
        return Err(Error::from_kind(ErrorKind::TooManySegments(segment_count)));
    } else if segment_count == 0 {
        return Err(Error::from_kind(ErrorKind::InvalidNumberOfSegments(
            segment_count,
        )));
    }

    let mut segment_slices = Vec::with_capacity(segment_count);
    let mut total_words = LittleEndian::read_u32(&buf[4..8]) as usize;
    segment_slices.push((0, total_words));

    if segment_count > 1 {
        // The rest of the table, padded to a whole number of words.
        let mut segment_sizes = vec![0u8; (segment_count & !1) * 4];
        read.read_exact(&mut segment_sizes[..])?;
        for idx in 0..(segment_count - 1) {
            let segment_len =
                LittleEndian::read_u32(&segment_sizes[(idx * 4)..(idx + 1) * 4]) as usize;

            segment_slices.push((total_words, total_words + segment_len));
            total_words += segment_len;
        }
    }

    // Don't accept a message which the receiver couldn't possibly traverse without hitting the
    // traversal limit. Without this check, a malicious client could transmit a very large segment
    // size to make the receiver allocate excessive space and possibly crash.
    if total_words as u64 > options.traversal_limit_in_words {
        tracing::warn!(
            total_words,
            limit = options.traversal_limit_in_words,
            "message exceeds the traversal limit"
        );
        return Err(Error::from_kind(ErrorKind::MessageTooLarge(total_words)));
    }

    tracing::debug!(segment_count, total_words, "read segment table");
    Ok(Some((total_words, segment_slices)))
}

/// Reads segments from `read`.
fn read_segments<R>(
    read: &mut R,
    total_words: usize,
    segment_slices: Vec<(usize, usize)>,
    options: message::ReaderOptions,
) -> Result<message::Reader<OwnedSegments>>
where
    R: Read,
{
    let mut owned_space = vec![0u8; total_words * BYTES_PER_WORD];
    read.read_exact(&mut owned_space[..])?;
    let segments = OwnedSegments {
        segment_slices,
        owned_space,
    };
    Ok(message::Reader::new(segments, options))
}

/// Constructs a flat vector containing the entire message. Fails if the message
/// has too many segments to frame.
pub fn write_message_to_bytes<A>(message: &message::Builder<A>) -> Result<Vec<u8>>
where
    A: message::Allocator,
{
    flatten_segments(&*message.get_segments_for_output())
}

pub fn write_message_segments_to_bytes<R>(message: &R) -> Result<Vec<u8>>
where
    R: message::ReaderSegments,
{
    flatten_segments(message)
}

fn flatten_segments<R: message::ReaderSegments + ?Sized>(segments: &R) -> Result<Vec<u8>> {
    let word_count = compute_serialized_size(segments);
    let mut result = Vec::with_capacity(word_count * BYTES_PER_WORD);
    write_segment_table_internal(&mut result, segments)?;
    for segment in segments_of(segments) {
        result.extend_from_slice(segment);
    }
    Ok(result)
}

/// Writes the provided message to `write`.
///
/// For optimal performance, `write` should be a buffered writer. `flush` will not be called on
/// the writer.
pub fn write_message<W, A>(mut write: W, message: &message::Builder<A>) -> Result<()>
where
    W: Write,
    A: message::Allocator,
{
    let segments = message.get_segments_for_output();
    write_segment_table(&mut write, &segments)?;
    write_segments(&mut write, &*segments)
}

pub fn write_message_segments<W, R>(mut write: W, segments: &R) -> Result<()>
where
    W: Write,
    R: message::ReaderSegments + ?Sized,
{
    write_segment_table_internal(&mut write, segments)?;
    write_segments(&mut write, segments)
}

fn write_segment_table<W>(write: &mut W, segments: &[&[u8]]) -> Result<()>
where
    W: Write,
{
    write_segment_table_internal(write, segments)
}

/// Segments in order. A message without segments is framed as one empty segment.
fn segments_of<R: message::ReaderSegments + ?Sized>(segments: &R) -> Vec<&[u8]> {
    let mut result: Vec<&[u8]> = (0..segments.len() as u32)
        .map_while(|id| segments.get_segment(id))
        .collect();
    if result.is_empty() {
        result.push(&[]);
    }
    result
}

/// Writes a segment table to `write`.
fn write_segment_table_internal<W, R>(write: &mut W, segments: &R) -> Result<()>
where
    W: Write,
    R: message::ReaderSegments + ?Sized,
{
    let segments = segments_of(segments);
    let segment_count = segments.len();
    if segment_count >= SEGMENTS_COUNT_LIMIT {
        return Err(Error::from_kind(ErrorKind::TooManySegments(segment_count)));
    }

    let mut buf: [u8; 8] = [0; 8];

    // write the first Word, which contains segment_count and the 1st segment length
    LittleEndian::write_u32(&mut buf[0..4], segment_count as u32 - 1);
    LittleEndian::write_u32(&mut buf[4..8], (segments[0].len() / BYTES_PER_WORD) as u32);
    write.write_all(&buf)?;

    if segment_count > 1 {
        // Padded with a zero entry when the count is even.
        let mut buf = vec![0; (segment_count & !1) * 4];
        for idx in 1..segment_count {
            LittleEndian::write_u32(
                &mut buf[(idx - 1) * 4..idx * 4],
                (segments[idx].len() / BYTES_PER_WORD) as u32,
            );
        }
        write.write_all(&buf)?;
    }
    Ok(())
}

/// Writes segments to `write`.
fn write_segments<W, R: message::ReaderSegments + ?Sized>(write: &mut W, segments: &R) -> Result<()>
where
    W: Write,
{
    for segment in segments_of(segments) {
        write.write_all(segment)?;
    }
    Ok(())
}

fn compute_serialized_size<R: message::ReaderSegments + ?Sized>(segments: &R) -> usize {
    let segments = segments_of(segments);
    // Table size
    let mut size = (segments.len() / 2) + 1;
    for segment in segments {
        size += segment.len() / BYTES_PER_WORD;
    }
    size
}

/// Returns the number of words required to serialize the message.
pub fn compute_serialized_size_in_words<A>(message: &message::Builder<A>) -> usize
where
    A: message::Allocator,
{
    compute_serialized_size(&*message.get_segments_for_output())
}
