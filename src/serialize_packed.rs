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
//! [packed stream encoding](https://capnproto.org/encoding.html#packing).

use std::io::{BufRead, Read, Write};

use crate::message;
use crate::private::units::BYTES_PER_WORD;
use crate::serialize;
use crate::{Error, ErrorKind, Result};

/// A `BufRead` wrapper that unpacks packed data. Returns an error on any `read()`
/// call that would end within an all-zero (tag 0x00) or uncompressed (tag 0xff)
/// run of words. Calls that come from `serialize_packed::read_message()` and
/// `serialize_packed::try_read_message()` always mirror `write()` calls from
/// `serialize_packed::write_message()`, so they always safely span such runs.
pub struct PackedRead<R>
where
    R: BufRead,
{
    inner: R,
}

impl<R> PackedRead<R>
where
    R: BufRead,
{
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        let buf = loop {
            match self.inner.fill_buf() {
                Ok(buf) => break buf,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        };
        match buf.first() {
            Some(&b) => {
                self.inner.consume(1);
                Ok(Some(b))
            }
            None => Ok(None),
        }
    }

    fn require_byte(&mut self) -> Result<u8> {
        self.next_byte()?
            .ok_or_else(|| Error::from_kind(ErrorKind::PrematureEndOfPackedInput))
    }

    /// Copies `out.len()` bytes straight from the input.
    fn read_raw(&mut self, out: &mut [u8]) -> Result<()> {
        let mut pos = 0;
        while pos < out.len() {
            let buf = match self.inner.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if buf.is_empty() {
                return Err(Error::from_kind(ErrorKind::PrematureEndOfPackedInput));
            }
            let n = buf.len().min(out.len() - pos);
            out[pos..pos + n].copy_from_slice(&buf[..n]);
            self.inner.consume(n);
            pos += n;
        }
        Ok(())
    }

    /// Fills all of `out`, which must be a whole number of words. Returns 0 if the
    /// input is exhausted before the first tag byte.
    fn unpack_into(&mut self, out: &mut [u8]) -> Result<usize> {
        let mut pos = 0;
        while pos < out.len() {
            let tag = if pos == 0 {
                match self.next_byte()? {
                    Some(tag) => tag,
                    None => return Ok(0),
                }
            } else {
                self.require_byte()?
            };

            for n in 0..BYTES_PER_WORD {
                out[pos + n] = if tag & (1u8 << n) != 0 {
                    self.require_byte()?
                } else {
                    0
                };
            }
            pos += BYTES_PER_WORD;

            if tag == 0 || tag == 0xff {
                let run_length = self.require_byte()? as usize * BYTES_PER_WORD;
                if run_length > out.len() - pos {
                    return Err(Error::from_kind(
                        ErrorKind::PackedInputDidNotEndCleanlyOnASegmentBoundary,
                    ));
                }
                if tag == 0 {
                    out[pos..pos + run_length].fill(0);
                } else {
                    self.read_raw(&mut out[pos..pos + run_length])?;
                }
                pos += run_length;
            }
        }
        Ok(out.len())
    }
}

impl<R> Read for PackedRead<R>
where
    R: BufRead,
{
    fn read(&mut self, out_buf: &mut [u8]) -> std::io::Result<usize> {
        if out_buf.is_empty() {
            return Ok(0);
        }
        if out_buf.len() % BYTES_PER_WORD != 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "PackedRead reads must be word-aligned",
            ));
        }
        Ok(self.unpack_into(out_buf)?)
    }
}

/// Reads a packed message from a stream using the provided options.
pub fn read_message<R>(
    read: R,
    options: message::ReaderOptions,
) -> Result<message::Reader<serialize::OwnedSegments>>
where
    R: BufRead,
{
    let packed_read = PackedRead { inner: read };
    serialize::read_message(packed_read, options)
}

/// Like read_message(), but returns None instead of an error if there are zero bytes left in `read`.
pub fn try_read_message<R>(
    read: R,
    options: message::ReaderOptions,
) -> Result<Option<message::Reader<serialize::OwnedSegments>>>
where
    R: BufRead,
{
    let packed_read = PackedRead { inner: read };
    serialize::try_read_message(packed_read, options)
}

/// A `Write` wrapper that packs any bytes written to it. Every `write()` must
/// cover a whole number of words, and runs never continue across calls.
pub struct PackedWrite<W>
where
    W: Write,
{
    inner: W,
}

impl<W> PackedWrite<W>
where
    W: Write,
{
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W> Write for PackedWrite<W>
where
    W: Write,
{
    fn write(&mut self, in_buf: &[u8]) -> std::io::Result<usize> {
        if in_buf.len() % BYTES_PER_WORD != 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "PackedWrite writes must be word-aligned",
            ));
        }
        let mut packed = Vec::with_capacity(in_buf.len() + in_buf.len() / BYTES_PER_WORD + 2);
        pack_words(in_buf, &mut packed);
        self.inner.write_all(&packed)?;
        Ok(in_buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Appends the packed form of `input` to `out`. A trailing partial word is
/// treated as if it were padded with zeros.
fn pack_words(input: &[u8], out: &mut Vec<u8>) {
    let word_count = (input.len() + BYTES_PER_WORD - 1) / BYTES_PER_WORD;
    let word_at = |idx: usize| -> [u8; 8] {
        let mut word = [0u8; 8];
        let start = idx * BYTES_PER_WORD;
        let end = input.len().min(start + BYTES_PER_WORD);
        word[..end - start].copy_from_slice(&input[start..end]);
        word
    };

    let mut idx = 0;
    while idx < word_count {
        let word = word_at(idx);
        idx += 1;

        let tag_pos = out.len();
        out.push(0);
        let mut tag = 0u8;
        for (n, &b) in word.iter().enumerate() {
            if b != 0 {
                tag |= 1 << n;
                out.push(b);
            }
        }
        out[tag_pos] = tag;

        if tag == 0 {
            // An all-zero word is followed by a count of consecutive zero words.
            let mut run = 0usize;
            while idx < word_count && run < 255 && word_at(idx) == [0; 8] {
                run += 1;
                idx += 1;
            }
            out.push(run as u8);
        } else if tag == 0xff {
            // An all-nonzero word is followed by a count of consecutive words that
            // are copied as-is. The run stops at the first word with two or more zeros.
            let run_start = idx;
            let limit = word_count.min(run_start + 255);
            while idx < limit && word_at(idx).iter().filter(|&&b| b == 0).count() < 2 {
                idx += 1;
            }
            out.push((idx - run_start) as u8);
            for run_idx in run_start..idx {
                out.extend_from_slice(&word_at(run_idx));
            }
        }
    }
}

/// Packs a flat byte buffer in one go.
pub fn pack(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() / 2 + 2);
    pack_words(bytes, &mut out);
    out
}

/// Expands packed bytes until the input is exhausted. Unlike `PackedRead`, runs
/// may extend to the end of the output.
pub fn unpack(packed: &[u8]) -> Result<Vec<u8>> {
    let premature = || Error::from_kind(ErrorKind::PrematureEndOfPackedInput);
    let mut out = Vec::with_capacity(packed.len() * 2);
    let mut pos = 0;
    while pos < packed.len() {
        let tag = packed[pos];
        pos += 1;
        for n in 0..BYTES_PER_WORD {
            if tag & (1u8 << n) != 0 {
                out.push(*packed.get(pos).ok_or_else(premature)?);
                pos += 1;
            } else {
                out.push(0);
            }
        }
        if tag == 0 || tag == 0xff {
            let run_length = *packed.get(pos).ok_or_else(premature)? as usize * BYTES_PER_WORD;
            pos += 1;
            if tag == 0 {
                out.resize(out.len() + run_length, 0);
            } else {
                let run = packed.get(pos..pos + run_length).ok_or_else(premature)?;
                out.extend_from_slice(run);
                pos += run_length;
            }
        }
    }
    Ok(out)
}

/// Writes a packed message to a stream.
///
/// The only source of errors from this function are `write.write()` calls. If `write.write()`
/// never fails, then neither will this function.
pub fn write_message<W, A>(write: W, message: &crate::message::Builder<A>) -> Result<()>
where
    W: Write,
    A: crate::message::Allocator,
{
    let packed_write = PackedWrite { inner: write };
    serialize::write_message(packed_write, message)
}

/// Packs a message into a new byte vector, with the same run boundaries as
/// `write_message()` produces.
pub fn write_message_to_bytes<A>(message: &crate::message::Builder<A>) -> Result<Vec<u8>>
where
    A: crate::message::Allocator,
{
    let mut result = Vec::new();
    write_message(&mut result, message)?;
    Ok(result)
}
