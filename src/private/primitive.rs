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

//! Little-endian access to fixed-width values stored in segment bytes.

pub trait Primitive: Copy + Default {
    /// Width of the value on the wire, in bytes.
    const SIZE: usize;

    /// Decodes a value from exactly `SIZE` little-endian bytes.
    fn get(raw: &[u8]) -> Self;

    /// Encodes `value` into exactly `SIZE` bytes.
    fn set(raw: &mut [u8], value: Self);
}

macro_rules! primitive_impl(
    ($typ:ty, $n:expr) => (
        impl Primitive for $typ {
            const SIZE: usize = $n;

            #[inline]
            fn get(raw: &[u8]) -> Self {
                let mut buf = [0u8; $n];
                buf.copy_from_slice(raw);
                <$typ>::from_le_bytes(buf)
            }

            #[inline]
            fn set(raw: &mut [u8], value: Self) {
                raw.copy_from_slice(&value.to_le_bytes());
            }
        }
        );
    );

primitive_impl!(u8, 1);
primitive_impl!(i8, 1);
primitive_impl!(u16, 2);
primitive_impl!(i16, 2);
primitive_impl!(u32, 4);
primitive_impl!(i32, 4);
primitive_impl!(u64, 8);
primitive_impl!(i64, 8);
primitive_impl!(f32, 4);
primitive_impl!(f64, 8);

/// Reads a `T` at `byte_offset`, or zero if it lies beyond the end of `bytes`.
#[inline]
pub fn get_at<T: Primitive>(bytes: &[u8], byte_offset: usize) -> T {
    match bytes.get(byte_offset..byte_offset + T::SIZE) {
        Some(raw) => T::get(raw),
        None => T::default(),
    }
}

/// Writes `value` at `byte_offset`. Writes that would land past the end are dropped.
#[inline]
pub fn set_at<T: Primitive>(bytes: &mut [u8], byte_offset: usize, value: T) {
    if let Some(raw) = bytes.get_mut(byte_offset..byte_offset + T::SIZE) {
        T::set(raw, value)
    }
}
