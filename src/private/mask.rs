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

//! Default-value masks for data fields.
//!
//! A field is stored XOR-ed with its default, so zeroed storage reads back as the
//! default. Floating-point fields are masked on their bit patterns.

pub trait Mask {
    /// The representation a mask is given in.
    type T;
    fn mask(value: Self, mask: Self::T) -> Self;
}

macro_rules! mask_by_xor {
    ($($t:ty),*) => {$(
        impl Mask for $t {
            type T = $t;
            #[inline]
            fn mask(value: $t, mask: $t) -> $t {
                value ^ mask
            }
        }
    )*};
}

macro_rules! mask_by_bits {
    ($($t:ty => $bits:ty),*) => {$(
        impl Mask for $t {
            type T = $bits;
            #[inline]
            fn mask(value: $t, mask: $bits) -> $t {
                <$t>::from_bits(value.to_bits() ^ mask)
            }
        }
    )*};
}

mask_by_xor!(i8, i16, i32, i64, u8, u16, u32, u64);
mask_by_bits!(f32 => u32, f64 => u64);

#[cfg(test)]
mod tests {
    use super::Mask;

    #[test]
    fn zero_reads_as_default() {
        assert_eq!(<i32 as Mask>::mask(0, -7), -7);
        assert_eq!(<u16 as Mask>::mask(0, 0xbeef), 0xbeef);
        assert_eq!(<f64 as Mask>::mask(0.0, 1.5f64.to_bits()), 1.5);
    }

    #[test]
    fn masking_twice_is_identity() {
        let default = (-2.25f32).to_bits();
        let stored = <f32 as Mask>::mask(10.0, default);
        assert_eq!(<f32 as Mask>::mask(stored, default), 10.0);
        assert_eq!(<i64 as Mask>::mask(<i64 as Mask>::mask(99, 5), 5), 99);
    }
}
