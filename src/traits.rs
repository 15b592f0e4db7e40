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

use crate::private::layout::{PointerBuilder, PointerReader, StructReader};
use crate::Result;

use std::marker::PhantomData;

pub trait FromPointerReader<'a>: Sized {
    fn get_from_pointer(reader: &PointerReader<'a>) -> Result<Self>;
}

pub trait FromPointerBuilder<'a>: Sized {
    /// Replaces whatever the pointer referenced with a fresh value. `size` is an
    /// element or byte count for lists and blobs and is ignored otherwise.
    fn init_pointer(builder: PointerBuilder<'a>, size: u32) -> Result<Self>;
    fn get_from_pointer(builder: PointerBuilder<'a>) -> Result<Self>;
}

/// A value that can be deep-copied into a pointer slot.
pub trait SetPointerBuilder: Sized {
    fn set_pointer_builder(builder: PointerBuilder<'_>, from: Self) -> Result<()>;
}

impl<'a> FromPointerReader<'a> for StructReader<'a> {
    fn get_from_pointer(reader: &PointerReader<'a>) -> Result<StructReader<'a>> {
        reader.get_struct()
    }
}

impl<'a> SetPointerBuilder for StructReader<'a> {
    fn set_pointer_builder(mut builder: PointerBuilder<'_>, from: StructReader<'a>) -> Result<()> {
        builder.set_struct(&from)
    }
}

pub trait IndexMove<I, T> {
    fn index_move(&self, index: I) -> T;
}

pub struct ListIter<T, U> {
    marker: PhantomData<U>,
    list: T,
    index: u32,
    size: u32,
}

impl<T, U> ListIter<T, U> {
    pub fn new(list: T, size: u32) -> ListIter<T, U> {
        ListIter {
            list,
            index: 0,
            size,
            marker: PhantomData,
        }
    }
}

impl<U, T: IndexMove<u32, U>> Iterator for ListIter<T, U> {
    type Item = U;
    fn next(&mut self) -> Option<U> {
        if self.index < self.size {
            let result = self.list.index_move(self.index);
            self.index += 1;
            Some(result)
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.size - self.index) as usize;
        (remaining, Some(remaining))
    }

    fn nth(&mut self, p: usize) -> Option<U> {
        let remaining = (self.size - self.index) as usize;
        if p < remaining {
            self.index += p as u32;
            self.next()
        } else {
            self.index = self.size;
            None
        }
    }
}

impl<U, T: IndexMove<u32, U>> ExactSizeIterator for ListIter<T, U> {}

impl<U, T: IndexMove<u32, U>> DoubleEndedIterator for ListIter<T, U> {
    fn next_back(&mut self) -> Option<U> {
        if self.size > self.index {
            self.size -= 1;
            Some(self.list.index_move(self.size))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{IndexMove, ListIter};

    struct Squares;

    impl IndexMove<u32, u32> for Squares {
        fn index_move(&self, index: u32) -> u32 {
            index * index
        }
    }

    #[test]
    fn iterates_from_both_ends() {
        let mut iter = ListIter::new(Squares, 5);
        assert_eq!(iter.len(), 5);
        assert_eq!(iter.next(), Some(0));
        assert_eq!(iter.next_back(), Some(16));
        assert_eq!(iter.len(), 3);
        assert_eq!(iter.nth(1), Some(4));
        assert_eq!(iter.collect::<Vec<_>>(), vec![9]);
    }
}
