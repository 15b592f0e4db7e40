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

//! List of strings containing UTF-8 encoded text.

use crate::private::layout::{ElementSize, ListBuilder, ListReader, PointerBuilder, PointerReader};
use crate::traits::{FromPointerBuilder, FromPointerReader, IndexMove, ListIter};
use crate::{text, Error, ErrorKind, Result};

#[derive(Clone, Copy)]
pub struct Reader<'a> {
    reader: ListReader<'a>,
}

impl<'a> Reader<'a> {
    pub fn len(&self) -> u32 {
        self.reader.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(self) -> ListIter<Reader<'a>, Result<text::Reader<'a>>> {
        let l = self.len();
        ListIter::new(self, l)
    }
}

impl<'a> FromPointerReader<'a> for Reader<'a> {
    fn get_from_pointer(reader: &PointerReader<'a>) -> Result<Reader<'a>> {
        Ok(Reader {
            reader: reader.get_list(ElementSize::Pointer)?,
        })
    }
}

impl<'a> IndexMove<u32, Result<text::Reader<'a>>> for Reader<'a> {
    fn index_move(&self, index: u32) -> Result<text::Reader<'a>> {
        self.get(index)
    }
}

impl<'a> Reader<'a> {
    /// Gets the text at position `index`. Panics if `index` is greater than or
    /// equal to `len()`.
    pub fn get(self, index: u32) -> Result<text::Reader<'a>> {
        assert!(index < self.len());
        self.reader.get_pointer_element(index).get_text()
    }

    /// Gets the text at position `index`. Returns `None` if `index`
    /// is greater than or equal to `len()`.
    pub fn try_get(self, index: u32) -> Option<Result<text::Reader<'a>>> {
        if index < self.len() {
            Some(self.reader.get_pointer_element(index).get_text())
        } else {
            None
        }
    }
}

pub struct Builder<'a> {
    builder: ListBuilder<'a>,
}

impl<'a> Builder<'a> {
    pub fn len(&self) -> u32 {
        self.builder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set(&mut self, index: u32, value: &str) -> Result<()> {
        self.check_index(index)?;
        self.builder
            .reborrow()
            .get_pointer_element(index)
            .set_text(value)
    }

    pub fn reborrow(&mut self) -> Builder<'_> {
        Builder {
            builder: self.builder.reborrow(),
        }
    }

    pub fn as_reader(&self) -> Reader<'_> {
        Reader {
            reader: self.builder.as_reader(),
        }
    }

    pub fn into_reader(self) -> Reader<'a> {
        Reader {
            reader: self.builder.into_reader(),
        }
    }

    /// Gets the text at position `index` for in-place edits.
    pub fn get(self, index: u32) -> Result<text::Builder<'a>> {
        self.check_index(index)?;
        self.builder.get_pointer_element(index).get_text()
    }

    fn check_index(&self, index: u32) -> Result<()> {
        if index < self.len() {
            Ok(())
        } else {
            Err(Error::from_kind(ErrorKind::ListIndexOutOfRange(index, self.len())))
        }
    }

    /// Gets the text at position `index`. Returns `None` if `index`
    /// is greater than or equal to `len()`.
    pub fn try_get(self, index: u32) -> Option<Result<text::Builder<'a>>> {
        if index < self.len() {
            Some(self.builder.get_pointer_element(index).get_text())
        } else {
            None
        }
    }
}

impl<'a> FromPointerBuilder<'a> for Builder<'a> {
    fn init_pointer(builder: PointerBuilder<'a>, size: u32) -> Result<Builder<'a>> {
        Ok(Builder {
            builder: builder.init_list(ElementSize::Pointer, size)?,
        })
    }

    fn get_from_pointer(builder: PointerBuilder<'a>) -> Result<Builder<'a>> {
        Ok(Builder {
            builder: builder.get_list(ElementSize::Pointer)?,
        })
    }
}

impl<'a> crate::traits::SetPointerBuilder for Reader<'a> {
    fn set_pointer_builder(mut pointer: PointerBuilder<'_>, value: Reader<'a>) -> Result<()> {
        pointer.set_list(&value.reader)
    }
}

impl<'a> ::core::iter::IntoIterator for Reader<'a> {
    type Item = Result<text::Reader<'a>>;
    type IntoIter = ListIter<Reader<'a>, Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use crate::any_pointer;
    use crate::message;
    use crate::text_list;
    use crate::ErrorKind;

    #[test]
    fn set_get_and_copy() {
        let mut message = message::Builder::new_default();
        {
            let root: any_pointer::Builder = message.init_root().unwrap();
            let mut names = root.initn_as::<text_list::Builder>(3).unwrap();
            names.set(0, "alpha").unwrap();
            names.set(2, "gamma").unwrap();
            let mut middle = names.reborrow().get(1).unwrap();
            assert_eq!(middle.len(), 0);
            assert_eq!(middle.remaining(), 0);
            middle.clear();
        }

        let names: text_list::Reader = message.get_root_as_reader().unwrap();
        let collected: Vec<&str> = names.iter().map(|t| t.unwrap()).collect();
        assert_eq!(collected, vec!["alpha", "", "gamma"]);

        let mut copy = message::Builder::new_default();
        copy.set_root(names).unwrap();
        let copied: text_list::Reader = copy.get_root_as_reader().unwrap();
        assert_eq!(copied.get(2).unwrap(), "gamma");
        assert!(copied.try_get(3).is_none());
    }

    #[test]
    fn out_of_range_writes_are_errors() {
        let mut message = message::Builder::new_default();
        let root: any_pointer::Builder = message.init_root().unwrap();
        let mut names = root.initn_as::<text_list::Builder>(2).unwrap();
        assert_eq!(
            names.set(2, "late").err().map(|e| e.kind),
            Some(ErrorKind::ListIndexOutOfRange(2, 2))
        );
        assert!(names.get(5).is_err());
    }
}
