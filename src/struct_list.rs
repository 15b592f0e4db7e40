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

//! List of structs.
//!
//! Elements are untyped: readers hand out `StructReader`s and builders take the
//! `StructSize` that new or upgraded elements should have.

use crate::private::layout::{
    ElementSize, ListBuilder, ListReader, PointerBuilder, PointerReader, StructBuilder,
    StructReader, StructSize,
};
use crate::traits::{FromPointerReader, IndexMove, ListIter, SetPointerBuilder};
use crate::{Error, ErrorKind, Result};

#[derive(Clone, Copy)]
pub struct Reader<'a> {
    reader: ListReader<'a>,
}

impl<'a> Reader<'a> {
    pub fn new(reader: ListReader<'a>) -> Reader<'a> {
        Reader { reader }
    }

    pub fn len(&self) -> u32 {
        self.reader.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(self) -> ListIter<Reader<'a>, StructReader<'a>> {
        ListIter::new(self, self.len())
    }

    /// Gets the element at position `index`. Panics if `index` is greater than or
    /// equal to `len()`.
    pub fn get(self, index: u32) -> StructReader<'a> {
        assert!(index < self.len());
        self.reader.get_struct_element(index)
    }

    /// Gets the element at position `index`. Returns `None` if `index`
    /// is greater than or equal to `len()`.
    pub fn try_get(self, index: u32) -> Option<StructReader<'a>> {
        if index < self.len() {
            Some(self.reader.get_struct_element(index))
        } else {
            None
        }
    }

    pub fn into_list_reader(self) -> ListReader<'a> {
        self.reader
    }
}

impl<'a> FromPointerReader<'a> for Reader<'a> {
    fn get_from_pointer(reader: &PointerReader<'a>) -> Result<Reader<'a>> {
        Ok(Reader {
            reader: reader.get_list(ElementSize::InlineComposite)?,
        })
    }
}

impl<'a> IndexMove<u32, StructReader<'a>> for Reader<'a> {
    fn index_move(&self, index: u32) -> StructReader<'a> {
        self.get(index)
    }
}

impl<'a> SetPointerBuilder for Reader<'a> {
    fn set_pointer_builder(mut pointer: PointerBuilder<'_>, value: Reader<'a>) -> Result<()> {
        pointer.set_list(&value.reader)
    }
}

impl<'a> ::core::iter::IntoIterator for Reader<'a> {
    type Item = StructReader<'a>;
    type IntoIter = ListIter<Reader<'a>, Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct Builder<'a> {
    builder: ListBuilder<'a>,
}

impl<'a> Builder<'a> {
    /// Replaces the target of `pointer` with a zeroed list of `count` structs of `size`.
    pub fn init_pointer(
        pointer: PointerBuilder<'a>,
        count: u32,
        size: StructSize,
    ) -> Result<Builder<'a>> {
        Ok(Builder {
            builder: pointer.init_struct_list(count, size)?,
        })
    }

    /// Opens the list behind `pointer` for writing. A list whose elements are smaller
    /// than `size` is first copied into a list of the larger layout.
    pub fn get_from_pointer(pointer: PointerBuilder<'a>, size: StructSize) -> Result<Builder<'a>> {
        Ok(Builder {
            builder: pointer.get_struct_list(size)?,
        })
    }

    pub fn len(&self) -> u32 {
        self.builder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
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

    /// Gets the element at position `index`. Fails with `ListIndexOutOfRange` if
    /// `index` is greater than or equal to `len()`.
    pub fn get(self, index: u32) -> Result<StructBuilder<'a>> {
        let len = self.len();
        if index >= len {
            return Err(Error::from_kind(ErrorKind::ListIndexOutOfRange(index, len)));
        }
        Ok(self.builder.get_struct_element(index))
    }

    /// Gets the element at position `index`. Returns `None` if `index`
    /// is greater than or equal to `len()`.
    pub fn try_get(self, index: u32) -> Option<StructBuilder<'a>> {
        if index < self.len() {
            Some(self.builder.get_struct_element(index))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::any_pointer;
    use crate::layout::{StructReader, StructSize};
    use crate::message;
    use crate::primitive_list;
    use crate::struct_list;
    use crate::ErrorKind;

    const POINT: StructSize = StructSize {
        data: 1,
        pointers: 1,
    };

    #[test]
    fn build_and_read() {
        let mut message = message::Builder::new_default();
        {
            let root: any_pointer::Builder = message.init_root().unwrap();
            let mut list =
                struct_list::Builder::init_pointer(root.into_pointer_builder(), 3, POINT).unwrap();
            assert_eq!(list.len(), 3);
            for i in 0..3 {
                let mut element = list.reborrow().get(i).unwrap();
                element.set_data_field::<u32>(0, i * 10);
                element.set_data_field::<i16>(3, -(i as i16));
                element
                    .get_pointer_field(0)
                    .unwrap()
                    .set_text(&format!("point {i}"))
                    .unwrap();
            }
            assert!(list.reborrow().try_get(3).is_none());
            let err = list.get(3).err().unwrap();
            assert_eq!(err.kind, ErrorKind::ListIndexOutOfRange(3, 3));
        }

        let list: struct_list::Reader = message.get_root_as_reader().unwrap();
        let xs: Vec<u32> = list.iter().map(|s| s.get_data_field::<u32>(0)).collect();
        assert_eq!(xs, vec![0, 10, 20]);
        assert_eq!(list.get(2).get_data_field::<i16>(3), -2);
        assert_eq!(
            list.get(1).get_pointer_field(0).get_text().unwrap(),
            "point 1"
        );
    }

    #[test]
    fn primitive_list_reads_as_struct_list() {
        let mut message = message::Builder::new_default();
        {
            let root: any_pointer::Builder = message.init_root().unwrap();
            let mut list = root.initn_as::<primitive_list::Builder<u32>>(2).unwrap();
            list.set(0, 7).unwrap();
            list.set(1, 9).unwrap();
        }
        let list: struct_list::Reader = message.get_root_as_reader().unwrap();
        let element: StructReader = list.get(1);
        assert_eq!(element.get_data_field::<u32>(0), 9);
        assert_eq!(element.get_data_field::<u32>(1), 0);
        assert!(element.get_pointer_field(0).is_null());
    }

    #[test]
    fn get_upgrades_to_requested_size() {
        let mut message = message::Builder::new_default();
        {
            let root: any_pointer::Builder = message.init_root().unwrap();
            let mut list = struct_list::Builder::init_pointer(
                root.into_pointer_builder(),
                2,
                StructSize {
                    data: 1,
                    pointers: 0,
                },
            )
            .unwrap();
            list.reborrow().get(1).unwrap().set_data_field::<u64>(0, 42);
        }
        {
            let root: any_pointer::Builder = message.get_root().unwrap();
            let list =
                struct_list::Builder::get_from_pointer(root.into_pointer_builder(), POINT).unwrap();
            let mut element = list.get(1).unwrap();
            assert_eq!(element.get_data_section_size(), 64);
            assert_eq!(element.get_pointer_section_size(), 1);
            element
                .reborrow()
                .get_pointer_field(0)
                .unwrap()
                .set_text("grown")
                .unwrap();
        }
        let list: struct_list::Reader = message.get_root_as_reader().unwrap();
        assert_eq!(list.get(1).get_data_field::<u64>(0), 42);
        assert_eq!(list.get(1).get_pointer_field(0).get_text().unwrap(), "grown");
    }
}
