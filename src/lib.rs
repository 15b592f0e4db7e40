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

//! # Cap'n Proto message core
//!
//! A zero-copy runtime for the [Cap'n Proto](https://capnproto.org) wire format.
//!
//! Messages live in word-aligned segments owned by an arena. Structs, lists and
//! blobs are reached through relative pointers that are decoded on every access,
//! so readers never parse ahead of time and builders write values in place.
//!
//! The crate exposes the untyped layer that schema-generated code is built on:
//! [`message`] owns the arena and the root pointer, [`any_pointer`] and the
//! list modules wrap [`layout`] views, [`serialize`] frames messages on a byte
//! stream and [`serialize_packed`] adds the zero-run compression on top.

pub mod any_pointer;
pub mod capability;
pub mod data;
pub mod message;
pub mod primitive_list;
pub mod private;
pub mod serialize;
pub mod serialize_packed;
pub mod struct_list;
pub mod text;
pub mod text_list;
pub mod traits;

pub use crate::private::layout;

/// Size of a message. Every generated struct has a method `.total_size()` that returns this.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MessageSize {
    pub word_count: u64,

    /// Size of the capability table.
    pub cap_count: u32,
}

impl MessageSize {
    pub fn plus_eq(&mut self, other: MessageSize) {
        self.word_count += other.word_count;
        self.cap_count += other.cap_count;
    }
}

/// Broad classes of failure. Every [`ErrorKind`] belongs to exactly one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed header, bad tag, truncated stream.
    Format,

    /// An offset or length resolves outside of a segment.
    Bounds,

    /// Traversal budget, nesting depth, segment count or message size exceeded.
    ResourceLimit,

    /// A pointer is encoded as a different kind of object than the one requested.
    TypeMismatch,

    /// A capability slot holds no usable handle.
    CapabilityAbsent,

    /// The underlying byte stream failed.
    Io,

    /// Anything else.
    Failed,
}

/// The specific reason an operation failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    #[error("failed")]
    Failed,

    #[error("I/O error")]
    Io,

    #[error("premature end of file")]
    PrematureEndOfFile,

    #[error("premature end of packed input")]
    PrematureEndOfPackedInput,

    #[error("packed input did not end cleanly on a segment boundary")]
    PackedInputDidNotEndCleanlyOnASegmentBoundary,

    #[error("too many segments: {0}")]
    TooManySegments(usize),

    #[error("invalid number of segments: {0}")]
    InvalidNumberOfSegments(usize),

    #[error("message is too large: {0} words")]
    MessageTooLarge(usize),

    #[error("message ends prematurely: header claimed {0} words, but message only has {1} words")]
    MessageEndsPrematurely(usize, usize),

    #[error("invalid segment id: {0}")]
    InvalidSegmentId(u32),

    #[error("read limit exceeded")]
    ReadLimitExceeded,

    #[error("message is too deeply nested or contains cycles")]
    MessageIsTooDeeplyNested,

    #[error("message size limit exceeded")]
    MessageSizeLimitExceeded,

    #[error("message contains out-of-bounds pointer")]
    MessageContainsOutOfBoundsPointer,

    #[error("malformed double-far pointer")]
    MalformedDoubleFarPointer,

    #[error("unknown pointer type")]
    UnknownPointerType,

    #[error("message contains non-struct pointer where struct pointer was expected")]
    MessageContainsNonStructPointerWhereStructPointerWasExpected,

    #[error("message contains non-list pointer where list pointer was expected")]
    MessageContainsNonListPointerWhereListPointerWasExpected,

    #[error("message contains non-list pointer where text was expected")]
    MessageContainsNonListPointerWhereTextWasExpected,

    #[error("message contains list pointer of non-bytes where text was expected")]
    MessageContainsListPointerOfNonBytesWhereTextWasExpected,

    #[error("message contains non-list pointer where data was expected")]
    MessageContainsNonListPointerWhereDataWasExpected,

    #[error("message contains list pointer of non-bytes where data was expected")]
    MessageContainsListPointerOfNonBytesWhereDataWasExpected,

    #[error("message contains non-capability pointer where capability pointer was expected")]
    MessageContainsNonCapabilityPointerWhereCapabilityPointerWasExpected,

    #[error("message contains text that is not NUL-terminated")]
    MessageContainsTextThatIsNotNULTerminated,

    #[error("text contains non-utf8 data")]
    TextContainsNonUtf8Data,

    #[error("text blob missing NUL terminator")]
    TextBlobMissingNULTerminator,

    #[error("inline composite lists of non-STRUCT type are not supported")]
    InlineCompositeListsOfNonStructTypeAreNotSupported,

    #[error("inline composite list's elements overrun its word count")]
    InlineCompositeListsElementsOverrunItsWordCount,

    #[error("found struct list where bit list was expected")]
    FoundStructListWhereBitListWasExpected,

    #[error("found bit list where struct list was expected")]
    FoundBitListWhereStructListWasExpected,

    #[error("expected a primitive list, but got a list of pointer-only structs")]
    ExpectedAPrimitiveListButGotAListOfPointerOnlyStructs,

    #[error("expected a pointer list, but got a list of data-only structs")]
    ExpectedAPointerListButGotAListOfDataOnlyStructs,

    #[error("message contains list with incompatible element type")]
    MessageContainsListWithIncompatibleElementType,

    #[error("existing list value is incompatible with expected type")]
    ExistingListValueIsIncompatibleWithExpectedType,

    #[error("existing pointer is not a list")]
    ExistingPointerIsNotAList,

    #[error("pointer index {0} is outside a pointer section of {1} pointers")]
    PointerIndexOutOfRange(usize, u16),

    #[error("index {0} is out of range for a list of {1} elements")]
    ListIndexOutOfRange(u32, u32),

    #[error("capability is absent")]
    CapabilityAbsent,
}

impl ErrorKind {
    pub fn category(self) -> ErrorCategory {
        use self::ErrorKind::*;
        match self {
            Failed => ErrorCategory::Failed,
            Io => ErrorCategory::Io,
            PrematureEndOfFile
            | PrematureEndOfPackedInput
            | PackedInputDidNotEndCleanlyOnASegmentBoundary
            | MessageEndsPrematurely(..)
            | MalformedDoubleFarPointer
            | UnknownPointerType
            | MessageContainsTextThatIsNotNULTerminated
            | TextContainsNonUtf8Data
            | TextBlobMissingNULTerminator
            | InlineCompositeListsElementsOverrunItsWordCount => ErrorCategory::Format,
            MessageContainsOutOfBoundsPointer
            | InvalidSegmentId(_)
            | PointerIndexOutOfRange(..)
            | ListIndexOutOfRange(..) => ErrorCategory::Bounds,
            TooManySegments(_)
            | InvalidNumberOfSegments(_)
            | MessageTooLarge(_)
            | ReadLimitExceeded
            | MessageIsTooDeeplyNested
            | MessageSizeLimitExceeded => ErrorCategory::ResourceLimit,
            MessageContainsNonStructPointerWhereStructPointerWasExpected
            | MessageContainsNonListPointerWhereListPointerWasExpected
            | MessageContainsNonListPointerWhereTextWasExpected
            | MessageContainsListPointerOfNonBytesWhereTextWasExpected
            | MessageContainsNonListPointerWhereDataWasExpected
            | MessageContainsListPointerOfNonBytesWhereDataWasExpected
            | MessageContainsNonCapabilityPointerWhereCapabilityPointerWasExpected
            | InlineCompositeListsOfNonStructTypeAreNotSupported
            | FoundStructListWhereBitListWasExpected
            | FoundBitListWhereStructListWasExpected
            | ExpectedAPrimitiveListButGotAListOfPointerOnlyStructs
            | ExpectedAPointerListButGotAListOfDataOnlyStructs
            | MessageContainsListWithIncompatibleElementType
            | ExistingListValueIsIncompatibleWithExpectedType
            | ExistingPointerIsNotAList => ErrorCategory::TypeMismatch,
            CapabilityAbsent => ErrorCategory::CapabilityAbsent,
        }
    }
}

/// Describes an arbitrary error that prevented an operation from completing.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{kind}{}", extra_suffix(.extra))]
pub struct Error {
    /// The general kind of the error.
    pub kind: ErrorKind,

    /// Extra context, such as the message of an underlying I/O error.
    pub extra: String,
}

fn extra_suffix(extra: &str) -> String {
    if extra.is_empty() {
        String::new()
    } else {
        format!(": {extra}")
    }
}

/// Because messages are lazily validated, the return type of any method that reads a pointer field
/// must be wrapped in a Result.
pub type Result<T> = ::core::result::Result<T, Error>;

impl Error {
    pub fn from_kind(kind: ErrorKind) -> Self {
        Self {
            kind,
            extra: String::new(),
        }
    }

    pub fn failed(description: String) -> Self {
        Self {
            kind: ErrorKind::Failed,
            extra: description,
        }
    }

    pub fn extend_message(&mut self, message: &str) {
        if self.extra.is_empty() {
            self.extra.push_str(message);
        } else {
            self.extra.push_str(": ");
            self.extra.push_str(message);
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::from_kind(kind)
    }
}

impl From<::std::io::Error> for Error {
    fn from(err: ::std::io::Error) -> Self {
        if let Some(inner) = err.get_ref().and_then(|e| e.downcast_ref::<Error>()) {
            return inner.clone();
        }
        match err.kind() {
            ::std::io::ErrorKind::UnexpectedEof => Self::from_kind(ErrorKind::PrematureEndOfFile),
            _ => Self {
                kind: ErrorKind::Io,
                extra: err.to_string(),
            },
        }
    }
}

impl From<Error> for ::std::io::Error {
    fn from(err: Error) -> Self {
        ::std::io::Error::new(::std::io::ErrorKind::Other, err)
    }
}

impl From<::core::str::Utf8Error> for Error {
    fn from(err: ::core::str::Utf8Error) -> Self {
        Self {
            kind: ErrorKind::TextContainsNonUtf8Data,
            extra: err.to_string(),
        }
    }
}

/// The segments of a built message, borrowed for output.
pub enum OutputSegments<'a> {
    SingleSegment([&'a [u8]; 1]),
    MultiSegment(Vec<&'a [u8]>),
}

impl<'a> ::core::ops::Deref for OutputSegments<'a> {
    type Target = [&'a [u8]];
    fn deref(&self) -> &[&'a [u8]] {
        match self {
            OutputSegments::SingleSegment(s) => s,
            OutputSegments::MultiSegment(v) => v,
        }
    }
}

impl<'s> message::ReaderSegments for OutputSegments<'s> {
    fn get_segment(&self, id: u32) -> Option<&[u8]> {
        match self {
            OutputSegments::SingleSegment(s) => s.get(id as usize).copied(),
            OutputSegments::MultiSegment(v) => v.get(id as usize).copied(),
        }
    }

    fn len(&self) -> usize {
        match self {
            OutputSegments::SingleSegment(_) => 1,
            OutputSegments::MultiSegment(v) => v.len(),
        }
    }
}
