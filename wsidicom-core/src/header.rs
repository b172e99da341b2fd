//! Element and item headers: the fixed-shape parts that precede a value.

use crate::{Length, Tag, VR};

/// A data type containing a DICOM header: a tag plus a declared length.
pub trait Header {
    /// The element's tag.
    fn tag(&self) -> Tag;

    /// The declared value length, in bytes; may be [`Length::UNDEFINED`].
    fn len(&self) -> Length;

    /// Whether this is an item-start delimiter, `(FFFE,E000)`.
    fn is_item(&self) -> bool {
        self.tag() == Tag::ITEM
    }

    /// Whether this is an item delimitation delimiter, `(FFFE,E00D)`.
    fn is_item_delimiter(&self) -> bool {
        self.tag() == Tag::ITEM_DELIMITATION
    }

    /// Whether this is a sequence delimitation delimiter, `(FFFE,E0DD)`.
    fn is_sequence_delimiter(&self) -> bool {
        self.tag() == Tag::SEQUENCE_DELIMITATION
    }
}

/// The header of an ordinary data element: tag, VR, and declared length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataElementHeader {
    pub tag: Tag,
    pub vr: VR,
    pub len: Length,
}

impl DataElementHeader {
    pub fn new(tag: Tag, vr: VR, len: Length) -> Self {
        DataElementHeader { tag, vr, len }
    }
}

impl Header for DataElementHeader {
    fn tag(&self) -> Tag {
        self.tag
    }

    fn len(&self) -> Length {
        self.len
    }
}

/// The header of one of the three `FFFE`-group delimiter tags: item start,
/// item delimitation, or sequence delimitation. These carry no VR.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SequenceItemHeader {
    /// Start of a new item, with the declared length of its content.
    Item { len: Length },
    /// End of the enclosing undefined-length item.
    ItemDelimiter,
    /// End of the enclosing undefined-length sequence.
    SequenceDelimiter,
}

impl SequenceItemHeader {
    /// Build a delimiter header from a decoded `(tag, len)` pair, validating
    /// that `ItemDelimiter`/`SequenceDelimiter` carry a zero length as the
    /// standard requires.
    pub fn new(tag: Tag, len: Length) -> Option<Self> {
        match tag {
            Tag::ITEM => Some(SequenceItemHeader::Item { len }),
            Tag::ITEM_DELIMITATION if len.get() == Some(0) => {
                Some(SequenceItemHeader::ItemDelimiter)
            }
            Tag::SEQUENCE_DELIMITATION if len.get() == Some(0) => {
                Some(SequenceItemHeader::SequenceDelimiter)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_delimiter_requires_zero_length() {
        assert!(SequenceItemHeader::new(Tag::ITEM_DELIMITATION, Length(0)).is_some());
        assert!(SequenceItemHeader::new(Tag::ITEM_DELIMITATION, Length(4)).is_none());
    }

    #[test]
    fn item_start_accepts_any_length() {
        match SequenceItemHeader::new(Tag::ITEM, Length::UNDEFINED) {
            Some(SequenceItemHeader::Item { len }) => assert!(len.is_undefined()),
            other => panic!("expected an undefined-length item start, got {other:?}"),
        }
    }

    #[test]
    fn header_delimiter_predicates() {
        let h = DataElementHeader::new(Tag::SEQUENCE_DELIMITATION, VR::UN, Length(0));
        assert!(h.is_sequence_delimiter());
        assert!(!h.is_item());
    }
}
