//! Primitive element readers: the short-form, long-form, and delimiter
//! header framings of Explicit VR Little Endian, all reading little-endian
//! bytes off an arbitrary [`Read`] source and normalizing to host-endian
//! in-memory values.
//!
//! Modeled after a `dicom-encoding`-style explicit-VR decoder, collapsed to
//! the one transfer syntax this format supports.

use std::io::{self, Read};

use byteordered::byteorder::{ByteOrder, LittleEndian};
use wsidicom_core::{DataElementHeader, Length, SequenceItemHeader, Tag, VR};

use crate::error::{BadHeaderSnafu, Error, IoSnafu, StructuralViolationSnafu};
use snafu::ResultExt;

/// Read exactly `buf.len()` bytes, distinguishing a clean end-of-stream
/// (zero bytes available) from a short read (some, but not all, bytes
/// available). Only the former is a legitimate "nothing more to parse"
/// signal; the latter means the stream ended in the middle of a header,
/// which is always a hard error.
fn fill_or_clean_eof<R: Read + ?Sized>(source: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut total = 0;
    while total < buf.len() {
        match source.read(&mut buf[total..])? {
            0 => break,
            n => total += n,
        }
    }
    if total == buf.len() {
        Ok(true)
    } else if total == 0 {
        Ok(false)
    } else {
        Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "stream ended in the middle of a header",
        ))
    }
}

fn read_tag<R: Read + ?Sized>(source: &mut R) -> io::Result<Tag> {
    let mut buf = [0u8; 4];
    source.read_exact(&mut buf)?;
    Ok(Tag(
        LittleEndian::read_u16(&buf[0..2]),
        LittleEndian::read_u16(&buf[2..4]),
    ))
}

fn read_u16<R: Read + ?Sized>(source: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    source.read_exact(&mut buf)?;
    Ok(LittleEndian::read_u16(&buf))
}

fn read_u32<R: Read + ?Sized>(source: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    source.read_exact(&mut buf)?;
    Ok(LittleEndian::read_u32(&buf))
}

/// The outcome of reading an ordinary header inside an undefined-length
/// item: either another element, or the delimiter that closes the item.
#[derive(Debug)]
pub enum ElementOrItemDelimiter {
    Element(DataElementHeader),
    ItemDelimiter,
}

/// Shared tail of header decoding once the tag has already been read:
/// VR, reserved/short-VL word, and (for long-form VRs) the 32-bit VL.
fn decode_header_after_tag<R: Read + ?Sized>(
    source: &mut R,
    tag: Tag,
) -> Result<DataElementHeader, Error> {
    let mut vr_buf = [0u8; 2];
    source.read_exact(&mut vr_buf).context(IoSnafu { tag: Some(tag) })?;
    let vr = VR::from_binary(vr_buf).ok_or_else(|| {
        BadHeaderSnafu {
            tag,
            reason: "VR bytes are not both uppercase ASCII letters".to_string(),
        }
        .build()
    })?;

    let len = if vr.is_short_form() {
        let vl = read_u16(source).context(IoSnafu { tag: Some(tag) })?;
        Length(u32::from(vl))
    } else {
        let reserved = read_u16(source).context(IoSnafu { tag: Some(tag) })?;
        if reserved != 0 {
            return BadHeaderSnafu {
                tag,
                reason: format!("reserved word must be zero, found {reserved:#06X}"),
            }
            .fail();
        }
        Length(read_u32(source).context(IoSnafu { tag: Some(tag) })?)
    };

    Ok(DataElementHeader::new(tag, vr, len))
}

/// Reader (1): Explicit VR. Mandatory at the top of the main dataset and
/// within defined-length items. Returns `Ok(None)` only on a clean
/// end-of-stream reached before any byte of a new header was read — the
/// signal the top-level loop uses to terminate at end-of-file.
pub fn decode_explicit_header<R: Read + ?Sized>(
    source: &mut R,
) -> Result<Option<DataElementHeader>, Error> {
    let mut tag_buf = [0u8; 4];
    if !fill_or_clean_eof(source, &mut tag_buf).context(IoSnafu { tag: None })? {
        return Ok(None);
    }
    let tag = Tag(
        LittleEndian::read_u16(&tag_buf[0..2]),
        LittleEndian::read_u16(&tag_buf[2..4]),
    );
    decode_header_after_tag(source, tag).map(Some)
}

/// Reader (2): Explicit VR with item-delimiter support. Used inside
/// undefined-length items, where an ordinary element and the item's
/// closing `(FFFE,E00D)` delimiter can both appear at the same reading
/// position.
pub fn decode_explicit_header_or_item_delimiter<R: Read + ?Sized>(
    source: &mut R,
) -> Result<ElementOrItemDelimiter, Error> {
    let tag = read_tag(source).context(IoSnafu { tag: None })?;
    if tag == Tag::ITEM_DELIMITATION {
        let len = read_u32(source).context(IoSnafu { tag: Some(tag) })?;
        if len != 0 {
            return BadHeaderSnafu {
                tag,
                reason: format!("item delimitation must have zero length, found {len}"),
            }
            .fail();
        }
        return Ok(ElementOrItemDelimiter::ItemDelimiter);
    }
    decode_header_after_tag(source, tag).map(ElementOrItemDelimiter::Element)
}

/// Reader (3): implicit-framed delimiter. The only consumer of the `FFFE`
/// group: reads the headers of item start, item delimitation, and sequence
/// delimitation tags, all framed as `tag(4) | VL(4)` with no VR field.
pub fn decode_delimiter_header<R: Read + ?Sized>(
    source: &mut R,
) -> Result<SequenceItemHeader, Error> {
    let tag = read_tag(source).context(IoSnafu { tag: None })?;
    let len = Length(read_u32(source).context(IoSnafu { tag: Some(tag) })?);
    SequenceItemHeader::new(tag, len).ok_or_else(|| {
        if tag.is_delimiter_group() {
            BadHeaderSnafu {
                tag,
                reason: "delimiter tag carried a non-zero length".to_string(),
            }
            .build()
        } else {
            StructuralViolationSnafu {
                tag,
                reason: "expected an item or sequence delimiter tag".to_string(),
            }
            .build()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn decode_short_form_header() {
        // (0028,0010) US, len 2, value 512
        let raw: &[u8] = &[0x28, 0x00, 0x10, 0x00, b'U', b'S', 0x02, 0x00];
        let mut cursor = Cursor::new(raw);
        let header = decode_explicit_header(&mut cursor).unwrap().unwrap();
        assert_eq!(header.tag, Tag(0x0028, 0x0010));
        assert_eq!(header.vr, VR::US);
        assert_eq!(header.len.get(), Some(2));
    }

    #[test]
    fn decode_long_form_header() {
        // (7FE0,0010) OB, reserved 0000, undefined length
        let raw: &[u8] = &[
            0xE0, 0x7F, 0x10, 0x00, b'O', b'B', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF,
        ];
        let mut cursor = Cursor::new(raw);
        let header = decode_explicit_header(&mut cursor).unwrap().unwrap();
        assert_eq!(header.tag, Tag::PIXEL_DATA);
        assert_eq!(header.vr, VR::OB);
        assert!(header.len.is_undefined());
    }

    #[test]
    fn clean_eof_yields_none() {
        let raw: &[u8] = &[];
        let mut cursor = Cursor::new(raw);
        assert!(decode_explicit_header(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn partial_header_is_a_hard_error() {
        let raw: &[u8] = &[0x28, 0x00, 0x10]; // 3 of 4 tag bytes
        let mut cursor = Cursor::new(raw);
        assert!(decode_explicit_header(&mut cursor).is_err());
    }

    #[test]
    fn nonzero_reserved_word_is_bad_header() {
        let raw: &[u8] = &[
            0x08, 0x00, 0x00, 0x01, b'S', b'Q', 0x01, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        let mut cursor = Cursor::new(raw);
        match decode_explicit_header(&mut cursor) {
            Err(Error::BadHeader { .. }) => {}
            other => panic!("expected BadHeader, got {other:?}"),
        }
    }

    #[test]
    fn lowercase_vr_is_bad_header() {
        let raw: &[u8] = &[0x28, 0x00, 0x10, 0x00, b'u', b's', 0x02, 0x00];
        let mut cursor = Cursor::new(raw);
        match decode_explicit_header(&mut cursor) {
            Err(Error::BadHeader { .. }) => {}
            other => panic!("expected BadHeader, got {other:?}"),
        }
    }

    #[test]
    fn item_delimiter_fast_path() {
        let raw: &[u8] = &[0xFE, 0xFF, 0x0D, 0xE0, 0x00, 0x00, 0x00, 0x00];
        let mut cursor = Cursor::new(raw);
        match decode_explicit_header_or_item_delimiter(&mut cursor).unwrap() {
            ElementOrItemDelimiter::ItemDelimiter => {}
            other => panic!("expected ItemDelimiter, got {other:?}"),
        }
    }

    #[test]
    fn ordinary_element_inside_undefined_item() {
        let raw: &[u8] = &[0x18, 0x00, 0x12, 0x60, b'U', b'S', 0x02, 0x00, 0x01, 0x00];
        let mut cursor = Cursor::new(raw);
        match decode_explicit_header_or_item_delimiter(&mut cursor).unwrap() {
            ElementOrItemDelimiter::Element(h) => {
                assert_eq!(h.tag, Tag(0x0018, 0x6012));
                assert_eq!(h.vr, VR::US);
            }
            other => panic!("expected Element, got {other:?}"),
        }
    }

    #[test]
    fn delimiter_header_variants() {
        let item: &[u8] = &[0xfe, 0xff, 0x00, 0xe0, 0xff, 0xff, 0xff, 0xff];
        let mut c = Cursor::new(item);
        assert!(matches!(
            decode_delimiter_header(&mut c).unwrap(),
            SequenceItemHeader::Item { .. }
        ));

        let seq_end: &[u8] = &[0xfe, 0xff, 0xdd, 0xe0, 0x00, 0x00, 0x00, 0x00];
        let mut c = Cursor::new(seq_end);
        assert!(matches!(
            decode_delimiter_header(&mut c).unwrap(),
            SequenceItemHeader::SequenceDelimiter
        ));
    }

    #[test]
    fn delimiter_header_rejects_nonzero_length_end_marker() {
        let bad: &[u8] = &[0xfe, 0xff, 0xdd, 0xe0, 0x04, 0x00, 0x00, 0x00];
        let mut c = Cursor::new(bad);
        assert!(decode_delimiter_header(&mut c).is_err());
    }
}
