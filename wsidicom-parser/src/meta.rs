//! Preamble and file meta information reader: skip the 128-byte pad, check
//! the `DICM` magic code, and consume the file meta information group
//! declared by `(0002,0000)`'s group-length value.
//!
//! Modeled after an `object/src/meta.rs`-style reader, collapsed to just the
//! magic check and group-length skip this scope needs, with an opt-in hook
//! (`read_meta_attributes`) for callers that want specific meta attributes,
//! such as the SOP Instance UID used elsewhere as a content fingerprint.

use std::io::{Read, Seek, SeekFrom};

use snafu::{ensure, ResultExt};
use wsidicom_core::{BoundedValueSource, ReadSeek, Tag, TagPath, TagPathSet, VR};

use crate::decode::decode_explicit_header;
use crate::error::{BadMagicSnafu, Error, IoSnafu, StructuralViolationSnafu};
use crate::walker::DatasetHandler;

const PREAMBLE_LEN: u64 = 128;
const MAGIC: &[u8; 4] = b"DICM";
const GROUP_LENGTH_TAG: Tag = Tag(0x0002, 0x0000);

/// Seek past the 128-byte preamble and verify the `DICM` magic code.
pub fn read_preamble<R: ReadSeek + ?Sized>(source: &mut R) -> Result<(), Error> {
    source
        .seek(SeekFrom::Start(PREAMBLE_LEN))
        .context(IoSnafu { tag: None })?;
    let mut found = [0u8; 4];
    source.read_exact(&mut found).context(IoSnafu { tag: None })?;
    ensure!(&found == MAGIC, BadMagicSnafu { found });
    Ok(())
}

/// Read the file meta group's leading `(0002,0000) UL 4` element and return
/// its value: the byte length of the remainder of the group.
pub fn read_group_length<R: Read + ?Sized>(source: &mut R) -> Result<u32, Error> {
    let header = decode_explicit_header(source)?.ok_or_else(|| {
        StructuralViolationSnafu {
            tag: GROUP_LENGTH_TAG,
            reason: "stream ended before the file meta group length element".to_string(),
        }
        .build()
    })?;
    ensure!(
        header.tag == GROUP_LENGTH_TAG && header.vr == VR::UL && header.len.get() == Some(4),
        StructuralViolationSnafu {
            tag: header.tag,
            reason: "file meta group must begin with (0002,0000) UL 4".to_string(),
        }
    );
    let mut buf = [0u8; 4];
    source.read_exact(&mut buf).context(IoSnafu { tag: Some(header.tag) })?;
    Ok(u32::from_le_bytes(buf))
}

/// Convenience wrapper: check the preamble and magic, then return the
/// declared length of the rest of the file meta group.
pub fn read_meta_header<R: ReadSeek + ?Sized>(source: &mut R) -> Result<u32, Error> {
    read_preamble(source)?;
    read_group_length(source)
}

/// Seek forward over the remainder of the file meta group, discarding it.
pub fn skip_group<R: Seek + ?Sized>(source: &mut R, group_length: u32) -> Result<(), Error> {
    source
        .seek(SeekFrom::Current(i64::from(group_length)))
        .context(IoSnafu { tag: None })?;
    Ok(())
}

/// Walk the file meta group as a flat run of ordinary explicit-VR elements
/// (it never contains sequences or encapsulated pixel data), reporting any
/// attribute whose single-tag path is registered in `registered`.
///
/// An alternative to [`skip_group`] for callers that need specific meta
/// attributes; like `skip_group`, it leaves the stream exactly
/// `group_length` bytes past where it started.
pub fn read_meta_attributes<R: ReadSeek, H: DatasetHandler<R>>(
    source: &mut R,
    registered: &TagPathSet,
    handler: &mut H,
    group_length: u32,
) -> Result<(), Error> {
    let start = source.stream_position().context(IoSnafu { tag: None })?;
    let end = start + u64::from(group_length);
    while source.stream_position().context(IoSnafu { tag: None })? < end {
        let header = decode_explicit_header(source)?.ok_or_else(|| {
            StructuralViolationSnafu {
                tag: GROUP_LENGTH_TAG,
                reason: "stream ended before the declared file meta group length was consumed".to_string(),
            }
            .build()
        })?;
        let path = TagPath::from([header.tag]);
        let len = header.len.get().ok_or_else(|| {
            StructuralViolationSnafu {
                tag: header.tag,
                reason: "file meta group elements must have a defined length".to_string(),
            }
            .build()
        })?;
        let mut value = BoundedValueSource::new(source, u64::from(len));
        if registered.find(&path) {
            handler.on_attribute(&path, &header, Some(&mut value))?;
        }
        value.skip_to_end().context(IoSnafu { tag: Some(header.tag) })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn minimal_file(meta_body: &[u8]) -> Vec<u8> {
        let mut data = vec![0u8; 128];
        data.extend_from_slice(b"DICM");
        data.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, b'U', b'L', 0x04, 0x00]);
        data.extend_from_slice(&(meta_body.len() as u32).to_le_bytes());
        data.extend_from_slice(meta_body);
        data
    }

    #[test]
    fn preamble_and_magic_are_accepted() {
        let data = minimal_file(&[]);
        let mut cursor = Cursor::new(data);
        assert!(read_preamble(&mut cursor).is_ok());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut data = vec![0u8; 128];
        data.extend_from_slice(b"DICX");
        let mut cursor = Cursor::new(data);
        match read_preamble(&mut cursor) {
            Err(Error::BadMagic { .. }) => {}
            other => panic!("expected BadMagic, got {other:?}"),
        }
    }

    #[test]
    fn group_length_round_trips() {
        let data = minimal_file(&[0xAA; 17]);
        let mut cursor = Cursor::new(data);
        read_preamble(&mut cursor).unwrap();
        let len = read_group_length(&mut cursor).unwrap();
        assert_eq!(len, 17);
    }

    #[test]
    fn skip_group_lands_past_the_whole_group() {
        let meta_body = [0xAAu8; 17];
        let data = minimal_file(&meta_body);
        let mut cursor = Cursor::new(data.clone());
        let len = read_meta_header(&mut cursor).unwrap();
        skip_group(&mut cursor, len).unwrap();
        assert_eq!(cursor.position(), data.len() as u64);
    }

    struct CapturingHandler {
        seen: Vec<(Tag, Vec<u8>)>,
    }

    impl<R: ReadSeek> DatasetHandler<R> for CapturingHandler {
        fn on_attribute(
            &mut self,
            _path: &TagPath,
            header: &wsidicom_core::DataElementHeader,
            value: Option<&mut BoundedValueSource<R>>,
        ) -> Result<(), Error> {
            let bytes = value.unwrap().read_to_vec().unwrap();
            self.seen.push((header.tag, bytes));
            Ok(())
        }
    }

    #[test]
    fn read_meta_attributes_reports_only_registered_tags() {
        let mut meta_body = Vec::new();
        // (0002,0010) UI len 2 "1\0" -- transfer syntax UID, not registered
        meta_body.extend_from_slice(&[0x02, 0x00, 0x10, 0x00, b'U', b'I', 0x02, 0x00, b'1', 0x00]);
        // (0002,0003) UI len 4 "abcd" -- SOP Instance UID stand-in, registered
        meta_body.extend_from_slice(&[
            0x02, 0x00, 0x03, 0x00, b'U', b'I', 0x04, 0x00, b'a', b'b', b'c', b'd',
        ]);
        let data = minimal_file(&meta_body);
        let mut cursor = Cursor::new(data);
        let len = read_meta_header(&mut cursor).unwrap();

        let mut registered = TagPathSet::new();
        registered.add(TagPath::from([Tag(0x0002, 0x0003)])).unwrap();
        let mut handler = CapturingHandler { seen: Vec::new() };
        read_meta_attributes(&mut cursor, &registered, &mut handler, len).unwrap();

        assert_eq!(handler.seen, vec![(Tag(0x0002, 0x0003), b"abcd".to_vec())]);
    }
}
