//! The dataset walker: a recursive descent over a DICOM dataset that
//! maintains a current tag path, selectively descends into regions of
//! interest registered by the caller, and dispatches values to
//! caller-supplied handlers.
//!
//! Modeled after a `dicom-parser`-style dataset reader
//! (`parser/src/dataset/read.rs`'s `DataSetReader`), restructured from a
//! token-emitting iterator into explicit recursive functions
//! (`read_dataset`, `read_sq_undef`, `read_sq_def`, `read_item_undef`,
//! `read_item_def`, `read_encapsulated_pixel_data`) driven by a single
//! "read through EOF" top-level loop, rather than two divergent loop forms
//! for the defined- and undefined-length cases.

use std::io::Seek;

use snafu::{ensure, OptionExt, ResultExt};
use tracing::{debug, trace};
use wsidicom_core::{BoundedValueSource, DataElementHeader, ReadSeek, Tag, TagPath, TagPathSet, VR};

use crate::decode::{
    decode_delimiter_header, decode_explicit_header, decode_explicit_header_or_item_delimiter,
    ElementOrItemDelimiter,
};
use crate::error::{Error, IoSnafu, OrderViolationSnafu, StructuralViolationSnafu, UnsupportedSyntaxSnafu};

/// Callback hooks invoked by the walker while it descends a dataset.
///
/// Both methods have no-op default implementations, so a handler that only
/// cares about attributes (the DICOMDIR driver) need not implement
/// `on_pixel_fragment`, and vice versa.
pub trait DatasetHandler<R: ReadSeek + ?Sized> {
    /// Called for every selected ordinary attribute. `value` is `None` for
    /// structural elements (an undefined-length sequence or encapsulated
    /// pixel data start) whose "value" is the nested content that follows,
    /// not a byte value of its own.
    fn on_attribute(
        &mut self,
        _path: &TagPath,
        _header: &DataElementHeader,
        _value: Option<&mut BoundedValueSource<R>>,
    ) -> Result<(), Error> {
        Ok(())
    }

    /// Called once per fragment item of encapsulated pixel data, after the
    /// Basic Offset Table (which is never reported here).
    fn on_pixel_fragment(
        &mut self,
        _path: &TagPath,
        _absolute_offset: u64,
        _length: u32,
    ) -> Result<(), Error> {
        Ok(())
    }

    /// Called once with the raw bytes of the Basic Offset Table item, for
    /// handlers that want seek-free tile access. The default implementation
    /// discards it, matching the walker's baseline behavior of reporting
    /// only per-frame fragments.
    fn on_basic_offset_table(&mut self, _path: &TagPath, _raw: &[u8]) -> Result<(), Error> {
        Ok(())
    }
}

/// The recursive-descent dataset walker.
pub struct DatasetWalker<R> {
    source: R,
    path: TagPath,
    registered: TagPathSet,
}

impl<R: ReadSeek> DatasetWalker<R> {
    /// Build a walker over `source`, positioned at the start of the main
    /// dataset (i.e. after the preamble and file meta group have already
    /// been consumed).
    pub fn new(source: R) -> Self {
        DatasetWalker {
            source,
            path: TagPath::new(),
            registered: TagPathSet::new(),
        }
    }

    /// Build a walker with a set of paths already registered, for callers
    /// (such as [`crate::parser::DicomParser`]) that accumulate
    /// registrations before the source is handed off to the walker.
    pub fn with_registered(source: R, registered: TagPathSet) -> Self {
        DatasetWalker {
            source,
            path: TagPath::new(),
            registered,
        }
    }

    /// Register an exact-match path, also consulted as a prefix for
    /// descent into defined-length sequences and items.
    pub fn register_path(&mut self, path: TagPath) -> Result<(), Error> {
        self.registered.add(path)?;
        Ok(())
    }

    /// Consume the walker, returning the underlying source.
    pub fn into_inner(self) -> R {
        self.source
    }

    fn position(&mut self) -> Result<u64, Error> {
        self.source.stream_position().context(IoSnafu { tag: None })
    }

    /// Top-level loop: repeatedly decode an explicit-VR header until a
    /// clean end-of-file is reached. Every tag encountered here must not
    /// belong to the `FFFE` group and must not exceed `(7FE0,0010)`.
    pub fn read_dataset<H: DatasetHandler<R>>(&mut self, handler: &mut H) -> Result<(), Error> {
        let mut last_tag: Option<Tag> = None;
        loop {
            let header = match decode_explicit_header(&mut self.source)? {
                None => return Ok(()),
                Some(h) => h,
            };

            ensure!(
                !tag_violates_top_level_bound(header.tag),
                StructuralViolationSnafu {
                    tag: header.tag,
                    reason: "top-level tag must not be in the FFFE group and must not exceed (7FE0,0010)".to_string(),
                }
            );
            check_order(&mut last_tag, header.tag)?;

            self.path.push(header.tag)?;
            trace!(tag = %header.tag, "entering top-level element");
            self.dispatch_element(header, handler)?;
            self.path.pop();
        }
    }

    /// Dispatch on an already-read, already-pushed header: the shared case
    /// split used by the top-level loop and by both item readers.
    fn dispatch_element<H: DatasetHandler<R>>(
        &mut self,
        header: DataElementHeader,
        handler: &mut H,
    ) -> Result<(), Error> {
        match (header.len.is_undefined(), header.vr) {
            (true, VR::SQ) => {
                handler.on_attribute(&self.path, &header, None)?;
                self.read_sq_undef(handler)
            }
            (true, VR::OB) | (true, VR::OW) if header.tag == Tag::PIXEL_DATA => {
                handler.on_attribute(&self.path, &header, None)?;
                self.read_encapsulated_pixel_data(handler)
            }
            (true, VR::UN) => UnsupportedSyntaxSnafu { tag: header.tag }.fail(),
            (false, VR::SQ) => {
                if self.registered.matches(&self.path) {
                    self.read_sq_def(header.len.get().expect("checked defined above"), handler)
                } else {
                    self.skip_value(header.len.get().expect("checked defined above"))
                }
            }
            (false, _) => {
                let len = header.len.get().expect("checked defined above");
                let mut value = BoundedValueSource::new(&mut self.source, u64::from(len));
                handler.on_attribute(&self.path, &header, Some(&mut value))?;
                value.skip_to_end().context(IoSnafu { tag: Some(header.tag) })
            }
            (true, _) => UnsupportedSyntaxSnafu { tag: header.tag }.fail(),
        }
    }

    fn skip_value(&mut self, len: u32) -> Result<(), Error> {
        let value = BoundedValueSource::new(&mut self.source, u64::from(len));
        value.skip_to_end().context(IoSnafu { tag: None })
    }

    /// `read_sq_undef`: loop reading implicit-framed delimiter headers
    /// until the sequence delimiter closes the sequence.
    fn read_sq_undef<H: DatasetHandler<R>>(&mut self, handler: &mut H) -> Result<(), Error> {
        loop {
            let header = decode_delimiter_header(&mut self.source)?;
            match header {
                wsidicom_core::SequenceItemHeader::SequenceDelimiter => return Ok(()),
                wsidicom_core::SequenceItemHeader::Item { len } => match len.get() {
                    None => self.read_item_undef(handler)?,
                    Some(len) => {
                        if self.registered.matches(&self.path) {
                            self.read_item_def(len, handler)?
                        } else {
                            self.skip_value(len)?
                        }
                    }
                },
                wsidicom_core::SequenceItemHeader::ItemDelimiter => {
                    return StructuralViolationSnafu {
                        tag: Tag::ITEM_DELIMITATION,
                        reason: "unexpected item delimiter while scanning for the next item or the sequence delimiter".to_string(),
                    }
                    .fail()
                }
            }
        }
    }

    /// `read_sq_def(seqlen)`: same per-item branching as `read_sq_undef`,
    /// but the loop runs until exactly `seqlen` bytes of content have been
    /// consumed, with no terminating sequence delimiter expected.
    fn read_sq_def<H: DatasetHandler<R>>(&mut self, seqlen: u32, handler: &mut H) -> Result<(), Error> {
        let start = self.position()?;
        let end = start + u64::from(seqlen);
        while self.position()? < end {
            let header = decode_delimiter_header(&mut self.source)?;
            match header {
                wsidicom_core::SequenceItemHeader::Item { len } => match len.get() {
                    None => self.read_item_undef(handler)?,
                    Some(len) => {
                        if self.registered.matches(&self.path) {
                            self.read_item_def(len, handler)?
                        } else {
                            self.skip_value(len)?
                        }
                    }
                },
                _ => {
                    return StructuralViolationSnafu {
                        tag: Tag::ITEM,
                        reason: "expected an item start while reading a defined-length sequence".to_string(),
                    }
                    .fail()
                }
            }
        }
        ensure!(
            self.position()? == end,
            StructuralViolationSnafu {
                tag: Tag::SEQUENCE_DELIMITATION,
                reason: "a nested item overran the enclosing sequence's declared length".to_string(),
            }
        );
        Ok(())
    }

    /// `read_item_undef`: loop reading an explicit-VR-with-item-delimiter
    /// element until the item's closing delimiter appears.
    fn read_item_undef<H: DatasetHandler<R>>(&mut self, handler: &mut H) -> Result<(), Error> {
        let mut last_tag: Option<Tag> = None;
        loop {
            match decode_explicit_header_or_item_delimiter(&mut self.source)? {
                ElementOrItemDelimiter::ItemDelimiter => return Ok(()),
                ElementOrItemDelimiter::Element(header) => {
                    check_order(&mut last_tag, header.tag)?;
                    self.path.push(header.tag)?;
                    self.dispatch_element(header, handler)?;
                    self.path.pop();
                }
            }
        }
    }

    /// `read_item_def(itemlen)`: consume exactly `itemlen` bytes of
    /// explicit-VR elements.
    fn read_item_def<H: DatasetHandler<R>>(&mut self, itemlen: u32, handler: &mut H) -> Result<(), Error> {
        let start = self.position()?;
        let end = start + u64::from(itemlen);
        let mut last_tag: Option<Tag> = None;
        while self.position()? < end {
            let header = decode_explicit_header(&mut self.source)?.context(StructuralViolationSnafu {
                tag: Tag::ITEM,
                reason: "stream ended before the declared item length was consumed".to_string(),
            })?;
            check_order(&mut last_tag, header.tag)?;
            self.path.push(header.tag)?;
            self.dispatch_element(header, handler)?;
            self.path.pop();
        }
        ensure!(
            self.position()? == end,
            StructuralViolationSnafu {
                tag: Tag::ITEM,
                reason: "a nested element overran the enclosing item's declared length".to_string(),
            }
        );
        Ok(())
    }

    /// `read_encapsulated_pixel_data`: loop reading implicit-framed
    /// headers. The first item is the Basic Offset Table and its contents
    /// are reported via [`DatasetHandler::on_basic_offset_table`] but
    /// never as a fragment; every subsequent item is reported as a
    /// fragment via its absolute file offset and length.
    fn read_encapsulated_pixel_data<H: DatasetHandler<R>>(&mut self, handler: &mut H) -> Result<(), Error> {
        let mut is_first = true;
        loop {
            let header = decode_delimiter_header(&mut self.source)?;
            match header {
                wsidicom_core::SequenceItemHeader::SequenceDelimiter => {
                    debug!("encapsulated pixel data closed");
                    return Ok(());
                }
                wsidicom_core::SequenceItemHeader::Item { len } => {
                    let len = len.get().context(StructuralViolationSnafu {
                        tag: Tag::ITEM,
                        reason: "a pixel data fragment item must have a defined length".to_string(),
                    })?;
                    if is_first {
                        is_first = false;
                        let mut value = BoundedValueSource::new(&mut self.source, u64::from(len));
                        let raw = value.read_to_vec().context(IoSnafu { tag: Some(Tag::ITEM) })?;
                        handler.on_basic_offset_table(&self.path, &raw)?;
                    } else {
                        let offset = self.position()?;
                        handler.on_pixel_fragment(&self.path, offset, len)?;
                        self.skip_value(len)?;
                    }
                }
                wsidicom_core::SequenceItemHeader::ItemDelimiter => {
                    return StructuralViolationSnafu {
                        tag: Tag::ITEM_DELIMITATION,
                        reason: "unexpected item delimiter inside encapsulated pixel data".to_string(),
                    }
                    .fail()
                }
            }
        }
    }
}

fn tag_violates_top_level_bound(tag: Tag) -> bool {
    tag.is_delimiter_group() || tag > Tag::PIXEL_DATA
}

fn check_order(last_tag: &mut Option<Tag>, tag: Tag) -> Result<(), Error> {
    if let Some(previous) = *last_tag {
        ensure!(previous < tag, OrderViolationSnafu { previous, tag });
    }
    *last_tag = Some(tag);
    Ok(())
}
