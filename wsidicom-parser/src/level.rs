//! VL Whole Slide Microscopy Image Storage level driver: read a single
//! instance's tile geometry, fingerprint, and per-frame fragment table.

use std::path::Path;

use snafu::ResultExt;
use wsidicom_core::{BoundedValueSource, DataElementHeader, ReadSeek, Tag, TagPath};

use crate::error::{Error, IoSnafu, StructuralViolationSnafu};
use crate::parser::DicomParser;
use crate::walker::DatasetHandler;

const STUDY_INSTANCE_UID: Tag = Tag(0x0020, 0x000D);
const NUMBER_OF_FRAMES: Tag = Tag(0x0028, 0x0008);
const ROWS: Tag = Tag(0x0028, 0x0010);
const COLUMNS: Tag = Tag(0x0028, 0x0011);
const TOTAL_PIXEL_MATRIX_COLUMNS: Tag = Tag(0x0048, 0x0006);
const TOTAL_PIXEL_MATRIX_ROWS: Tag = Tag(0x0048, 0x0007);
const OPTICAL_PATH_SEQUENCE: Tag = Tag(0x0048, 0x0105);
const LENSES_CODE_SEQUENCE: Tag = Tag(0x0022, 0x0019);
const CODE_VALUE: Tag = Tag(0x0008, 0x0100);

/// The literal `CS` value identifying an overview/icon image, compared
/// after right-trimming the value's even-length space padding.
const OVERVIEW_LENS_CODE: &str = "A-00118";

/// One fragment of encapsulated pixel data: its absolute offset in the file
/// and its byte length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileFragment {
    pub offset: u64,
    pub length: u32,
}

/// The result of driving a WSMIS instance through the walker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    pub fingerprint: String,
    pub image_w: u32,
    pub image_h: u32,
    pub tile_w: u16,
    pub tile_h: u16,
    pub frames: u32,
    pub tiles_across: u32,
    pub tiles_down: u32,
    pub is_overview: bool,
    pub tile_table: Vec<TileFragment>,
    /// Decoded Basic Offset Table, relative to the start of the first
    /// fragment; empty when the BOT item itself had zero length.
    pub basic_offset_table: Vec<u32>,
}

#[derive(Default)]
struct LevelCollector {
    fingerprint: Option<String>,
    frames: Option<u32>,
    rows: Option<u16>,
    columns: Option<u16>,
    total_pixel_matrix_columns: Option<u32>,
    total_pixel_matrix_rows: Option<u32>,
    code_value: Option<String>,
    tile_table: Vec<TileFragment>,
    basic_offset_table: Vec<u32>,
}

fn path_of(tags: &[Tag]) -> TagPath {
    tags.iter().copied().collect()
}

impl<R: ReadSeek> DatasetHandler<R> for LevelCollector {
    fn on_attribute(
        &mut self,
        path: &TagPath,
        header: &DataElementHeader,
        value: Option<&mut BoundedValueSource<R>>,
    ) -> Result<(), Error> {
        let Some(value) = value else { return Ok(()) };
        let tag = header.tag;

        if path == &path_of(&[STUDY_INSTANCE_UID]) {
            let raw = value.read_to_vec().context(IoSnafu { tag: Some(tag) })?;
            self.fingerprint = Some(ascii_trimmed(&raw));
        } else if path == &path_of(&[NUMBER_OF_FRAMES]) {
            let raw = value.read_to_vec().context(IoSnafu { tag: Some(tag) })?;
            self.frames = Some(parse_ascii_integer(&raw, tag)?);
        } else if path == &path_of(&[ROWS]) {
            self.rows = Some(read_u16(value, tag)?);
        } else if path == &path_of(&[COLUMNS]) {
            self.columns = Some(read_u16(value, tag)?);
        } else if path == &path_of(&[TOTAL_PIXEL_MATRIX_COLUMNS]) {
            self.total_pixel_matrix_columns = Some(read_u32(value, tag)?);
        } else if path == &path_of(&[TOTAL_PIXEL_MATRIX_ROWS]) {
            self.total_pixel_matrix_rows = Some(read_u32(value, tag)?);
        } else if path == &path_of(&[OPTICAL_PATH_SEQUENCE, LENSES_CODE_SEQUENCE, CODE_VALUE]) {
            let raw = value.read_to_vec().context(IoSnafu { tag: Some(tag) })?;
            self.code_value = Some(ascii_trimmed(&raw));
        }
        Ok(())
    }

    fn on_pixel_fragment(&mut self, _path: &TagPath, absolute_offset: u64, length: u32) -> Result<(), Error> {
        self.tile_table.push(TileFragment { offset: absolute_offset, length });
        Ok(())
    }

    fn on_basic_offset_table(&mut self, _path: &TagPath, raw: &[u8]) -> Result<(), Error> {
        self.basic_offset_table = raw.chunks_exact(4).map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect();
        Ok(())
    }
}

fn ascii_trimmed(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim_end_matches([' ', '\0']).to_string()
}

fn parse_ascii_integer(raw: &[u8], tag: Tag) -> Result<u32, Error> {
    ascii_trimmed(raw).parse().map_err(|_| {
        StructuralViolationSnafu {
            tag,
            reason: "expected an ASCII integer value".to_string(),
        }
        .build()
    })
}

fn read_u16<R: ReadSeek>(value: &mut BoundedValueSource<R>, tag: Tag) -> Result<u16, Error> {
    let raw = value.read_to_vec().context(IoSnafu { tag: Some(tag) })?;
    let bytes: [u8; 2] = raw.as_slice().try_into().map_err(|_| {
        StructuralViolationSnafu {
            tag,
            reason: "expected a 2-byte binary value".to_string(),
        }
        .build()
    })?;
    Ok(u16::from_le_bytes(bytes))
}

fn read_u32<R: ReadSeek>(value: &mut BoundedValueSource<R>, tag: Tag) -> Result<u32, Error> {
    let raw = value.read_to_vec().context(IoSnafu { tag: Some(tag) })?;
    let bytes: [u8; 4] = raw.as_slice().try_into().map_err(|_| {
        StructuralViolationSnafu {
            tag,
            reason: "expected a 4-byte binary value".to_string(),
        }
        .build()
    })?;
    Ok(u32::from_le_bytes(bytes))
}

fn require<T>(value: Option<T>, tag: Tag, what: &str) -> Result<T, Error> {
    value.ok_or_else(|| {
        StructuralViolationSnafu {
            tag,
            reason: format!("required attribute {what} was not present"),
        }
        .build()
    })
}

/// Parse the WSMIS instance at `path`, returning its tile geometry,
/// fingerprint, per-frame fragment table, and decoded Basic Offset Table.
pub fn read_level(path: impl AsRef<Path>) -> Result<Level, Error> {
    let mut parser = DicomParser::create(path)?;
    for tags in [
        &[STUDY_INSTANCE_UID][..],
        &[NUMBER_OF_FRAMES][..],
        &[ROWS][..],
        &[COLUMNS][..],
        &[TOTAL_PIXEL_MATRIX_COLUMNS][..],
        &[TOTAL_PIXEL_MATRIX_ROWS][..],
        &[OPTICAL_PATH_SEQUENCE, LENSES_CODE_SEQUENCE, CODE_VALUE][..],
    ] {
        parser.register_path(path_of(tags))?;
    }

    let mut collector = LevelCollector::default();
    parser.parse(&mut collector)?;

    let fingerprint = require(collector.fingerprint, STUDY_INSTANCE_UID, "Study Instance UID")?;
    let frames = require(collector.frames, NUMBER_OF_FRAMES, "Number of Frames")?;
    let tile_h = require(collector.rows, ROWS, "Rows")?;
    let tile_w = require(collector.columns, COLUMNS, "Columns")?;
    let image_w = require(
        collector.total_pixel_matrix_columns,
        TOTAL_PIXEL_MATRIX_COLUMNS,
        "Total Pixel Matrix Columns",
    )?;
    let image_h = require(
        collector.total_pixel_matrix_rows,
        TOTAL_PIXEL_MATRIX_ROWS,
        "Total Pixel Matrix Rows",
    )?;

    let tiles_across = div_ceil(image_w, u32::from(tile_w), COLUMNS)?;
    let tiles_down = div_ceil(image_h, u32::from(tile_h), ROWS)?;
    ensure_tile_count_matches(tiles_across, tiles_down, frames, STUDY_INSTANCE_UID)?;

    let is_overview = collector
        .code_value
        .as_deref()
        .map(|v| v == OVERVIEW_LENS_CODE)
        .unwrap_or(false);

    Ok(Level {
        fingerprint,
        image_w,
        image_h,
        tile_w,
        tile_h,
        frames,
        tiles_across,
        tiles_down,
        is_overview,
        tile_table: collector.tile_table,
        basic_offset_table: collector.basic_offset_table,
    })
}

fn div_ceil(numerator: u32, denominator: u32, tag: Tag) -> Result<u32, Error> {
    snafu::ensure!(
        denominator != 0,
        StructuralViolationSnafu {
            tag,
            reason: "tile dimension must not be zero".to_string(),
        }
    );
    Ok((numerator + denominator - 1) / denominator)
}

fn ensure_tile_count_matches(tiles_across: u32, tiles_down: u32, frames: u32, tag: Tag) -> Result<(), Error> {
    snafu::ensure!(
        tiles_across * tiles_down == frames,
        StructuralViolationSnafu {
            tag,
            reason: format!(
                "tile grid {tiles_across}x{tiles_down} does not match the declared frame count {frames}"
            ),
        }
    );
    Ok(())
}
