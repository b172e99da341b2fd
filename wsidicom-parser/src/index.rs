//! DICOMDIR index driver: extract the absolute paths of every component
//! file a DICOMDIR's Directory Record Sequence refers to.

use std::path::{Path, PathBuf};

use snafu::ResultExt;
use wsidicom_core::{BoundedValueSource, DataElementHeader, ReadSeek, Tag, TagPath};

use crate::error::{Error, IoSnafu};
use crate::parser::DicomParser;
use crate::walker::DatasetHandler;

const DIRECTORY_RECORD_SEQUENCE: Tag = Tag(0x0004, 0x1220);
const REFERENCED_FILE_ID: Tag = Tag(0x0004, 0x1500);

struct FileIdCollector {
    target: TagPath,
    files: Vec<String>,
}

impl<R: ReadSeek> DatasetHandler<R> for FileIdCollector {
    fn on_attribute(
        &mut self,
        path: &TagPath,
        _header: &DataElementHeader,
        value: Option<&mut BoundedValueSource<R>>,
    ) -> Result<(), Error> {
        if path != &self.target {
            return Ok(());
        }
        let Some(value) = value else { return Ok(()) };
        let raw = value.read_to_vec().context(IoSnafu { tag: Some(REFERENCED_FILE_ID) })?;
        let text = String::from_utf8_lossy(&raw);
        self.files.push(text.trim_end_matches(' ').replace('\\', "/"));
        Ok(())
    }
}

/// Parse the DICOMDIR at `path`, returning every referenced component file
/// resolved against `directory`.
pub fn read_index(path: impl AsRef<Path>, directory: impl AsRef<Path>) -> Result<Vec<PathBuf>, Error> {
    let target: TagPath = [DIRECTORY_RECORD_SEQUENCE, REFERENCED_FILE_ID].into();

    let mut parser = DicomParser::create(path)?;
    parser.register_path(target.clone())?;

    let mut collector = FileIdCollector { target, files: Vec::new() };
    parser.parse(&mut collector)?;

    let directory = directory.as_ref();
    Ok(collector.files.into_iter().map(|f| directory.join(f)).collect())
}
