//! The public facade: `create` / `register_path` / `parse`, wrapping the
//! preamble/meta reader and the dataset walker behind a single file-backed
//! type.
//!
//! Modeled after `object/src/file.rs`'s `FileDicomObject` open-then-parse
//! entry points, trimmed to the single lifecycle this format needs.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use snafu::ResultExt;
use tracing::debug;
use wsidicom_core::{TagPath, TagPathSet};

use crate::error::{Error, IoSnafu};
use crate::meta;
use crate::walker::{DatasetHandler, DatasetWalker};

/// A DICOM file opened for parsing: the preamble and file meta group have
/// already been validated and skipped by the time `create` returns.
pub struct DicomParser {
    source: BufReader<File>,
    registered: TagPathSet,
}

impl DicomParser {
    /// Open `path`, check the preamble and `DICM` magic, and skip the file
    /// meta information group.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::open(path.as_ref()).context(IoSnafu { tag: None })?;
        let mut source = BufReader::new(file);
        let group_length = meta::read_meta_header(&mut source)?;
        meta::skip_group(&mut source, group_length)?;
        debug!(path = %path.as_ref().display(), group_length, "opened DICOM file, meta group skipped");
        Ok(DicomParser {
            source,
            registered: TagPathSet::new(),
        })
    }

    /// Register an exact-match path, also consulted as a prefix for descent
    /// into defined-length sequences and items.
    pub fn register_path(&mut self, path: TagPath) -> Result<(), Error> {
        self.registered.add(path)?;
        Ok(())
    }

    /// Walk the main dataset, dispatching to `handler`. Consumes the parser,
    /// since the underlying file handle is exhausted by a single pass.
    pub fn parse<H: DatasetHandler<BufReader<File>>>(self, handler: &mut H) -> Result<(), Error> {
        let mut walker = DatasetWalker::with_registered(self.source, self.registered);
        walker.read_dataset(handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wsidicom_core::{BoundedValueSource, DataElementHeader, ReadSeek};

    fn write_minimal_file(path: &Path) {
        let mut data = vec![0u8; 128];
        data.extend_from_slice(b"DICM");
        data.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, b'U', b'L', 0x04, 0x00, 0, 0, 0, 0]);
        data.extend_from_slice(&[0x28, 0x00, 0x10, 0x00, b'U', b'S', 0x02, 0x00, 0x00, 0x02]);
        let mut f = File::create(path).unwrap();
        f.write_all(&data).unwrap();
    }

    struct CountingHandler(usize);

    impl<R: ReadSeek> DatasetHandler<R> for CountingHandler {
        fn on_attribute(
            &mut self,
            _path: &TagPath,
            _header: &DataElementHeader,
            _value: Option<&mut BoundedValueSource<R>>,
        ) -> Result<(), Error> {
            self.0 += 1;
            Ok(())
        }
    }

    #[test]
    fn create_then_parse_walks_the_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("instance.dcm");
        write_minimal_file(&path);

        let parser = DicomParser::create(&path).unwrap();
        let mut handler = CountingHandler(0);
        parser.parse(&mut handler).unwrap();
        assert_eq!(handler.0, 1);
    }

    #[test]
    fn create_rejects_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.dcm");
        let mut data = vec![0u8; 128];
        data.extend_from_slice(b"DICX");
        std::fs::write(&path, &data).unwrap();

        match DicomParser::create(&path) {
            Err(Error::BadMagic { .. }) => {}
            other => panic!("expected BadMagic, got {other:?}"),
        }
    }
}
