//! Crate-level error type for `wsidicom-parser`.

use snafu::{Backtrace, Snafu};
use wsidicom_core::Tag;

/// Errors raised while parsing a DICOM stream.
///
/// All variants are fatal to the current parse; there is no per-element
/// recovery.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The underlying read/seek/open failed, or EOF arrived inside a
    /// declared length.
    #[snafu(display("I/O error while parsing at tag {tag:?}: {source}"))]
    Io {
        tag: Option<Tag>,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// The `DICM` preamble check failed.
    #[snafu(display("preamble check failed: expected magic code `DICM`, found {found:?}"))]
    BadMagic { found: [u8; 4], backtrace: Backtrace },

    /// VR bytes were not both uppercase, a long-form header's reserved
    /// word was non-zero, or a delimiter carried a non-zero length.
    #[snafu(display("malformed element header at tag {tag:?}: {reason}"))]
    BadHeader {
        tag: Tag,
        reason: String,
        backtrace: Backtrace,
    },

    /// A tag was not strictly increasing within its enclosing scope.
    #[snafu(display("tag {tag:?} is not greater than the preceding tag {previous:?}"))]
    OrderViolation {
        previous: Tag,
        tag: Tag,
        backtrace: Backtrace,
    },

    /// A `UN` undefined-length attribute (or any other construct requiring
    /// Implicit VR) was encountered; only Explicit VR Little Endian is
    /// supported.
    #[snafu(display("construct at tag {tag:?} requires Implicit VR, which is unsupported"))]
    UnsupportedSyntax { tag: Tag, backtrace: Backtrace },

    /// A nested length exceeded its enclosing length, or a required
    /// sequence/item delimiter was missing.
    #[snafu(display("structural violation at tag {tag:?}: {reason}"))]
    StructuralViolation {
        tag: Tag,
        reason: String,
        backtrace: Backtrace,
    },

    /// A registered tag path, or the underlying tag path machinery,
    /// reported an error.
    #[snafu(display("tag path error: {source}"))]
    Path {
        #[snafu(backtrace)]
        source: wsidicom_core::Error,
    },
}

impl From<wsidicom_core::Error> for Error {
    fn from(source: wsidicom_core::Error) -> Self {
        Error::Path { source }
    }
}

/// Convenience alias for a `wsidicom-parser` result.
pub type Result<T, E = Error> = std::result::Result<T, E>;
