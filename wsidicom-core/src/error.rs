//! Crate-level error type for `wsidicom-core`.
//!
//! Everything here is independent of I/O: these are invariant violations
//! that can be raised while building a [`crate::TagPath`]/[`crate::TagPathSet`]
//! in memory, regardless of where the tags came from.

use snafu::Snafu;

/// Errors raised by `wsidicom-core`.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// A tag path or tag path set grew past its fixed capacity.
    #[snafu(display("exceeded maximum capacity of {max_depth} entries"))]
    PathOverflow { max_depth: usize },
}

/// Convenience alias for a `wsidicom-core` result.
pub type Result<T, E = Error> = std::result::Result<T, E>;
