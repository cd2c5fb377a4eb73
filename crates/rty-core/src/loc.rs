//! Source locations.

use crate::files::FileRef;

/// A byte range within a file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Loc {
    /// The file the range lives in.
    pub file: FileRef,
    /// Byte offset of the first byte.
    pub begin_pos: u32,
    /// Byte offset one past the last byte.
    pub end_pos: u32,
}

impl Loc {
    /// Create a location.
    #[must_use]
    pub fn new(file: FileRef, begin_pos: u32, end_pos: u32) -> Self {
        Self {
            file,
            begin_pos,
            end_pos,
        }
    }

    /// The location that points nowhere.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether this location points at a real file.
    #[must_use]
    pub fn exists(self) -> bool {
        self.file.exists()
    }
}

/// A 1-based line/column position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Detail {
    /// Line number, starting at 1.
    pub line: u32,
    /// Column number, starting at 1.
    pub column: u32,
}
