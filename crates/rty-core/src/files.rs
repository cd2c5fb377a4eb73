//! The file table.

use crate::loc::Detail;
use rty_index::define_index;

define_index! {
    /// Handle into the file table. Id 0 is the invalid ref; real files are
    /// 1-based.
    pub struct FileRef;
}

impl FileRef {
    /// Whether this ref points at a real table slot.
    #[must_use]
    pub fn exists(self) -> bool {
        self.id() != 0
    }
}

/// How a file entered the system.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceType {
    /// User code under the workspace root.
    Normal,
    /// Language core stubs bundled with the server.
    Payload,
    /// Logically removed; the id stays allocated.
    TombStone,
}

/// A single source file.
#[derive(Clone, Debug)]
pub struct File {
    /// Workspace-relative path.
    pub path: String,
    /// Full contents.
    pub source: String,
    /// Classification; see [`SourceType`].
    pub source_type: SourceType,
    /// Byte offsets of every `\n`, in ascending order.
    line_breaks: Vec<u32>,
}

impl File {
    /// Create a file, computing its line-break table.
    #[must_use]
    pub fn new(path: String, source: String, source_type: SourceType) -> Self {
        let line_breaks = source
            .bytes()
            .enumerate()
            .filter(|&(_, b)| b == b'\n')
            .map(|(i, _)| i as u32)
            .collect();
        Self {
            path,
            source,
            source_type,
            line_breaks,
        }
    }

    /// Convert a byte offset into a 1-based line/column pair.
    ///
    /// Offsets past the end of the file clamp to the final position.
    #[must_use]
    pub fn line_col(&self, offset: u32) -> Detail {
        let offset = offset.min(self.source.len() as u32);
        let line = self.line_breaks.partition_point(|&b| b < offset);
        let line_start = if line == 0 {
            0
        } else {
            self.line_breaks[line - 1] + 1
        };
        Detail {
            line: line as u32 + 1,
            column: offset - line_start + 1,
        }
    }
}
