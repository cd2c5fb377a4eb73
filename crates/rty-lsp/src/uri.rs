//! URI ↔ file mapping.
//!
//! The workspace root URI is captured at `initialize`. URIs under the root
//! strip down to workspace-relative paths; paths map back by prefixing the
//! root. Edits to URIs outside the root are ignored by the callers of
//! these helpers.

use std::io::{BufRead, Write};

use rty_core::FileRef;

use crate::server::LspLoop;

impl<R: BufRead, W: Write> LspLoop<R, W> {
    fn root_prefix(&self) -> String {
        format!("{}/", self.root_uri)
    }

    /// Whether a URI names a file under the workspace root.
    pub(crate) fn is_under_root(&self, uri: &str) -> bool {
        !self.root_uri.is_empty() && uri.starts_with(&self.root_prefix())
    }

    /// Strip the root prefix from a URI, yielding a workspace-relative path.
    pub(crate) fn remote_name_to_local(&self, uri: &str) -> String {
        uri.strip_prefix(&self.root_prefix()).unwrap_or(uri).to_owned()
    }

    /// Prefix a workspace-relative path with the root URI.
    pub(crate) fn local_name_to_remote(&self, path: &str) -> String {
        format!("{}/{path}", self.root_uri)
    }

    /// Find the registered file a URI names.
    ///
    /// Scans for the first non-tombstoned file whose path matches; yields
    /// the invalid ref for URIs outside the root or unknown paths.
    pub(crate) fn uri_to_file_ref(&self, uri: &str) -> FileRef {
        let Some(final_gs) = &self.final_gs else {
            return FileRef::default();
        };
        if !self.is_under_root(uri) {
            return FileRef::default();
        }
        let needle = self.remote_name_to_local(uri);
        final_gs.find_file(&needle).unwrap_or_default()
    }
}
