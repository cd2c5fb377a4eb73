//! Incremental state and reanalysis.
//!
//! Two paths are defined: the fast path currently escalates to the slow
//! path unconditionally, but the seam is kept so a future fast path can
//! reuse `final_gs` when an edit leaves the symbol table's shape alone.

use std::io::{BufRead, Write};

use rty_core::SourceType;
use rty_pipeline::ParsedFile;
use tracing::{debug, info, warn};

use crate::server::LspLoop;
use crate::{LspError, Result};

/// A new version of one file's contents, keyed by workspace-relative path.
#[derive(Clone, Debug)]
pub struct SourceUpdate {
    /// Workspace-relative path.
    pub path: String,
    /// The full new contents.
    pub content: String,
}

impl<R: BufRead, W: Write> LspLoop<R, W> {
    /// Rebuild the indexed-tree cache.
    ///
    /// `initial` indexes the configured input file names from disk; a
    /// non-initial reindex re-parses every `Normal` file already registered
    /// in `initial_gs`.
    pub(crate) fn re_index(&mut self, initial: bool) {
        self.indexed.clear();

        let mut input_names = Vec::new();
        let mut input_refs = Vec::new();
        if initial {
            input_names.clone_from(&self.opts.input_file_names);
        } else {
            for (fref, file) in self.initial_gs.files() {
                if file.source_type == SourceType::Normal {
                    input_refs.push(fref);
                }
            }
        }

        let trees = rty_pipeline::index(
            &mut self.initial_gs,
            &input_names,
            &input_refs,
            &self.opts,
            &self.workers,
        );
        for parsed in trees {
            let id = parsed.file.as_usize();
            if id >= self.indexed.len() {
                self.indexed.resize_with(id + 1, || None);
            }
            self.indexed[id] = Some(parsed);
        }
        debug!(cached = self.indexed.iter().flatten().count(), "reindexed");
    }

    /// Drop every accumulated diagnostic and pending publish.
    pub(crate) fn invalidate_all_errors(&mut self) {
        self.errors_accumulated.clear();
        self.updated_errors.clear();
    }

    /// Deep-copy the cached indexed trees into a working vector.
    fn copy_indexed(&self) -> Option<Vec<ParsedFile>> {
        let mut copies = Vec::new();
        for parsed in self.indexed.iter().flatten() {
            copies.push(ParsedFile {
                file: parsed.file,
                tree: parsed.tree.deep_copy()?,
            });
        }
        Some(copies)
    }

    /// Full reanalysis: index the changed files, then re-resolve and
    /// re-typecheck the world against a fresh `final_gs`.
    pub(crate) fn run_slow_path(&mut self, changed_files: Vec<SourceUpdate>) -> Result<()> {
        info!(changed = changed_files.len(), "taking slow path");
        self.invalidate_all_errors();

        let mut working = match self.copy_indexed() {
            Some(copies) => copies,
            None => {
                // A cached tree holds a cycle the copy refused to expand.
                // Fall back to reparsing the registry; fresh parses share
                // nothing, so the second copy cannot fail the same way.
                warn!("cached tree not copyable, retrying from parse");
                self.re_index(false);
                self.copy_indexed().ok_or(LspError::DeepCopy)?
            }
        };

        let mut changed_refs = Vec::new();
        for update in changed_files {
            changed_refs.push(self.initial_gs.enter_file(
                update.path,
                update.content,
                SourceType::Normal,
            ));
        }
        let indexed_changed = rty_pipeline::index(
            &mut self.initial_gs,
            &[],
            &changed_refs,
            &self.opts,
            &self.workers,
        );
        working.extend(indexed_changed);

        let mut final_gs = self.initial_gs.deep_copy();
        let resolved = rty_pipeline::resolve(&mut final_gs, working, &self.opts);
        rty_pipeline::typecheck(&mut final_gs, resolved, &self.opts, &self.workers);
        self.final_gs = Some(final_gs);
        Ok(())
    }

    /// Targeted reanalysis. Currently always escalates to the slow path.
    pub(crate) fn try_fast_path(&mut self, changed_files: Vec<SourceUpdate>) -> Result<()> {
        self.run_slow_path(changed_files)
    }
}
