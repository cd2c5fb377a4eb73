//! The global state itself.

use std::sync::Arc;

use rty_index::IndexVec;
use rty_intern::Name;
use tracing::trace;

use crate::error_queue::ErrorQueue;
use crate::files::{File, FileRef, SourceType};
use crate::loc::{Detail, Loc};
use crate::symbols::{Symbol, SymbolKind, SymbolRef};

/// The file and symbol tables threaded through every pass.
///
/// Both tables are append-only. Slot 0 of each is a sentinel so that the
/// zero handle is never a real entry; the symbol table additionally seeds
/// the root scope at slot 1.
#[derive(Debug)]
pub struct GlobalState {
    files: IndexVec<FileRef, File>,
    symbols: IndexVec<SymbolRef, Symbol>,
    error_queue: Arc<ErrorQueue>,
}

impl GlobalState {
    /// Create a fresh global state with an empty error queue.
    #[must_use]
    pub fn new() -> Self {
        let mut files = IndexVec::new();
        files.push(File::new(String::new(), String::new(), SourceType::TombStone));

        let mut symbols = IndexVec::new();
        symbols.push(Symbol {
            name: Name::intern("<none>"),
            owner: SymbolRef::NONE,
            definition_loc: Loc::none(),
            kind: SymbolKind::StaticField,
        });
        symbols.push(Symbol {
            name: Name::intern("<root>"),
            owner: SymbolRef::ROOT,
            definition_loc: Loc::none(),
            kind: SymbolKind::ClassOrModule { is_module: true },
        });

        Self {
            files,
            symbols,
            error_queue: Arc::new(ErrorQueue::new()),
        }
    }

    /// The shared diagnostic queue.
    #[must_use]
    pub fn error_queue(&self) -> &Arc<ErrorQueue> {
        &self.error_queue
    }

    // --- files ---

    /// Register a file, returning its fresh ref.
    ///
    /// A previously registered `Normal` file with the same path is
    /// tombstoned; its ref stays allocated but no longer resolves through
    /// [`find_file`](Self::find_file).
    pub fn enter_file(
        &mut self,
        path: impl Into<String>,
        source: impl Into<String>,
        source_type: SourceType,
    ) -> FileRef {
        let path = path.into();
        if let Some(old) = self.find_file(&path) {
            self.tombstone_file(old);
        }
        let fref = self.files.push(File::new(path, source.into(), source_type));
        trace!(file = %fref, path = %self.files[fref].path, "entered file");
        fref
    }

    /// Mark a file logically removed. Its ref stays allocated so stale
    /// locations keep indexing a real slot.
    pub fn tombstone_file(&mut self, fref: FileRef) {
        self.files[fref].source_type = SourceType::TombStone;
    }

    /// Find the first non-tombstoned file with the given path.
    #[must_use]
    pub fn find_file(&self, path: &str) -> Option<FileRef> {
        self.files
            .iter_enumerated()
            .skip(1)
            .find(|(_, f)| f.source_type != SourceType::TombStone && f.path == path)
            .map(|(fref, _)| fref)
    }

    /// Look up a file by ref.
    #[must_use]
    pub fn file(&self, fref: FileRef) -> &File {
        &self.files[fref]
    }

    /// Number of file-table slots, including the sentinel.
    #[must_use]
    pub fn files_used(&self) -> u32 {
        self.files.len() as u32
    }

    /// Iterate over `(ref, file)` pairs, skipping the sentinel slot.
    pub fn files(&self) -> impl Iterator<Item = (FileRef, &File)> {
        self.files.iter_enumerated().skip(1)
    }

    // --- symbols ---

    /// Find a direct member of `owner` by name.
    #[must_use]
    pub fn find_member(&self, owner: SymbolRef, name: Name) -> Option<SymbolRef> {
        self.symbols
            .iter_enumerated()
            .skip(1)
            .find(|(sref, s)| *sref != SymbolRef::ROOT && s.owner == owner && s.name == name)
            .map(|(sref, _)| sref)
    }

    fn enter_symbol(
        &mut self,
        owner: SymbolRef,
        name: Name,
        loc: Loc,
        kind: SymbolKind,
    ) -> SymbolRef {
        if let Some(existing) = self.find_member(owner, name) {
            if self.symbols[existing].kind == kind {
                return existing;
            }
        }
        self.symbols.push(Symbol {
            name,
            owner,
            definition_loc: loc,
            kind,
        })
    }

    /// Enter a class or module under `owner`. Idempotent per (owner, name).
    pub fn enter_class(
        &mut self,
        owner: SymbolRef,
        name: Name,
        loc: Loc,
        is_module: bool,
    ) -> SymbolRef {
        self.enter_symbol(owner, name, loc, SymbolKind::ClassOrModule { is_module })
    }

    /// Enter a method under `owner`.
    pub fn enter_method(&mut self, owner: SymbolRef, name: Name, loc: Loc) -> SymbolRef {
        self.enter_symbol(owner, name, loc, SymbolKind::Method)
    }

    /// Enter an instance variable under `owner`.
    pub fn enter_field(&mut self, owner: SymbolRef, name: Name, loc: Loc) -> SymbolRef {
        self.enter_symbol(owner, name, loc, SymbolKind::Field)
    }

    /// Enter a constant under `owner`.
    pub fn enter_static_field(&mut self, owner: SymbolRef, name: Name, loc: Loc) -> SymbolRef {
        self.enter_symbol(owner, name, loc, SymbolKind::StaticField)
    }

    /// Enter a formal argument under a method symbol.
    pub fn enter_method_argument(&mut self, owner: SymbolRef, name: Name, loc: Loc) -> SymbolRef {
        self.enter_symbol(owner, name, loc, SymbolKind::MethodArgument)
    }

    /// Look up a symbol by ref.
    #[must_use]
    pub fn symbol(&self, sref: SymbolRef) -> &Symbol {
        &self.symbols[sref]
    }

    /// Number of symbol-table slots, including the sentinels.
    #[must_use]
    pub fn symbols_used(&self) -> u32 {
        self.symbols.len() as u32
    }

    /// Render the `A::B::c` qualified name of a symbol.
    #[must_use]
    pub fn full_name(&self, sref: SymbolRef) -> String {
        let mut parts = Vec::new();
        let mut cur = sref;
        while cur.exists() && cur != SymbolRef::ROOT {
            let sym = &self.symbols[cur];
            parts.push(sym.name.as_str());
            cur = sym.owner;
        }
        parts.reverse();
        parts.join("::")
    }

    // --- positions ---

    /// Convert a location into its 1-based begin/end line/column pair.
    ///
    /// Returns `None` for locations that point nowhere.
    #[must_use]
    pub fn position(&self, loc: Loc) -> Option<(Detail, Detail)> {
        if !loc.exists() {
            return None;
        }
        let file = &self.files[loc.file];
        Some((file.line_col(loc.begin_pos), file.line_col(loc.end_pos)))
    }

    // --- copying ---

    /// Produce an independent derivative of this state.
    ///
    /// The copy's tables are fully owned; mutating them never affects the
    /// original. The error queue is shared with the original, so passes
    /// running against the copy still report where the server drains.
    #[must_use]
    pub fn deep_copy(&self) -> Self {
        Self {
            files: self.files.clone(),
            symbols: self.symbols.clone(),
            error_queue: Arc::clone(&self.error_queue),
        }
    }
}

impl Default for GlobalState {
    fn default() -> Self {
        Self::new()
    }
}
