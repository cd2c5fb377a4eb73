//! The symbol table entries.

use crate::loc::Loc;
use rty_index::define_index;
use rty_intern::Name;

define_index! {
    /// Handle into the symbol table. Id 0 is the no-symbol sentinel, id 1
    /// the root scope.
    pub struct SymbolRef;
}

impl SymbolRef {
    /// The no-symbol sentinel.
    pub const NONE: SymbolRef = SymbolRef::new(0);
    /// The root scope every top-level definition hangs off.
    pub const ROOT: SymbolRef = SymbolRef::new(1);

    /// Whether this ref points at a real symbol.
    #[must_use]
    pub fn exists(self) -> bool {
        self.id() != 0
    }
}

/// What a symbol is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    /// A class or module definition.
    ClassOrModule {
        /// `module` rather than `class`.
        is_module: bool,
    },
    /// A method definition.
    Method,
    /// An instance variable.
    Field,
    /// A constant assignment.
    StaticField,
    /// A formal argument of a method.
    MethodArgument,
    /// A declared type member.
    TypeMember,
    /// A generic-method type argument.
    TypeArgument,
}

/// One entry in the symbol table.
#[derive(Clone, Debug)]
pub struct Symbol {
    /// The symbol's own name.
    pub name: Name,
    /// The lexically enclosing symbol.
    pub owner: SymbolRef,
    /// Where the definition was written.
    pub definition_loc: Loc,
    /// Classification; drives the LSP symbol-kind mapping.
    pub kind: SymbolKind,
}

impl Symbol {
    /// Whether this is a class or module.
    #[must_use]
    pub fn is_class_or_module(&self) -> bool {
        matches!(self.kind, SymbolKind::ClassOrModule { .. })
    }

    /// Whether this is a method.
    #[must_use]
    pub fn is_method(&self) -> bool {
        self.kind == SymbolKind::Method
    }
}
