//! The error-class registry.
//!
//! Every diagnostic carries an [`ErrorClass`] whose numeric code is what
//! editors and test assertions key on. Codes are grouped by the pass that
//! produces them: 2xxx parser, 4xxx namer, 5xxx resolver, 7xxx typecheck.

/// A diagnostic classification with a stable numeric code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ErrorClass {
    /// The numeric code surfaced to clients.
    pub code: u16,
}

impl ErrorClass {
    const fn new(code: u16) -> Self {
        Self { code }
    }
}

/// Parser diagnostics.
pub mod parser {
    use super::ErrorClass;

    /// Source that did not parse.
    pub const SYNTAX_ERROR: ErrorClass = ErrorClass::new(2001);
}

/// Namer diagnostics.
pub mod namer {
    use super::ErrorClass;

    /// A method defined twice under the same owner.
    pub const REDEFINITION_OF_METHOD: ErrorClass = ErrorClass::new(4010);
}

/// Resolver diagnostics.
pub mod resolver {
    use super::ErrorClass;

    /// A constant reference that resolves to nothing.
    pub const STUB_CONSTANT: ErrorClass = ErrorClass::new(5001);
    /// The same variable declared twice in one scope.
    pub const DUPLICATE_VARIABLE_DECLARATION: ErrorClass = ErrorClass::new(5004);
    /// A class reopened with a different superclass.
    pub const REDEFINITION_OF_PARENTS: ErrorClass = ErrorClass::new(5012);
}

/// Typecheck diagnostics.
pub mod typecheck {
    use super::ErrorClass;

    /// A call site passing fewer positional arguments than the method
    /// requires.
    pub const NOT_ENOUGH_ARGUMENTS: ErrorClass = ErrorClass::new(7004);
}
