//! Well-known names.
//!
//! Names the rewriter and the passes compare against. Interning is cheap
//! and stable, so these are plain functions rather than cached statics.

use rty_intern::Name;

/// The `Command` framework base-class name.
#[must_use]
pub fn command() -> Name {
    Name::intern("Command")
}

/// The `Opus` framework namespace.
#[must_use]
pub fn opus() -> Name {
    Name::intern("Opus")
}

/// The `call` entry-point method of a command class.
#[must_use]
pub fn call() -> Name {
    Name::intern("call")
}

/// Ruby's constructor name.
#[must_use]
pub fn initialize() -> Name {
    Name::intern("initialize")
}

/// The `T` type-syntax namespace.
#[must_use]
pub fn t() -> Name {
    Name::intern("T")
}

/// `T.unsafe`, the untyped escape hatch.
#[must_use]
pub fn unsafe_() -> Name {
    Name::intern("unsafe")
}

/// The `sig` signature-declaration method.
#[must_use]
pub fn sig() -> Name {
    Name::intern("sig")
}
