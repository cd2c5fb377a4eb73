//! String interning for names.
//!
//! Method, constant, and argument names recur constantly across trees and
//! symbol tables. Interning them yields a small `Copy` handle with O(1)
//! equality, which is what the namer and the DSL rewriter compare on hot
//! paths.

#![warn(missing_docs)]

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::LazyLock;

static INTERNER: LazyLock<Interner> = LazyLock::new(Interner::new);

/// An interned string.
///
/// Two `Name`s are equal iff their strings are equal; comparison never
/// touches the string data.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Name(u32);

impl Name {
    /// Intern a string, returning its name.
    #[must_use]
    pub fn intern(s: &str) -> Self {
        INTERNER.intern(s)
    }

    /// The string this name was interned from.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        INTERNER.get(self)
    }

    /// The raw interner index.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({:?})", self.as_str())
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Self::intern(s)
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Name {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

struct Interner {
    inner: RwLock<InternerInner>,
}

struct InternerInner {
    map: FxHashMap<&'static str, u32>,
    strings: Vec<&'static str>,
}

impl Interner {
    fn new() -> Self {
        Self {
            inner: RwLock::new(InternerInner {
                map: FxHashMap::default(),
                strings: Vec::new(),
            }),
        }
    }

    fn intern(&self, s: &str) -> Name {
        {
            let inner = self.inner.read();
            if let Some(&idx) = inner.map.get(s) {
                return Name(idx);
            }
        }

        let mut inner = self.inner.write();
        // Re-check: another thread may have interned between lock releases.
        if let Some(&idx) = inner.map.get(s) {
            return Name(idx);
        }

        let leaked: &'static str = Box::leak(s.to_owned().into_boxed_str());
        let idx = inner.strings.len() as u32;
        inner.strings.push(leaked);
        inner.map.insert(leaked, idx);
        Name(idx)
    }

    fn get(&self, name: Name) -> &'static str {
        self.inner.read().strings[name.0 as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let a = Name::intern("call");
        let b = Name::intern("call");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "call");
    }

    #[test]
    fn distinct_strings_get_distinct_names() {
        assert_ne!(Name::intern("Command"), Name::intern("command"));
    }

    #[test]
    fn names_order_by_string_value() {
        let a = Name::intern("aardvark");
        let z = Name::intern("zebra");
        assert!(a < z);
    }
}
