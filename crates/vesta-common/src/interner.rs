//! Global string interning.
//!
//! `Atom` is a copyable handle to an interned string. Interning is global and
//! thread-safe so the declaration store can be shared across checker workers
//! without re-interning member names per worker.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::RwLock;

/// Interned string handle. O(1) equality and hashing.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(u32);

struct AtomTable {
    lookup: DashMap<&'static str, u32, rustc_hash::FxBuildHasher>,
    strings: RwLock<Vec<&'static str>>,
}

static TABLE: Lazy<AtomTable> = Lazy::new(|| AtomTable {
    lookup: DashMap::default(),
    strings: RwLock::new(Vec::new()),
});

impl Atom {
    /// Intern a string, returning its atom.
    pub fn new(s: &str) -> Atom {
        if let Some(id) = TABLE.lookup.get(s) {
            return Atom(*id);
        }
        // Interned strings live for the process lifetime.
        let leaked: &'static str = Box::leak(s.to_owned().into_boxed_str());
        let mut strings = TABLE.strings.write().unwrap_or_else(|e| e.into_inner());
        // Re-check under the write lock so two racing interns agree on the id.
        if let Some(id) = TABLE.lookup.get(leaked) {
            return Atom(*id);
        }
        let id = strings.len() as u32;
        strings.push(leaked);
        TABLE.lookup.insert(leaked, id);
        Atom(id)
    }

    pub fn as_str(self) -> &'static str {
        let strings = TABLE.strings.read().unwrap_or_else(|e| e.into_inner());
        strings[self.0 as usize]
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Atom({:?})", self.as_str())
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Atom {
    fn from(s: &str) -> Atom {
        Atom::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let a = Atom::new("foo");
        let b = Atom::new("foo");
        let c = Atom::new("bar");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str(), "foo");
        assert_eq!(c.as_str(), "bar");
    }
}
