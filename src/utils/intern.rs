//! Symbol interning for identifier storage.
//!
//! Every identifier that survives lexing is interned exactly once; the rest
//! of the front-end passes `Symbol` handles around and compares them by id.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::RwLock;
use string_interner::{backend::StringBackend, DefaultSymbol, StringInterner, Symbol as SymbolTrait};

type Backend = StringBackend<DefaultSymbol>;

/// A symbol representing an interned identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol(u32);

impl Symbol {
    pub fn as_raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({} \"{}\")", self.0, resolve(*self))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", resolve(*self))
    }
}

/// Global symbol interner. Append-only and behind a lock, so concurrent
/// translation units may share it.
static GLOBAL_INTERNER: Lazy<RwLock<StringInterner<Backend>>> =
    Lazy::new(|| RwLock::new(StringInterner::new()));

/// Intern a string, returning its unique symbol.
pub fn intern(s: &str) -> Symbol {
    let mut interner = GLOBAL_INTERNER.write().unwrap();
    let sym = interner.get_or_intern(s);
    Symbol(sym.to_usize() as u32)
}

/// Resolve a symbol back to its string.
pub fn resolve(sym: Symbol) -> String {
    let interner = GLOBAL_INTERNER.read().unwrap();
    DefaultSymbol::try_from_usize(sym.0 as usize)
        .and_then(|s| interner.resolve(s))
        .unwrap_or("<unknown>")
        .to_string()
}

/// Look up a symbol without interning.
pub fn get(s: &str) -> Option<Symbol> {
    let interner = GLOBAL_INTERNER.read().unwrap();
    interner.get(s).map(|sym| Symbol(sym.to_usize() as u32))
}

/// Well-known symbols that are pre-interned.
pub mod known {
    use super::Symbol;
    use once_cell::sync::Lazy;

    /// Synthetic field inserted into empty struct/union bodies.
    pub static PLACEHOLDER_FIELD: Lazy<Symbol> = Lazy::new(|| super::intern("#placeholder"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_idempotent() {
        let a = intern("alpha");
        let b = intern("beta");
        let c = intern("alpha");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(resolve(a), "alpha");
    }

    #[test]
    fn test_get_without_intern() {
        intern("gamma");
        assert!(get("gamma").is_some());
        assert!(get("never-interned-ident").is_none());
    }

    #[test]
    fn test_placeholder() {
        assert_eq!(resolve(*known::PLACEHOLDER_FIELD), "#placeholder");
    }
}
