//! Interned names.
//!
//! Variables, aliases and operators are compared by identity throughout the
//! reducer, so every name is interned once and handled as a copyable [`Name`].

use string_interner::{DefaultBackend, DefaultSymbol, StringInterner};

/// Interned identifier. Equal strings always map to the same `Name`.
pub type Name = DefaultSymbol;

/// Names the core refers to directly
#[derive(Debug, Clone, Copy)]
pub struct WellKnown {
    /// `~`, the call-by-value application marker
    pub tilde: Name,
    /// `Y`, the fixed point combinator used by cycle elimination
    pub fixpoint: Name,
    /// `Succ` and `0`, recognised by the numeral printer
    pub succ: Name,
    pub zero: Name,
}

/// Session-owned string interner
#[derive(Debug)]
pub struct Interner {
    strings: StringInterner<DefaultBackend>,
    well_known: WellKnown,
}

impl Interner {
    pub fn new() -> Self {
        let mut strings = StringInterner::<DefaultBackend>::new();
        let well_known = WellKnown {
            tilde: strings.get_or_intern_static("~"),
            fixpoint: strings.get_or_intern_static("Y"),
            succ: strings.get_or_intern_static("Succ"),
            zero: strings.get_or_intern_static("0"),
        };
        Interner {
            strings,
            well_known,
        }
    }

    pub fn intern(&mut self, s: &str) -> Name {
        self.strings.get_or_intern(s)
    }

    /// Look up a string without interning it
    pub fn get(&self, s: &str) -> Option<Name> {
        self.strings.get(s)
    }

    pub fn resolve(&self, name: Name) -> &str {
        self.strings.resolve(name).unwrap_or("<?>")
    }

    pub fn well_known(&self) -> WellKnown {
        self.well_known
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}
