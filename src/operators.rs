//! User-defined operators.
//!
//! Operators are declared with `DefOp` using Prolog-style notation:
//!
//! ```text
//! DefOp '+' 50 yfx     ; left associative
//! DefOp ':' 40 xfy     ; right associative
//! DefOp '==' 60 xfx    ; non associative
//! ```
//!
//! Lower precedence numbers bind tighter. Plain application behaves like an
//! operator of precedence [`APPLICATION_PRECEDENCE`] and associativity `yfx`.

use std::collections::HashMap;
use std::fmt;

use crate::APPLICATION_PRECEDENCE;
use crate::intern::Name;

/// Operator associativity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    /// `yfx`: `a op b op c` is `(a op b) op c`
    Left,
    /// `xfy`: `a op b op c` is `a op (b op c)`
    Right,
    /// `xfx`: chaining requires brackets
    None,
}

impl Assoc {
    /// Parse Prolog notation (`yfx`, `xfy`, `xfx`)
    pub fn from_prolog(s: &str) -> Option<Self> {
        match s {
            "yfx" => Some(Assoc::Left),
            "xfy" => Some(Assoc::Right),
            "xfx" => Some(Assoc::None),
            _ => None,
        }
    }

    pub fn as_prolog(self) -> &'static str {
        match self {
            Assoc::Left => "yfx",
            Assoc::Right => "xfy",
            Assoc::None => "xfx",
        }
    }
}

impl fmt::Display for Assoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_prolog())
    }
}

/// Precedence and associativity of one operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorInfo {
    pub precedence: u8,
    pub assoc: Assoc,
}

impl OperatorInfo {
    /// How plain juxtaposition groups
    pub const APPLICATION: OperatorInfo = OperatorInfo {
        precedence: APPLICATION_PRECEDENCE,
        assoc: Assoc::Left,
    };
}

/// Operator token -> precedence/associativity
#[derive(Debug, Default, Clone)]
pub struct OperatorTable {
    operators: HashMap<Name, OperatorInfo>,
}

impl OperatorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or redefine an operator
    pub fn define(&mut self, name: Name, precedence: u8, assoc: Assoc) {
        self.operators
            .insert(name, OperatorInfo { precedence, assoc });
    }

    pub fn get(&self, name: Name) -> Option<OperatorInfo> {
        self.operators.get(&name).copied()
    }

    /// Grouping of an operator token; undeclared operators group like application
    pub fn lookup(&self, name: Name) -> OperatorInfo {
        self.get(name).unwrap_or(OperatorInfo::APPLICATION)
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Interner;

    #[test]
    fn test_prolog_notation() {
        let test_cases = vec![
            ("yfx", Some(Assoc::Left)),
            ("xfy", Some(Assoc::Right)),
            ("xfx", Some(Assoc::None)),
            ("fx", None),
            ("YFX", None),
        ];
        for (input, expected) in test_cases {
            assert_eq!(Assoc::from_prolog(input), expected, "{input}");
            if let Some(assoc) = expected {
                assert_eq!(assoc.to_string(), input);
            }
        }
    }

    #[test]
    fn test_define_and_lookup() {
        let mut names = Interner::new();
        let plus = names.intern("+");
        let colon = names.intern(":");
        let mut table = OperatorTable::new();
        assert!(table.is_empty());

        table.define(plus, 50, Assoc::Left);
        assert_eq!(
            table.lookup(plus),
            OperatorInfo {
                precedence: 50,
                assoc: Assoc::Left
            }
        );
        assert_eq!(table.get(colon), None);
        assert_eq!(table.lookup(colon), OperatorInfo::APPLICATION);

        // redefinition replaces
        table.define(plus, 60, Assoc::Right);
        assert_eq!(table.lookup(plus).precedence, 60);
        assert_eq!(table.len(), 1);
    }
}
