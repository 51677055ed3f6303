//! Pretty-printing of terms.
//!
//! By default only the parentheses needed to read the term back are printed:
//! application associates to the left and an abstraction extends as far right
//! as possible. With `readable` on, numerals print as decimal numbers, list
//! encodings as `[a, b, c]` and the identity as `I`.

use crate::intern::{Interner, Name};
use crate::numeral::{is_identity, is_list, list_elements, number_of};
use crate::term::{TermId, TermKind, TermPool};

/// Printing switches, controlled by the `Set` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Print every parenthesis
    pub show_parens: bool,
    /// Print `λ` instead of `\`
    pub greek_lambda: bool,
    /// Recognise numerals, lists and the identity
    pub readable: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            show_parens: false,
            greek_lambda: false,
            readable: true,
        }
    }
}

enum Piece {
    Term { id: TermId, most_right: bool },
    Text(&'static str),
    Name(Name),
}

/// Render `term` as text
pub fn render(pool: &TermPool, names: &Interner, term: TermId, options: &RenderOptions) -> String {
    let well_known = names.well_known();
    let lambda = if options.greek_lambda { "\u{03BB}" } else { "\\" };
    let mut out = String::new();
    let mut stack = vec![Piece::Term {
        id: term,
        most_right: true,
    }];

    while let Some(piece) = stack.pop() {
        let (id, most_right) = match piece {
            Piece::Text(s) => {
                out.push_str(s);
                continue;
            }
            Piece::Name(name) => {
                out.push_str(names.resolve(name));
                continue;
            }
            Piece::Term { id, most_right } => (id, most_right),
        };

        if options.readable {
            if let Some(n) = number_of(pool, &well_known, id) {
                out.push_str(&n.to_string());
                continue;
            }
            if is_list(pool, id) {
                out.push('[');
                // pushed in reverse so they pop in order
                let elements = list_elements(pool, id);
                stack.push(Piece::Text("]"));
                for (i, element) in elements.into_iter().enumerate().rev() {
                    stack.push(Piece::Term {
                        id: element,
                        most_right: true,
                    });
                    if i > 0 {
                        stack.push(Piece::Text(", "));
                    }
                }
                continue;
            }
        }

        match pool.kind(id) {
            TermKind::Var(name) | TermKind::Alias(name) => out.push_str(names.resolve(name)),

            TermKind::Abstr { param, body } => {
                if options.readable && is_identity(pool, id) {
                    out.push('I');
                    continue;
                }
                let parens = options.show_parens || !most_right;
                if parens {
                    out.push('(');
                    stack.push(Piece::Text(")"));
                }
                out.push_str(lambda);
                out.push_str(names.resolve(param));
                out.push('.');
                stack.push(Piece::Term {
                    id: body,
                    most_right: true,
                });
            }

            TermKind::Appl { func, arg, oper } => {
                if options.show_parens {
                    out.push('(');
                    stack.push(Piece::Text(")"));
                }
                let wrap_arg =
                    !options.show_parens && matches!(pool.kind(arg), TermKind::Appl { .. });
                if wrap_arg {
                    stack.push(Piece::Text(")"));
                }
                stack.push(Piece::Term { id: arg, most_right });
                if wrap_arg {
                    stack.push(Piece::Text("("));
                }
                match oper {
                    Some(op) => {
                        stack.push(Piece::Text(" "));
                        stack.push(Piece::Name(op));
                        stack.push(Piece::Text(" "));
                    }
                    None => stack.push(Piece::Text(" ")),
                }
                // the operator of an operator application on the left is not
                // known to bind tighter than this one
                let wrap_func = !options.show_parens
                    && matches!(pool.kind(func), TermKind::Appl { oper: Some(_), .. });
                if wrap_func {
                    stack.push(Piece::Text(")"));
                }
                stack.push(Piece::Term {
                    id: func,
                    most_right: false,
                });
                if wrap_func {
                    stack.push(Piece::Text("("));
                }
            }
        }
    }
    out
}

#[cfg(all(test, feature = "parser"))]
mod tests {
    use super::*;
    use crate::numeral::church_numeral;
    use crate::operators::{Assoc, OperatorTable};
    use crate::parser::parse_term;

    fn show(src: &str, options: RenderOptions) -> String {
        let mut pool = TermPool::new();
        let mut names = Interner::new();
        let mut ops = OperatorTable::new();
        let plus = names.intern("+");
        ops.define(plus, 50, Assoc::Left);

        match parse_term(src, &mut pool, &mut names, &ops) {
            Ok(t) => render(&pool, &names, t, &options),
            Err(e) => panic!("{src}: {e:?}"),
        }
    }

    #[test]
    fn test_minimal_parentheses() {
        let plain = RenderOptions {
            readable: false,
            ..RenderOptions::default()
        };
        let test_cases = vec![
            ("a b c", "a b c"),
            ("a (b c)", "a (b c)"),
            ("\\x.x", "\\x.x"),
            ("(\\x.x) y", "(\\x.x) y"),
            ("a \\x.x", "a \\x.x"),
            ("(a \\x.x) b", "a (\\x.x) b"),
            ("\\x.\\y.x y", "\\x.\\y.x y"),
            ("a + b", "a + b"),
            ("f (a + b)", "f (a + b)"),
            ("(a + b) + c", "(a + b) + c"),
            ("(a + b) c", "(a + b) c"),
        ];
        for (input, expected) in test_cases {
            assert_eq!(show(input, plain), expected, "{input}");
        }
    }

    #[test]
    fn test_print_options() {
        let all_parens = RenderOptions {
            show_parens: true,
            readable: false,
            ..RenderOptions::default()
        };
        assert_eq!(show("a b \\x.x", all_parens), "((a b) (\\x.x))");

        let greek = RenderOptions {
            greek_lambda: true,
            readable: false,
            ..RenderOptions::default()
        };
        assert_eq!(show("\\x.x y", greek), "λx.x y");
    }

    #[test]
    fn test_readable_forms() {
        let readable = RenderOptions::default();
        let test_cases = vec![
            ("\\f.\\x.f (f (f x))", "3"),
            ("\\f.\\x.x", "0"),
            ("12", "12"),
            ("\\x.x", "I"),
            ("F (\\y.y)", "F I"),
            ("\\s.s A (\\s.s B (\\x.\\x.\\y.x))", "[A, B]"),
            ("\\s.s 1 (\\x.\\x.\\y.x)", "[1]"),
            ("Succ (Succ '0')", "2"),
        ];
        for (input, expected) in test_cases {
            assert_eq!(show(input, readable), expected, "{input}");
        }
    }

    #[test]
    #[expect(clippy::unwrap_used)] // test code OK
    fn test_largest_numeral_renders_without_recursion() {
        let mut pool = TermPool::new();
        let mut names = Interner::new();
        let t = church_numeral(&mut pool, &mut names, crate::MAX_NUMERAL).unwrap();
        assert_eq!(render(&pool, &names, t, &RenderOptions::default()), "9999");

        let plain = RenderOptions {
            readable: false,
            ..RenderOptions::default()
        };
        let text = render(&pool, &names, t, &plain);
        assert!(text.starts_with("\\f.\\x.f (f (f"));
        assert_eq!(text.matches('(').count(), crate::MAX_NUMERAL - 1);
    }
}
