//! Single-step reduction.
//!
//! [`Reducer::step`] finds the left-most outermost beta or eta redex of a term
//! and contracts it in place. Aliases met on the way are replaced by a copy of
//! their declaration; resolving an alias is not a reduction step of its own.
//!
//! An application built with the `~` operator reduces its argument to normal
//! form before the function is applied, which gives programs a way to ask for
//! call-by-value evaluation.

use crate::Error;
use crate::decls::Declarations;
use crate::freevars::is_free;
use crate::intern::{Interner, Name};
use crate::subst::subst;
use crate::term::{TermId, TermKind, TermPool};

/// Borrowed view of the session state needed to reduce a term
pub struct Reducer<'a> {
    pub pool: &'a mut TermPool,
    pub names: &'a mut Interner,
    pub decls: &'a Declarations,
}

impl Reducer<'_> {
    /// Perform one reduction step on `term`.
    ///
    /// Returns `Ok(false)` when `term` is in normal form.
    pub fn step(&mut self, term: TermId) -> Result<bool, Error> {
        let tilde = self.names.well_known().tilde;
        let mut stack = vec![term];

        while let Some(t) = stack.pop() {
            match self.pool.kind(t) {
                TermKind::Var(_) => {}

                TermKind::Abstr { param, body } => {
                    if self.try_eta(t, param, body) {
                        return Ok(true);
                    }
                    stack.push(body);
                }

                TermKind::Appl { .. } => {
                    let Some((func, arg, oper)) = self.resolve_head(t)? else {
                        return Ok(true);
                    };

                    let TermKind::Abstr { param, body } = self.pool.kind(func) else {
                        stack.push(arg);
                        stack.push(func);
                        continue;
                    };

                    if oper == Some(tilde) && self.step(arg)? {
                        return Ok(true);
                    }

                    self.beta(t, func, param, body, arg)?;
                    return Ok(true);
                }

                TermKind::Alias(_) => {
                    if !self.resolve_aliases(t)? {
                        return Ok(true);
                    }
                    stack.push(t);
                }
            }
        }
        Ok(false)
    }

    /// Replace alias node `t` by a copy of its declaration
    pub fn resolve_alias(&mut self, t: TermId) -> Result<(), Error> {
        let TermKind::Alias(name) = self.pool.kind(t) else {
            return Err(Error::invariant("alias resolution on a non-alias"));
        };
        let Some(copy) = self.decls.lookup_clone(self.pool, name) else {
            return Err(Error::UndeclaredAlias(self.names.resolve(name).to_owned()));
        };
        debug_assert!(self.pool.is_closed(copy));
        self.pool.take_over(t, copy);
        Ok(())
    }

    /// Resolve alias node `t` until it is something else.
    ///
    /// Returns `false` when the chain of aliases is longer than the number of
    /// declarations: the aliases only name each other and `t` never changes.
    /// The caller counts that as a step so the driver can still poll.
    fn resolve_aliases(&mut self, t: TermId) -> Result<bool, Error> {
        for _ in 0..=self.decls.len() {
            if !matches!(self.pool.kind(t), TermKind::Alias(_)) {
                return Ok(true);
            }
            self.resolve_alias(t)?;
        }
        Ok(!matches!(self.pool.kind(t), TermKind::Alias(_)))
    }

    /// Resolve the function part of application `t` until it is no longer an
    /// alias. `None` when it is an alias cycle.
    fn resolve_head(
        &mut self,
        t: TermId,
    ) -> Result<Option<(TermId, TermId, Option<Name>)>, Error> {
        let TermKind::Appl { func, .. } = self.pool.kind(t) else {
            return Err(Error::invariant("application expected"));
        };
        if !self.resolve_aliases(func)? {
            return Ok(None);
        }
        let TermKind::Appl { func, arg, oper } = self.pool.kind(t) else {
            return Err(Error::invariant("application expected"));
        };
        Ok(Some((func, arg, oper)))
    }

    /// `\x.M x` -> `M` when `x` is not free in `M`
    fn try_eta(&mut self, t: TermId, x: Name, body: TermId) -> bool {
        let TermKind::Appl { func, arg, .. } = self.pool.kind(body) else {
            return false;
        };
        if self.pool.kind(arg) != TermKind::Var(x) || is_free(self.pool, func, x) {
            return false;
        }
        self.pool.take_over(t, func);
        self.pool.release_shell(arg);
        self.pool.release_shell(body);
        true
    }

    /// `(\x.M) N` -> `M[x := N]`, rewriting application node `t`
    fn beta(
        &mut self,
        t: TermId,
        func: TermId,
        x: Name,
        body: TermId,
        arg: TermId,
    ) -> Result<(), Error> {
        let was_closed = self.pool.is_closed(t);
        let found = subst(self.pool, self.names, x, body, arg, false)?;

        self.pool.take_over(t, body);
        let closed = self.pool.is_closed(t) || was_closed;
        self.pool.set_closed(t, closed);

        self.pool.release_shell(func);
        if found {
            self.pool.release_shell(arg);
        } else {
            self.pool.release(arg);
        }
        Ok(())
    }
}

/// Desugar operator applications: `a op b` becomes `op a b`, where `op` is an
/// alias. Applications marked with `~` keep the marker.
pub fn remove_operators(pool: &mut TermPool, names: &Interner, term: TermId) {
    let tilde = names.well_known().tilde;
    let mut stack = vec![term];

    while let Some(t) = stack.pop() {
        match pool.kind(t) {
            TermKind::Var(_) | TermKind::Alias(_) => {}
            TermKind::Abstr { body, .. } => stack.push(body),
            TermKind::Appl { func, arg, oper } => {
                stack.push(arg);
                stack.push(func);
                if let Some(op) = oper
                    && op != tilde
                {
                    let alias = pool.alias(op);
                    let partial = pool.appl(alias, func);
                    let closed = pool.is_closed(func);
                    pool.set_closed(partial, closed);
                    pool.get_mut(t).kind = TermKind::Appl {
                        func: partial,
                        arg,
                        oper: None,
                    };
                }
            }
        }
    }
}

#[cfg(all(test, feature = "parser"))]
mod tests {
    use super::*;
    use crate::freevars::{free_variables, set_closed_flags};
    use crate::operators::{Assoc, OperatorTable};
    use crate::parser::parse_term;
    use crate::render::{RenderOptions, render};

    struct Fixture {
        pool: TermPool,
        names: Interner,
        decls: Declarations,
        ops: OperatorTable,
    }

    impl Fixture {
        #[expect(clippy::unwrap_used)] // test code OK
        fn new(declarations: &[(&str, &str)]) -> Self {
            let mut f = Fixture {
                pool: TermPool::new(),
                names: Interner::new(),
                decls: Declarations::new(),
                ops: OperatorTable::new(),
            };
            for (name, src) in declarations {
                let term = f.term(src);
                let name = f.names.intern(name);
                f.decls.add(&mut f.pool, &f.names, name, term).unwrap();
            }
            f
        }

        #[expect(clippy::unwrap_used)] // test code OK
        fn term(&mut self, src: &str) -> TermId {
            let t = parse_term(src, &mut self.pool, &mut self.names, &self.ops).unwrap();
            remove_operators(&mut self.pool, &self.names, t);
            set_closed_flags(&mut self.pool, t);
            t
        }

        fn reducer(&mut self) -> Reducer<'_> {
            Reducer {
                pool: &mut self.pool,
                names: &mut self.names,
                decls: &self.decls,
            }
        }

        /// Reduce to normal form, returning the printed result and step count
        fn normalize(&mut self, src: &str) -> Result<(String, usize), Error> {
            let t = self.term(src);
            let mut steps = 0;
            loop {
                let stepped = self.reducer().step(t);
                match stepped {
                    Ok(true) => steps += 1,
                    Ok(false) => break,
                    Err(e) => {
                        self.pool.release(t);
                        return Err(e);
                    }
                }
                assert!(steps < 10_000, "{src} does not terminate");
            }
            let options = RenderOptions {
                readable: false,
                ..RenderOptions::default()
            };
            let shown = render(&self.pool, &self.names, t, &options);
            self.pool.release(t);
            Ok((shown, steps))
        }
    }

    #[test]
    fn test_normal_forms() {
        let mut f = Fixture::new(&[
            ("I", "\\x.x"),
            ("K", "\\x.\\y.x"),
            ("S", "\\x.\\y.\\z.x z (y z)"),
            ("Omega", "(\\x.x x) (\\x.x x)"),
        ]);

        let test_cases = vec![
            // (input, normal form, steps)
            ("(\\x.x) a", "a", 1),
            ("\\x.(\\y.y) x", "\\y.y", 1),
            ("\\x.f x", "f", 1),
            ("\\x.x x", "\\x.x x", 0),
            ("I a", "a", 1),
            ("K a b", "a", 2),
            ("S K K c", "c", 5),
            // discarding a divergent argument
            ("K c Omega", "c", 2),
            // capture avoidance during beta
            ("(\\x.\\y.y x) y", "\\a.a y", 1),
            ("(\\f.\\x.f (f x)) (\\y.y)", "\\y.y", 3),
        ];

        for (input, expected, expected_steps) in test_cases {
            assert_eq!(
                f.normalize(input),
                Ok((expected.to_owned(), expected_steps)),
                "{input}"
            );
        }
        assert_eq!(f.pool.live_count(), f.decls.iter().map(|(_, t)| f.pool.size(t)).sum());
    }

    #[test]
    fn test_undeclared_alias_is_reported() {
        let mut f = Fixture::new(&[("I", "\\x.x")]);
        assert_eq!(
            f.normalize("I Missing"),
            Err(Error::UndeclaredAlias("Missing".into()))
        );
        assert_eq!(f.normalize("Missing I"), Err(Error::UndeclaredAlias("Missing".into())));
    }

    #[test]
    #[expect(clippy::unwrap_used)] // test code OK
    fn test_alias_cycles_yield_between_steps() {
        let mut f = Fixture::new(&[("X", "X"), ("P", "Q"), ("Q", "P"), ("I", "\\x.x")]);
        let plain = RenderOptions {
            readable: false,
            ..RenderOptions::default()
        };

        for src in ["X", "X a", "P a", "I (P a)"] {
            let t = f.term(src);
            // every step returns, and the term never gets anywhere
            for _ in 0..5 {
                assert!(f.reducer().step(t).unwrap(), "{src}");
            }
            let shown = render(&f.pool, &f.names, t, &plain);
            assert!(shown.starts_with('X') || shown.starts_with('P') || shown.starts_with('Q'), "{src}: {shown}");
            f.pool.release(t);
        }

        // chains through several declarations still resolve within one step
        let mut f = Fixture::new(&[("I", "\\x.x"), ("J", "I"), ("H", "J")]);
        assert_eq!(f.normalize("H a"), Ok(("a".to_owned(), 1)));
    }

    #[test]
    fn test_call_by_value_marker() {
        let mut f = Fixture::new(&[("I", "\\x.x"), ("K", "\\x.\\y.x")]);
        let tilde = f.names.well_known().tilde;
        let v = f.names.intern("v");
        f.ops.define(tilde, 100, Assoc::Left);

        // With ~ the argument is reduced first: (I v) -> v, then the beta step
        let t = f.term("(\\x.K x) ~ (I v)");
        assert!(matches!(f.pool.kind(t), TermKind::Appl { oper: Some(o), .. } if o == tilde));
        assert!(f.reducer().step(t).unwrap_or(false));
        let TermKind::Appl { arg, .. } = f.pool.kind(t) else {
            panic!("beta fired before the argument was reduced");
        };
        assert_eq!(f.pool.kind(arg), TermKind::Var(v));
        f.pool.release(t);

        assert_eq!(f.normalize("(\\x.\\y.x) ~ (I v)"), Ok(("\\y.v".to_owned(), 2)));
    }

    #[test]
    #[expect(clippy::unwrap_used)] // test code OK
    fn test_remove_operators_desugars_to_alias_application() {
        let mut pool = TermPool::new();
        let mut names = Interner::new();
        let mut ops = OperatorTable::new();
        let plus = names.intern("+");
        ops.define(plus, 50, Assoc::Left);

        let t = parse_term("a + b", &mut pool, &mut names, &ops).unwrap();
        remove_operators(&mut pool, &names, t);
        let TermKind::Appl { func, oper, .. } = pool.kind(t) else {
            panic!("expected application");
        };
        assert_eq!(oper, None);
        let TermKind::Appl { func: head, .. } = pool.kind(func) else {
            panic!("expected partial application");
        };
        assert_eq!(pool.kind(head), TermKind::Alias(plus));
        assert_eq!(pool.size(t), 5);
    }

    #[test]
    fn test_beta_keeps_closed_flags_sound() {
        let mut f = Fixture::new(&[("K", "\\x.\\y.x")]);
        let sources = [
            "(\\x.\\y.x y z) (\\q.w q)",
            "(\\x.x) (\\y.y z)",
            "K z (\\x.x)",
            "(\\f.f (f z)) (\\x.\\y.x)",
        ];
        for src in sources {
            let t = f.term(src);
            while f.reducer().step(t).unwrap_or(false) {
                let mut stack = vec![t];
                while let Some(id) = stack.pop() {
                    if f.pool.is_closed(id) {
                        assert!(free_variables(&f.pool, id).is_empty(), "{src}");
                    }
                    match f.pool.kind(id) {
                        TermKind::Abstr { body, .. } => stack.push(body),
                        TermKind::Appl { func, arg, .. } => {
                            stack.push(func);
                            stack.push(arg);
                        }
                        _ => {}
                    }
                }
            }
            f.pool.release(t);
        }
    }
}
