//! Removal of recursive aliases with a fixed point combinator.
//!
//! Declarations form a dependency graph: `A -> B` when the term of `A` mentions
//! the alias `B`. Each pass of [`eliminate_cycles`] finds the largest cycle of
//! that graph and rewrites it so that no alias refers to itself:
//!
//! - the members `d1 ... dn` of a cycle with more than one alias are packed into a
//!   tuple `d1_..._dn = \y.y d1 ... dn`, and every reference to `di` becomes the
//!   projection `d1_..._dn (\x0. ... \x(n-1).xi)`;
//! - the recursive alias `A = N` becomes `A = Y (\v.N[A := v])`.
//!
//! `Y` has to be declared by the user. It is never part of a cycle itself, so a
//! recursive definition of `Y` is left alone.

use crate::Error;
use crate::decls::Declarations;
use crate::freevars::{fresh_name, names_in, set_closed_flags};
use crate::intern::{Interner, Name};
use crate::term::{TermId, TermKind, TermNode, TermPool};

/// Aliases mentioned in `term`, left to right, without duplicates
pub fn alias_references(pool: &TermPool, term: TermId) -> Vec<Name> {
    let mut found = Vec::new();
    let mut stack = vec![term];
    while let Some(id) = stack.pop() {
        match pool.kind(id) {
            TermKind::Var(_) => {}
            TermKind::Alias(name) => {
                if !found.contains(&name) {
                    found.push(name);
                }
            }
            TermKind::Abstr { body, .. } => stack.push(body),
            TermKind::Appl { func, arg, .. } => {
                stack.push(arg);
                stack.push(func);
            }
        }
    }
    found
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Find the largest cycle among the declarations.
///
/// Roots are tried in declaration order and neighbours in reference order; of
/// several cycles with the same size the first one found wins. Members are
/// returned starting from the node that closes the cycle and following the DFS
/// tree back to its entry point.
pub fn find_cycle(pool: &TermPool, names: &Interner, decls: &Declarations) -> Option<Vec<Name>> {
    let fixpoint = names.well_known().fixpoint;
    let graph: Vec<Vec<usize>> = decls
        .iter()
        .map(|(name, term)| {
            if name == fixpoint {
                return Vec::new();
            }
            alias_references(pool, term)
                .into_iter()
                .filter(|&alias| alias != fixpoint)
                .filter_map(|alias| decls.index_of(alias))
                .collect()
        })
        .collect();

    let mut marks = vec![Mark::Unvisited; graph.len()];
    let mut prev: Vec<Option<usize>> = vec![None; graph.len()];
    // (size, start, end)
    let mut best: Option<(usize, usize, usize)> = None;

    for root in 0..graph.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        marks[root] = Mark::InProgress;
        let mut stack = vec![(root, 0usize)];

        while let Some(top) = stack.last_mut() {
            let cur = top.0;
            let Some(&next) = graph[cur].get(top.1) else {
                marks[cur] = Mark::Done;
                stack.pop();
                continue;
            };
            top.1 += 1;

            match marks[next] {
                Mark::Unvisited => {
                    prev[next] = Some(cur);
                    marks[next] = Mark::InProgress;
                    stack.push((next, 0));
                }
                Mark::InProgress => {
                    let size = cycle_members(&prev, next, cur).len();
                    if best.is_none_or(|(best_size, _, _)| size > best_size) {
                        best = Some((size, next, cur));
                    }
                }
                Mark::Done => {}
            }
        }
    }

    let (_, start, end) = best?;
    cycle_members(&prev, start, end)
        .into_iter()
        .map(|index| decls.get_index(index).map(|(name, _)| name))
        .collect()
}

/// `end, prev(end), ..., start`
fn cycle_members(prev: &[Option<usize>], start: usize, end: usize) -> Vec<usize> {
    let mut members = vec![end];
    let mut cur = end;
    while cur != start {
        match prev[cur] {
            Some(p) => {
                members.push(p);
                cur = p;
            }
            None => break,
        }
    }
    members
}

/// Replace aliases in `term` by copies of their declarations, one level deep.
///
/// With `only` set just that alias is replaced. Undeclared aliases are kept.
fn inline_aliases(pool: &mut TermPool, decls: &Declarations, term: TermId, only: Option<Name>) {
    let mut stack = vec![term];
    while let Some(id) = stack.pop() {
        match pool.kind(id) {
            TermKind::Var(_) => {}
            TermKind::Alias(name) => {
                if only.is_none_or(|o| o == name)
                    && let Some(copy) = decls.lookup_clone(pool, name)
                {
                    pool.take_over(id, copy);
                }
            }
            TermKind::Abstr { body, .. } => stack.push(body),
            TermKind::Appl { func, arg, .. } => {
                stack.push(func);
                stack.push(arg);
            }
        }
    }
}

/// Turn every `Alias(alias)` in `term` into `Var(var)`
fn alias_to_var(pool: &mut TermPool, term: TermId, alias: Name, var: Name) {
    let mut stack = vec![term];
    while let Some(id) = stack.pop() {
        match pool.kind(id) {
            TermKind::Var(_) => {}
            TermKind::Alias(name) => {
                if name == alias {
                    pool.replace(id, TermNode::var(var));
                }
            }
            TermKind::Abstr { body, .. } => stack.push(body),
            TermKind::Appl { func, arg, .. } => {
                stack.push(func);
                stack.push(arg);
            }
        }
    }
}

/// `tuple (\x0. ... \x(n-1).xi)`
fn projection(
    pool: &mut TermPool,
    names: &mut Interner,
    tuple: Name,
    n: usize,
    i: usize,
) -> TermId {
    let params: Vec<Name> = (0..n).map(|k| names.intern(&format!("x{k}"))).collect();
    let selected = pool.var(params[i]);
    let selector = pool.abstr_chain(&params, selected);
    let head = pool.alias(tuple);
    let term = pool.appl(head, selector);
    set_closed_flags(pool, term);
    term
}

/// Rewrite the cycle `members` (as returned by [`find_cycle`]) into fixed point
/// form
pub fn eliminate_cycle(
    pool: &mut TermPool,
    names: &mut Interner,
    decls: &mut Declarations,
    members: &[Name],
) -> Result<(), Error> {
    let (group, body) = match members {
        [] => return Err(Error::invariant("empty cycle")),
        [single] => {
            let Some(term) = decls.get(*single) else {
                return Err(Error::invariant("cycle member is not declared"));
            };
            (*single, term)
        }
        _ => {
            let joined = members
                .iter()
                .map(|&m| names.resolve(m))
                .collect::<Vec<_>>()
                .join("_");
            let group = names.intern(&joined);

            // \y.y d1 ... dn
            let y = names.intern("y");
            let head = pool.var(y);
            let args: Vec<TermId> = members.iter().map(|&m| pool.alias(m)).collect();
            let spine = pool.appl_spine(head, args);
            let tuple = pool.abstr(y, spine);
            set_closed_flags(pool, tuple);
            decls.add(pool, names, group, tuple)?;
            inline_aliases(pool, decls, tuple, None);

            for (i, &member) in members.iter().enumerate() {
                let selector = projection(pool, names, group, members.len(), i);
                decls.add(pool, names, member, selector)?;
                let terms: Vec<TermId> = decls.iter().map(|(_, term)| term).collect();
                for term in terms {
                    inline_aliases(pool, decls, term, Some(member));
                }
            }
            (group, tuple)
        }
    };

    let taken = names_in(pool, body);
    let sentinel = fresh_name(names, "_", |name| taken.contains(&name));
    alias_to_var(pool, body, group, sentinel);

    let combinator = pool.alias(names.well_known().fixpoint);
    let function = pool.abstr(sentinel, body);
    let wrapped = pool.appl(combinator, function);
    set_closed_flags(pool, wrapped);

    // the old term now lives inside `wrapped`
    decls.install(group, wrapped);
    Ok(())
}

/// Eliminate cycles until none is left. Returns how many were removed.
pub fn eliminate_cycles(
    pool: &mut TermPool,
    names: &mut Interner,
    decls: &mut Declarations,
) -> Result<usize, Error> {
    let mut removed = 0;
    while let Some(members) = find_cycle(pool, names, decls) {
        eliminate_cycle(pool, names, decls, &members)?;
        removed += 1;
    }
    Ok(removed)
}

#[cfg(all(test, feature = "parser"))]
mod tests {
    use super::*;
    use crate::operators::OperatorTable;
    use crate::parser::parse_term;
    use crate::reduce::{Reducer, remove_operators};
    use crate::render::{RenderOptions, render};

    struct Store {
        pool: TermPool,
        names: Interner,
        decls: Declarations,
    }

    impl Store {
        #[expect(clippy::unwrap_used)] // test code OK
        fn new(declarations: &[(&str, &str)]) -> Self {
            let mut s = Store {
                pool: TermPool::new(),
                names: Interner::new(),
                decls: Declarations::new(),
            };
            for (name, src) in declarations {
                let term = s.parse(src);
                let name = s.names.intern(name);
                s.decls.add(&mut s.pool, &s.names, name, term).unwrap();
            }
            s
        }

        #[expect(clippy::unwrap_used)] // test code OK
        fn parse(&mut self, src: &str) -> TermId {
            let ops = OperatorTable::new();
            let t = parse_term(src, &mut self.pool, &mut self.names, &ops).unwrap();
            remove_operators(&mut self.pool, &self.names, t);
            set_closed_flags(&mut self.pool, t);
            t
        }

        fn show(&self, name: &str) -> String {
            let options = RenderOptions {
                readable: false,
                ..RenderOptions::default()
            };
            match self.names.get(name).and_then(|n| self.decls.get(n)) {
                Some(term) => render(&self.pool, &self.names, term, &options),
                None => format!("<{name} undeclared>"),
            }
        }

        fn names_of(&self, members: &[Name]) -> Vec<String> {
            members
                .iter()
                .map(|&m| self.names.resolve(m).to_owned())
                .collect()
        }

        fn eliminate(&mut self) -> Result<usize, Error> {
            eliminate_cycles(&mut self.pool, &mut self.names, &mut self.decls)
        }

        /// Normal form of `src`, or `None` if it takes more than `limit` steps
        fn evaluate(&mut self, src: &str, limit: usize) -> Result<Option<String>, Error> {
            let t = self.parse(src);
            let mut reducer = Reducer {
                pool: &mut self.pool,
                names: &mut self.names,
                decls: &self.decls,
            };
            let mut steps = 0;
            let result = loop {
                match reducer.step(t) {
                    Ok(true) if steps < limit => steps += 1,
                    Ok(true) => break Ok(None),
                    Ok(false) => {
                        break Ok(Some(render(
                            reducer.pool,
                            reducer.names,
                            t,
                            &RenderOptions::default(),
                        )));
                    }
                    Err(e) => break Err(e),
                }
            };
            self.pool.release(t);
            result
        }

        fn live_outside_declarations(&self) -> usize {
            let stored: usize = self.decls.iter().map(|(_, t)| self.pool.size(t)).sum();
            self.pool.live_count() - stored
        }
    }

    const Y: &str = "\\f.(\\x.f (x x)) (\\x.f (x x))";

    #[test]
    fn test_alias_references_are_ordered_and_unique() {
        let mut s = Store::new(&[]);
        let t = s.parse("A (\\x.B x A) (C B)");
        let refs = alias_references(&s.pool, t);
        assert_eq!(s.names_of(&refs), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_acyclic_store_is_untouched() {
        let mut s = Store::new(&[
            ("I", "\\x.x"),
            ("K", "\\x.\\y.x"),
            ("S", "\\x.\\y.\\z.x z (y z)"),
            ("SKK", "S K K"),
            ("Y", Y),
        ]);
        let before: Vec<String> = ["I", "K", "S", "SKK", "Y"].iter().map(|n| s.show(n)).collect();
        let live = s.pool.live_count();

        assert_eq!(s.eliminate(), Ok(0));
        let after: Vec<String> = ["I", "K", "S", "SKK", "Y"].iter().map(|n| s.show(n)).collect();
        assert_eq!(before, after);
        assert_eq!(s.pool.live_count(), live);
        assert_eq!(s.decls.len(), 5);
    }

    #[test]
    fn test_self_recursive_alias() {
        let mut s = Store::new(&[("Y", Y), ("F", "\\n.n F")]);
        let f = s.names.intern("F");
        assert_eq!(find_cycle(&s.pool, &s.names, &s.decls), Some(vec![f]));

        assert_eq!(s.eliminate(), Ok(1));
        assert_eq!(s.show("F"), "Y \\_a.\\n.n _a");
        assert!(find_cycle(&s.pool, &s.names, &s.decls).is_none());
        assert_eq!(s.live_outside_declarations(), 0);
    }

    #[test]
    fn test_recursion_behaves_the_same_after_elimination() {
        let declarations = [
            ("Y", Y),
            ("I", "\\x.x"),
            ("True", "\\x.\\y.x"),
            ("False", "\\x.\\y.y"),
            // returns I on True, recurses on False
            ("F", "\\b.b I (F True)"),
        ];
        let mut s = Store::new(&declarations);
        assert_eq!(s.evaluate("F True", 100), Ok(Some("I".into())));
        assert_eq!(s.evaluate("F False", 100), Ok(Some("I".into())));

        assert_eq!(s.eliminate(), Ok(1));
        assert_eq!(s.evaluate("F True", 100), Ok(Some("I".into())));
        assert_eq!(s.evaluate("F False", 100), Ok(Some("I".into())));
    }

    #[test]
    fn test_mutual_recursion_is_tupled() {
        let mut s = Store::new(&[
            ("I", "\\x.x"),
            ("K", "\\x.\\y.x"),
            ("Y", Y),
            ("True", "\\x.\\y.x"),
            ("A", "\\b.b I B"),
            ("B", "\\b.b K A"),
        ]);

        let found = find_cycle(&s.pool, &s.names, &s.decls).unwrap_or_default();
        assert_eq!(s.names_of(&found), vec!["B", "A"]);

        assert_eq!(s.eliminate(), Ok(1));
        assert_eq!(s.show("B"), "B_A \\x0.\\x1.x0");
        assert_eq!(s.show("A"), "B_A \\x0.\\x1.x1");
        assert_eq!(
            s.show("B_A"),
            "Y \\_a.\\y.y (\\b.b K (_a \\x0.\\x1.x1)) \\b.b I (_a \\x0.\\x1.x0)"
        );
        assert!(find_cycle(&s.pool, &s.names, &s.decls).is_none());
        assert_eq!(s.live_outside_declarations(), 0);

        assert_eq!(s.evaluate("A True", 200), Ok(Some("I".into())));
        assert_eq!(s.evaluate("B True", 200), Ok(Some("\\x.\\y.x".into())));
    }

    #[test]
    fn test_largest_cycle_wins_and_ties_go_to_the_first() {
        // F and G are independent self-loops; H <-> J form a larger cycle
        let mut s = Store::new(&[
            ("F", "\\n.n F"),
            ("G", "\\n.n G"),
            ("H", "\\n.n J"),
            ("J", "\\n.n H"),
        ]);
        let found = find_cycle(&s.pool, &s.names, &s.decls).unwrap_or_default();
        assert_eq!(s.names_of(&found), vec!["J", "H"]);

        let mut t = Store::new(&[("F", "\\n.n F"), ("G", "\\n.n G")]);
        let found = find_cycle(&t.pool, &t.names, &t.decls).unwrap_or_default();
        assert_eq!(t.names_of(&found), vec!["F"]);
        assert_eq!(t.eliminate(), Ok(2));

        assert_eq!(s.eliminate(), Ok(3));
    }

    #[test]
    fn test_recursive_fixpoint_combinator_is_ignored() {
        let mut s = Store::new(&[("Y", "\\f.f (Y f)"), ("F", "\\n.n F")]);
        assert_eq!(s.eliminate(), Ok(1));
        assert_eq!(s.show("Y"), "\\f.f (Y f)");
    }

    #[test]
    fn test_sentinel_avoids_names_in_the_body() {
        let mut s = Store::new(&[("F", "\\_a.\\_b._a F _b")]);
        assert_eq!(s.eliminate(), Ok(1));
        assert_eq!(s.show("F"), "Y \\_c.\\_a.\\_b._a _c _b");
    }
}
