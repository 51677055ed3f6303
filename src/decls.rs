//! Declaration store: alias name -> closed term.
//!
//! The store owns every registered term. Iteration follows declaration order,
//! which keeps `ShowAlias` output and cycle detection deterministic.

use indexmap::IndexMap;

use crate::Error;
use crate::intern::{Interner, Name};
use crate::term::{TermId, TermPool};

#[derive(Debug, Default)]
pub struct Declarations {
    entries: IndexMap<Name, TermId>,
}

impl Declarations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `term` under `name`, releasing any previous binding.
    ///
    /// The closed flags of `term` must be up to date. A term with free variables
    /// is refused and stays owned by the caller.
    pub fn add(
        &mut self,
        pool: &mut TermPool,
        names: &Interner,
        name: Name,
        term: TermId,
    ) -> Result<(), Error> {
        if !pool.is_closed(term) {
            return Err(Error::NonClosedDeclaration(names.resolve(name).to_owned()));
        }
        if let Some(previous) = self.entries.insert(name, term) {
            pool.release(previous);
        }
        Ok(())
    }

    /// Bind `name` to `term` without releasing the previous binding, which is
    /// returned to the caller.
    ///
    /// Used when the previous term has been taken apart and its pieces now live
    /// inside other declarations.
    pub fn install(&mut self, name: Name, term: TermId) -> Option<TermId> {
        self.entries.insert(name, term)
    }

    pub fn get(&self, name: Name) -> Option<TermId> {
        self.entries.get(&name).copied()
    }

    pub fn contains(&self, name: Name) -> bool {
        self.entries.contains_key(&name)
    }

    /// Position of `name` in declaration order
    pub fn index_of(&self, name: Name) -> Option<usize> {
        self.entries.get_index_of(&name)
    }

    pub fn get_index(&self, index: usize) -> Option<(Name, TermId)> {
        self.entries
            .get_index(index)
            .map(|(&name, &term)| (name, term))
    }

    /// Deep copy of the term bound to `name`
    pub fn lookup_clone(&self, pool: &mut TermPool, name: Name) -> Option<TermId> {
        self.get(name).map(|term| pool.clone_term(term))
    }

    /// Declarations in the order they were first registered
    pub fn iter(&self) -> impl Iterator<Item = (Name, TermId)> + '_ {
        self.entries.iter().map(|(&name, &term)| (name, term))
    }

    /// Release every declaration
    pub fn remove_all(&mut self, pool: &mut TermPool) {
        for (_, term) in self.entries.drain(..) {
            pool.release(term);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::freevars::set_closed_flags;

    #[test]
    fn test_add_rejects_open_terms() {
        let mut pool = TermPool::new();
        let mut names = Interner::new();
        let mut decls = Declarations::new();
        let (bad, x, y) = (names.intern("Bad"), names.intern("x"), names.intern("y"));

        // Bad = \x.y
        let body = pool.var(y);
        let term = pool.abstr(x, body);
        set_closed_flags(&mut pool, term);

        assert_eq!(
            decls.add(&mut pool, &names, bad, term),
            Err(Error::NonClosedDeclaration("Bad".into()))
        );
        assert!(decls.is_empty());
        // the caller still owns the refused term
        assert_eq!(pool.live_count(), 2);
        pool.release(term);
    }

    #[test]
    fn test_replace_releases_previous_binding() {
        let mut pool = TermPool::new();
        let mut names = Interner::new();
        let mut decls = Declarations::new();
        let (i, k, x, y) = (
            names.intern("I"),
            names.intern("K"),
            names.intern("x"),
            names.intern("y"),
        );

        let body = pool.var(x);
        let first = pool.abstr(x, body);
        set_closed_flags(&mut pool, first);
        assert_eq!(decls.add(&mut pool, &names, i, first), Ok(()));

        let alias = pool.alias(i);
        assert_eq!(decls.add(&mut pool, &names, k, alias), Ok(()));

        let body = pool.var(y);
        let second = pool.abstr(y, body);
        set_closed_flags(&mut pool, second);
        assert_eq!(decls.add(&mut pool, &names, i, second), Ok(()));

        // old \x.x released; I keeps its original position
        assert_eq!(pool.live_count(), 3);
        let order: Vec<_> = decls.iter().map(|(name, _)| name).collect();
        assert_eq!(order, vec![i, k]);
        assert_eq!(decls.index_of(k), Some(1));
        assert_eq!(decls.get_index(0), Some((i, second)));
        assert_eq!(decls.get_index(2), None);

        let copy = decls.lookup_clone(&mut pool, i);
        assert!(copy.is_some_and(|c| c != second && pool.same_shape(c, second)));
        assert_eq!(decls.lookup_clone(&mut pool, y), None);

        decls.remove_all(&mut pool);
        assert!(decls.is_empty());
        assert_eq!(pool.live_count(), 2); // only the clone is left
    }

    #[test]
    fn test_install_hands_back_previous_term() {
        let mut pool = TermPool::new();
        let mut names = Interner::new();
        let mut decls = Declarations::new();
        let f = names.intern("F");

        let a = pool.alias(f);
        let b = pool.alias(f);
        assert_eq!(decls.install(f, a), None);
        assert_eq!(decls.install(f, b), Some(a));
        assert_eq!(decls.get(f), Some(b));
        assert!(decls.contains(f));
        assert_eq!(decls.len(), 1);
    }
}
