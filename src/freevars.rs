//! Free-variable analysis.
//!
//! The `closed` flag on every node is the cut-off used by substitution and by
//! [`is_free`]: once a term is known to have no free variables neither needs to
//! look inside it. [`set_closed_flags`] computes the flags for a whole term in one
//! pass; afterwards they are maintained incrementally by `subst` and `reduce`.

use std::collections::{HashMap, HashSet};

use crate::intern::{Interner, Name};
use crate::term::{TermId, TermKind, TermPool};

/// `true` if `name` occurs free in `term`
pub fn is_free(pool: &TermPool, term: TermId, name: Name) -> bool {
    let mut stack = vec![term];
    while let Some(id) = stack.pop() {
        let node = pool.get(id);
        if node.closed {
            continue;
        }
        match node.kind {
            TermKind::Var(v) => {
                if v == name {
                    return true;
                }
            }
            // aliases are closed
            TermKind::Alias(_) => {}
            TermKind::Abstr { param, body } => {
                if param != name {
                    stack.push(body);
                }
            }
            TermKind::Appl { func, arg, .. } => {
                stack.push(arg);
                stack.push(func);
            }
        }
    }
    false
}

/// Compute the `closed` flag of every node in `term`.
///
/// Each variable is resolved to the depth of the abstraction binding it (0 when
/// free). A node at depth `d` is closed when every variable below it is bound at
/// depth `d` or deeper, i.e. by the node itself or inside it.
pub fn set_closed_flags(pool: &mut TermPool, term: TermId) {
    enum Frame {
        Enter(TermId, usize),
        Exit(TermId, usize),
    }

    const NO_VARIABLES: usize = usize::MAX;

    let mut scopes: HashMap<Name, Vec<usize>> = HashMap::new();
    // Shallowest binder depth of the variables in each finished subtree
    let mut values: Vec<usize> = Vec::new();
    let mut stack = vec![Frame::Enter(term, 1)];

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Enter(id, depth) => match pool.kind(id) {
                TermKind::Var(name) => {
                    let binder = scopes
                        .get(&name)
                        .and_then(|depths| depths.last().copied())
                        .unwrap_or(0);
                    pool.set_closed(id, false);
                    values.push(binder);
                }
                TermKind::Alias(_) => {
                    pool.set_closed(id, true);
                    values.push(NO_VARIABLES);
                }
                TermKind::Abstr { param, body } => {
                    scopes.entry(param).or_default().push(depth);
                    stack.push(Frame::Exit(id, depth));
                    stack.push(Frame::Enter(body, depth + 1));
                }
                TermKind::Appl { func, arg, .. } => {
                    stack.push(Frame::Exit(id, depth));
                    stack.push(Frame::Enter(arg, depth + 1));
                    stack.push(Frame::Enter(func, depth + 1));
                }
            },
            Frame::Exit(id, depth) => {
                let shallowest = match pool.kind(id) {
                    TermKind::Abstr { param, .. } => {
                        if let Some(depths) = scopes.get_mut(&param) {
                            depths.pop();
                        }
                        values.pop().unwrap_or(NO_VARIABLES)
                    }
                    _ => {
                        let right = values.pop().unwrap_or(NO_VARIABLES);
                        let left = values.pop().unwrap_or(NO_VARIABLES);
                        left.min(right)
                    }
                };
                pool.set_closed(id, shallowest >= depth);
                values.push(shallowest);
            }
        }
    }
}

/// Free variables of `term` in first-occurrence order, found by a full scan
/// that ignores the `closed` flags
pub fn free_variables(pool: &TermPool, term: TermId) -> Vec<Name> {
    let mut found = Vec::new();
    let mut bound: Vec<Name> = Vec::new();

    enum Frame {
        Visit(TermId),
        Unbind,
    }

    let mut stack = vec![Frame::Visit(term)];
    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Unbind => {
                bound.pop();
            }
            Frame::Visit(id) => match pool.kind(id) {
                TermKind::Var(name) => {
                    if !bound.contains(&name) && !found.contains(&name) {
                        found.push(name);
                    }
                }
                TermKind::Alias(_) => {}
                TermKind::Abstr { param, body } => {
                    bound.push(param);
                    stack.push(Frame::Unbind);
                    stack.push(Frame::Visit(body));
                }
                TermKind::Appl { func, arg, .. } => {
                    stack.push(Frame::Visit(arg));
                    stack.push(Frame::Visit(func));
                }
            },
        }
    }
    found
}

/// Every variable name occurring in `term`, bound or free
pub fn names_in(pool: &TermPool, term: TermId) -> HashSet<Name> {
    let mut names = HashSet::new();
    let mut stack = vec![term];
    while let Some(id) = stack.pop() {
        match pool.kind(id) {
            TermKind::Var(name) => {
                names.insert(name);
            }
            TermKind::Alias(_) => {}
            TermKind::Abstr { param, body } => {
                names.insert(param);
                stack.push(body);
            }
            TermKind::Appl { func, arg, .. } => {
                stack.push(func);
                stack.push(arg);
            }
        }
    }
    names
}

/// Generate the first name of the sequence `a, b, ..., z, aa, ab, ...` (each
/// candidate preceded by `prefix`) that `taken` does not reject.
///
/// A candidate that was never interned cannot occur in any term, so it is
/// accepted without asking `taken`.
pub fn fresh_name(names: &mut Interner, prefix: &str, mut taken: impl FnMut(Name) -> bool) -> Name {
    let mut counter: usize = 0;
    loop {
        let candidate = format!("{prefix}{}", alphabetic(counter));
        match names.get(&candidate) {
            None => return names.intern(&candidate),
            Some(name) if !taken(name) => return name,
            Some(_) => counter += 1,
        }
    }
}

/// Bijective base-26 spelling: 0 -> "a", 25 -> "z", 26 -> "aa"
fn alphabetic(mut n: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'a' + (n % 26) as u8);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    letters.iter().rev().map(|&b| b as char).collect()
}
