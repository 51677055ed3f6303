//! Numeral and list encodings.
//!
//! Number literals are read as Church numerals. For printing, three numeral
//! encodings are recognised:
//!
//! - Church: `\f.\x.f (f ... (f x))`
//! - Scott: `0 = \s.\z.z`, `N+1 = \s.\z.s N`
//! - unevaluated `Succ (Succ ... 0)` chains over the `Succ` and `0` aliases
//!
//! Lists are encoded as pairs `\s.s Head Tail` ending in `\x.\x.\y.x`.

use crate::intern::{Interner, WellKnown};
use crate::term::{TermId, TermKind, TermPool};
use crate::{Error, MAX_NUMERAL};

/// Build the Church numeral for `n`
pub fn church_numeral(pool: &mut TermPool, names: &mut Interner, n: usize) -> Result<TermId, Error> {
    if n > MAX_NUMERAL {
        return Err(Error::NumeralOutOfRange(n.to_string()));
    }
    let f = names.intern("f");
    let x = names.intern("x");

    let mut body = pool.var(x);
    for _ in 0..n {
        let fv = pool.var(f);
        body = pool.appl(fv, body);
    }
    let inner = pool.abstr(x, body);
    let term = pool.abstr(f, inner);
    pool.set_closed(term, true);
    pool.set_closed(inner, n == 0);
    Ok(term)
}

/// The number encoded by `term`, if it is a numeral
pub fn number_of(pool: &TermPool, well_known: &WellKnown, term: TermId) -> Option<usize> {
    let mut n = 0;
    let mut cur = term;
    while let TermKind::Appl { func, arg, .. } = pool.kind(cur)
        && pool.kind(func) == TermKind::Alias(well_known.succ)
    {
        n += 1;
        cur = arg;
    }
    if pool.kind(cur) == TermKind::Alias(well_known.zero) {
        return Some(n);
    }

    scott_numeral(pool, cur).or_else(|| church_number(pool, cur))
}

fn scott_numeral(pool: &TermPool, term: TermId) -> Option<usize> {
    let mut n = 0;
    let mut cur = term;
    loop {
        let TermKind::Abstr { param: s, body: inner } = pool.kind(cur) else {
            return None;
        };
        let TermKind::Abstr { param: z, body } = pool.kind(inner) else {
            return None;
        };
        match pool.kind(body) {
            TermKind::Var(v) if v == z => return Some(n),
            TermKind::Appl { func, arg, .. } if pool.kind(func) == TermKind::Var(s) => {
                n += 1;
                cur = arg;
            }
            _ => return None,
        }
    }
}

fn church_number(pool: &TermPool, term: TermId) -> Option<usize> {
    let TermKind::Abstr { param: f, body: inner } = pool.kind(term) else {
        return None;
    };
    let TermKind::Abstr { param: x, body } = pool.kind(inner) else {
        return None;
    };
    if f == x {
        return None;
    }

    let mut n = 0;
    let mut cur = body;
    loop {
        match pool.kind(cur) {
            TermKind::Var(v) if v == x => return Some(n),
            TermKind::Appl { func, arg, .. } if pool.kind(func) == TermKind::Var(f) => {
                n += 1;
                cur = arg;
            }
            _ => return None,
        }
    }
}

/// `true` if `term` encodes a list
pub fn is_list(pool: &TermPool, term: TermId) -> bool {
    let mut cur = term;
    loop {
        let TermKind::Abstr { param, body } = pool.kind(cur) else {
            return false;
        };
        match pool.kind(body) {
            // \s.s Head Tail
            TermKind::Appl { func, arg, .. }
                if matches!(pool.kind(func), TermKind::Appl { func: s, .. }
                    if pool.kind(s) == TermKind::Var(param)) =>
            {
                cur = arg;
            }
            // \x.\x.\y.x
            TermKind::Abstr { param: x, body } => {
                return matches!(pool.kind(body), TermKind::Abstr { body: v, .. }
                    if pool.kind(v) == TermKind::Var(x));
            }
            _ => return false,
        }
    }
}

/// Elements of a list encoding, in order. `term` must satisfy [`is_list`].
pub fn list_elements(pool: &TermPool, term: TermId) -> Vec<TermId> {
    let mut elements = Vec::new();
    let mut cur = term;
    while let TermKind::Abstr { body, .. } = pool.kind(cur)
        && let TermKind::Appl { func, arg, .. } = pool.kind(body)
        && let TermKind::Appl { arg: head, .. } = pool.kind(func)
    {
        elements.push(head);
        cur = arg;
    }
    elements
}

/// `\x.x`
pub fn is_identity(pool: &TermPool, term: TermId) -> bool {
    matches!(pool.kind(term), TermKind::Abstr { param, body }
        if pool.kind(body) == TermKind::Var(param))
}
