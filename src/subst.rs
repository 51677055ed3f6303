//! Capture-avoiding substitution.

use crate::Error;
use crate::freevars::{fresh_name, is_free};
use crate::intern::{Interner, Name};
use crate::term::{TermId, TermKind, TermPool};

/// Replace every free occurrence of `x` in `m` with `n`, in place.
///
/// The first replacement moves the contents of `n` into the occurrence unless
/// `must_clone` is set; every later replacement is a deep clone. The return value
/// tells the caller whether `n` was consumed: if it was (and `must_clone` was not
/// set) only the `n` shell may be released, otherwise `n` still owns its subtree.
///
/// Closed flags of every visited node are recomputed on the way back up, so a
/// term that loses its last free variable becomes closed.
pub fn subst(
    pool: &mut TermPool,
    names: &mut Interner,
    x: Name,
    m: TermId,
    n: TermId,
    must_clone: bool,
) -> Result<bool, Error> {
    enum Frame {
        Visit(TermId),
        FinishAppl(TermId),
        FinishAbstr(TermId),
    }

    let mut found = false;
    let mut stack = vec![Frame::Visit(m)];

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Visit(id) => {
                let node = *pool.get(id);
                if node.closed {
                    continue;
                }
                match node.kind {
                    TermKind::Var(name) => {
                        if name == x {
                            if must_clone || found {
                                let copy = pool.clone_term(n);
                                pool.take_over(id, copy);
                            } else {
                                let moved = *pool.get(n);
                                pool.replace(id, moved);
                            }
                            found = true;
                        }
                    }
                    TermKind::Appl { func, arg, .. } => {
                        stack.push(Frame::FinishAppl(id));
                        stack.push(Frame::Visit(arg));
                        stack.push(Frame::Visit(func));
                    }
                    TermKind::Abstr { param, body } => {
                        if param == x {
                            continue;
                        }
                        let param = if !pool.is_closed(n)
                            && !pool.is_closed(body)
                            && is_free(pool, n, param)
                            && is_free(pool, body, x)
                        {
                            rename_bound(pool, names, id, n)?
                        } else {
                            param
                        };
                        debug_assert!(param != x);
                        stack.push(Frame::FinishAbstr(id));
                        stack.push(Frame::Visit(body));
                    }
                    TermKind::Alias(_) => {
                        return Err(Error::invariant(
                            "substitution reached an alias, which must be closed",
                        ));
                    }
                }
            }
            Frame::FinishAppl(id) => {
                if let TermKind::Appl { func, arg, .. } = pool.kind(id) {
                    let closed = pool.is_closed(func) && pool.is_closed(arg);
                    pool.set_closed(id, closed);
                }
            }
            Frame::FinishAbstr(id) => {
                if let TermKind::Abstr { body, .. } = pool.kind(id) {
                    let closed = pool.is_closed(body);
                    pool.set_closed(id, closed);
                }
            }
        }
    }
    Ok(found)
}

/// Alpha-rename the parameter of abstraction `abstr` to a name free in neither
/// its body nor `n`. Returns the new parameter.
fn rename_bound(
    pool: &mut TermPool,
    names: &mut Interner,
    abstr: TermId,
    n: TermId,
) -> Result<Name, Error> {
    let TermKind::Abstr { param, body } = pool.kind(abstr) else {
        return Err(Error::invariant("rename of a non-abstraction"));
    };
    let fresh = fresh_name(names, "", |z| is_free(pool, n, z) || is_free(pool, body, z));

    let replacement = pool.var(fresh);
    let result = subst(pool, names, param, body, replacement, true);
    pool.release(replacement);
    result?;

    pool.get_mut(abstr).kind = TermKind::Abstr { param: fresh, body };
    Ok(fresh)
}
