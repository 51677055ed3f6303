//! Lambda term representation with pooled arena allocation.
//!
//! Terms are stored in a [`TermPool`] and addressed by [`TermId`] handles. A node
//! owns the ids of its children, so every subtree has exactly one owner. Reduction
//! rewrites nodes in place by moving the contents of one slot into another
//! ([`TermPool::take_over`]) and releasing the emptied shell.
//!
//! Released slots go to a free list and are handed out again by
//! [`TermPool::allocate`]. Every slot carries a generation that is bumped on
//! release, so a stale id is detected instead of silently reading a recycled node.

use crate::intern::Name;

/// Handle to a node in a [`TermPool`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TermId {
    index: u32,
    generation: u32,
}

impl TermId {
    #[inline]
    pub const fn index(self) -> usize {
        self.index as usize
    }
}

/// Node variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermKind {
    /// Bound (or free) variable
    Var(Name),
    /// Reference to a declaration, resolved lazily. Aliases are always closed.
    Alias(Name),
    /// `\param.body`
    Abstr { param: Name, body: TermId },
    /// `func arg`; `oper` is the surface operator the application came from
    Appl {
        func: TermId,
        arg: TermId,
        oper: Option<Name>,
    },
}

/// Term node stored in the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermNode {
    pub kind: TermKind,
    /// `true` only if the term has no free variables
    pub closed: bool,
}

impl TermNode {
    #[inline]
    pub fn var(name: Name) -> Self {
        TermNode {
            kind: TermKind::Var(name),
            closed: false,
        }
    }

    #[inline]
    pub fn alias(name: Name) -> Self {
        TermNode {
            kind: TermKind::Alias(name),
            closed: true,
        }
    }

    #[inline]
    pub fn abstr(param: Name, body: TermId) -> Self {
        TermNode {
            kind: TermKind::Abstr { param, body },
            closed: false,
        }
    }

    #[inline]
    pub fn appl(func: TermId, arg: TermId, oper: Option<Name>) -> Self {
        TermNode {
            kind: TermKind::Appl { func, arg, oper },
            closed: false,
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    live: bool,
    node: TermNode,
}

/// Arena of term nodes with a free list of recycled slots
///
/// The pool is not thread-safe; a session owns exactly one.
#[derive(Debug)]
pub struct TermPool {
    slots: Vec<Slot>,
    free: Vec<u32>,
    /// Generation given to newly created slots; stays above every truncated slot
    generation_floor: u32,
    live: usize,
}

impl TermPool {
    pub fn new() -> Self {
        Self::with_capacity(4096)
    }

    pub fn with_capacity(cap: usize) -> Self {
        TermPool {
            slots: Vec::with_capacity(cap),
            free: Vec::new(),
            generation_floor: 0,
            live: 0,
        }
    }

    /// Store `node`, reusing a pooled slot when one is available
    pub fn allocate(&mut self, node: TermNode) -> TermId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.live = true;
            slot.node = node;
            return TermId {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: self.generation_floor,
            live: true,
            node,
        });
        TermId {
            index,
            generation: self.generation_floor,
        }
    }

    #[inline]
    fn is_current(&self, id: TermId) -> bool {
        self.slots
            .get(id.index())
            .is_some_and(|slot| slot.live && slot.generation == id.generation)
    }

    #[inline]
    pub fn get(&self, id: TermId) -> &TermNode {
        debug_assert!(self.is_current(id), "stale term id {id:?}");
        &self.slots[id.index()].node
    }

    #[inline]
    pub fn get_mut(&mut self, id: TermId) -> &mut TermNode {
        debug_assert!(self.is_current(id), "stale term id {id:?}");
        &mut self.slots[id.index()].node
    }

    #[inline]
    pub fn kind(&self, id: TermId) -> TermKind {
        self.get(id).kind
    }

    #[inline]
    pub fn is_closed(&self, id: TermId) -> bool {
        self.get(id).closed
    }

    #[inline]
    pub fn set_closed(&mut self, id: TermId, closed: bool) {
        self.get_mut(id).closed = closed;
    }

    /// Overwrite the contents of `id`
    #[inline]
    pub fn replace(&mut self, id: TermId, node: TermNode) {
        *self.get_mut(id) = node;
    }

    /// Release the node itself but not its children, which must be owned elsewhere
    pub fn release_shell(&mut self, id: TermId) {
        if !self.is_current(id) {
            debug_assert!(false, "double release of term {id:?}");
            return;
        }
        let slot = &mut self.slots[id.index()];
        slot.live = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
    }

    /// Release a term and its whole subtree
    pub fn release(&mut self, id: TermId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            match self.kind(id) {
                TermKind::Var(_) | TermKind::Alias(_) => {}
                TermKind::Abstr { body, .. } => stack.push(body),
                TermKind::Appl { func, arg, .. } => {
                    stack.push(func);
                    stack.push(arg);
                }
            }
            self.release_shell(id);
        }
    }

    /// Move the contents of `src` into `dst` and release the `src` shell.
    ///
    /// The children of `src` become children of `dst`; whatever `dst` owned before
    /// must already have been released or re-owned by the caller.
    pub fn take_over(&mut self, dst: TermId, src: TermId) {
        let node = *self.get(src);
        self.replace(dst, node);
        self.release_shell(src);
    }

    /// Deep copy of a term, closed flags included
    pub fn clone_term(&mut self, src: TermId) -> TermId {
        let root = self.allocate(*self.get(src));
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            match self.kind(id) {
                TermKind::Var(_) | TermKind::Alias(_) => {}
                TermKind::Abstr { param, body } => {
                    let body = self.allocate(*self.get(body));
                    self.get_mut(id).kind = TermKind::Abstr { param, body };
                    stack.push(body);
                }
                TermKind::Appl { func, arg, oper } => {
                    let func = self.allocate(*self.get(func));
                    let arg = self.allocate(*self.get(arg));
                    self.get_mut(id).kind = TermKind::Appl { func, arg, oper };
                    stack.push(arg);
                    stack.push(func);
                }
            }
        }
        root
    }

    /// Deallocate pooled slots.
    ///
    /// Free slots at the end of the arena are dropped and the spare capacity is
    /// returned to the allocator. A free slot below the last live node cannot be
    /// dropped without moving ids, so it stays pooled until every slot above it
    /// is free too. Returns the number of slots deallocated.
    pub fn drain(&mut self) -> usize {
        let before = self.slots.len();
        while let Some(last) = self.slots.last() {
            if last.live {
                break;
            }
            self.generation_floor = self.generation_floor.max(last.generation);
            self.slots.pop();
        }
        let len = self.slots.len() as u32;
        self.free.retain(|&index| index < len);
        self.slots.shrink_to_fit();
        self.free.shrink_to_fit();
        before - self.slots.len()
    }

    /// Number of live nodes
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Number of released nodes waiting for reuse
    pub fn pooled_count(&self) -> usize {
        self.free.len()
    }

    /// Number of nodes in a term
    pub fn size(&self, id: TermId) -> usize {
        let mut stack = vec![id];
        let mut n = 0;
        while let Some(id) = stack.pop() {
            n += 1;
            match self.kind(id) {
                TermKind::Var(_) | TermKind::Alias(_) => {}
                TermKind::Abstr { body, .. } => stack.push(body),
                TermKind::Appl { func, arg, .. } => {
                    stack.push(func);
                    stack.push(arg);
                }
            }
        }
        n
    }

    /// Structural equality of two terms (names compared by identity, flags ignored)
    pub fn same_shape(&self, a: TermId, b: TermId) -> bool {
        let mut stack = vec![(a, b)];
        while let Some((a, b)) = stack.pop() {
            match (self.kind(a), self.kind(b)) {
                (TermKind::Var(x), TermKind::Var(y)) | (TermKind::Alias(x), TermKind::Alias(y)) => {
                    if x != y {
                        return false;
                    }
                }
                (
                    TermKind::Abstr { param: x, body: p },
                    TermKind::Abstr { param: y, body: q },
                ) => {
                    if x != y {
                        return false;
                    }
                    stack.push((p, q));
                }
                (
                    TermKind::Appl {
                        func: f1,
                        arg: a1,
                        oper: o1,
                    },
                    TermKind::Appl {
                        func: f2,
                        arg: a2,
                        oper: o2,
                    },
                ) => {
                    if o1 != o2 {
                        return false;
                    }
                    stack.push((f1, f2));
                    stack.push((a1, a2));
                }
                _ => return false,
            }
        }
        true
    }

    // Builders

    pub fn var(&mut self, name: Name) -> TermId {
        self.allocate(TermNode::var(name))
    }

    pub fn alias(&mut self, name: Name) -> TermId {
        self.allocate(TermNode::alias(name))
    }

    pub fn abstr(&mut self, param: Name, body: TermId) -> TermId {
        self.allocate(TermNode::abstr(param, body))
    }

    pub fn appl(&mut self, func: TermId, arg: TermId) -> TermId {
        self.allocate(TermNode::appl(func, arg, None))
    }

    pub fn appl_with_oper(&mut self, func: TermId, arg: TermId, oper: Option<Name>) -> TermId {
        self.allocate(TermNode::appl(func, arg, oper))
    }

    /// `head a1 a2 ... an`, left-nested
    pub fn appl_spine(&mut self, head: TermId, args: impl IntoIterator<Item = TermId>) -> TermId {
        args.into_iter().fold(head, |acc, arg| self.appl(acc, arg))
    }

    /// `\p1.\p2. ... \pn.body`
    pub fn abstr_chain(&mut self, params: &[Name], body: TermId) -> TermId {
        params
            .iter()
            .rev()
            .fold(body, |acc, &param| self.abstr(param, acc))
    }

    /// Right-most operand of an application chain: the node that re-grouping
    /// by operator precedence would move under a tighter-binding operator.
    pub fn right_spine(&self, id: TermId) -> TermId {
        let mut cur = id;
        while let TermKind::Appl { arg, .. } = self.kind(cur) {
            cur = arg;
        }
        cur
    }
}

impl Default for TermPool {
    fn default() -> Self {
        Self::new()
    }
}
