//
// Copyright (c) The yangtree Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Tree-walk iterators over the schema and data arenas.
//!
//! Schema nodes and data nodes live in flat arenas and link to each
//! other by index, so every tree walk reduces to chasing
//! parent/next/child ids. The helpers here yield raw ids through the
//! [`Arena`] link accessors; the node wrappers in `schema` and `data`
//! map the yielded ids back to handles.

use crate::context::Context;
use crate::data::{DataTree, DnodeId};
use crate::schema::SnodeId;

/// Link accessors of an index-addressed node arena.
pub(crate) trait Arena {
    type Id: Copy + PartialEq + 'static;

    fn parent_of(&self, id: Self::Id) -> Option<Self::Id>;
    fn next_of(&self, id: Self::Id) -> Option<Self::Id>;
    fn child_of(&self, id: Self::Id) -> Option<Self::Id>;
}

/// The context owns the schema arena.
impl Arena for Context {
    type Id = SnodeId;

    fn parent_of(&self, id: SnodeId) -> Option<SnodeId> {
        self.snode(id).parent
    }

    fn next_of(&self, id: SnodeId) -> Option<SnodeId> {
        self.snode(id).next
    }

    fn child_of(&self, id: SnodeId) -> Option<SnodeId> {
        self.snode(id).child
    }
}

/// Each data tree owns its own arena.
impl<'a> Arena for DataTree<'a> {
    type Id = DnodeId;

    fn parent_of(&self, id: DnodeId) -> Option<DnodeId> {
        self.dnode(id).parent
    }

    fn next_of(&self, id: DnodeId) -> Option<DnodeId> {
        self.dnode(id).next
    }

    fn child_of(&self, id: DnodeId) -> Option<DnodeId> {
        self.dnode(id).child
    }
}

/// Walk a sibling ring forward, starting at `first`.
pub(crate) fn siblings<A: Arena>(
    arena: &A,
    first: Option<A::Id>,
) -> impl Iterator<Item = A::Id> + '_ {
    let mut next = first;
    std::iter::from_fn(move || {
        let id = next?;
        next = arena.next_of(id);
        Some(id)
    })
}

/// Walk from a node up through its ancestors.
pub(crate) fn ancestors<A: Arena>(
    arena: &A,
    first: Option<A::Id>,
) -> impl Iterator<Item = A::Id> + '_ {
    let mut next = first;
    std::iter::from_fn(move || {
        let id = next?;
        next = arena.parent_of(id);
        Some(id)
    })
}

/// Depth-first walk of the subtree rooted at `start`, yielding the
/// root first. The walk descends before moving sideways and never
/// escapes the start node's subtree.
pub(crate) fn traverse<A: Arena>(
    arena: &A,
    start: A::Id,
) -> impl Iterator<Item = A::Id> + '_ {
    let mut next = Some(start);
    std::iter::from_fn(move || {
        let id = next?;
        next = match arena.child_of(id) {
            Some(child) => Some(child),
            None => {
                // Back out of exhausted levels until a sibling is
                // found or the start node closes the walk.
                let mut cursor = id;
                loop {
                    if cursor == start {
                        break None;
                    }
                    if let Some(sibling) = arena.next_of(cursor) {
                        break Some(sibling);
                    }
                    match arena.parent_of(cursor) {
                        Some(parent) => cursor = parent,
                        None => break None,
                    }
                }
            }
        };
        Some(id)
    })
}
