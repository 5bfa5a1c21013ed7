//! Scope data structures: the per-namespace `(value, function)` scope
//! pair and the per-function stack of block scopes

use indexmap::IndexMap;
use mgc_common::{Ident, Span};

use crate::{FuncId, GlobalId, LocalId};

/// The scope a namespace offers to code declared inside it: the
/// transitive closure of its `using` imports folded left to right,
/// then its own declarations on top
#[derive(Debug, Default)]
pub struct NamespaceScope {
    pub values: IndexMap<Ident, GlobalId>,
    pub functions: IndexMap<Ident, FuncId>,
}

/// The stack of block scopes inside one function body.
///
/// Inner blocks may shadow outer names; duplicates within one block
/// are rejected by [`BlockScopes::declare`].
#[derive(Debug, Default)]
pub struct BlockScopes {
    layers: Vec<IndexMap<Ident, (LocalId, Span)>>,
}

impl BlockScopes {
    pub fn push(&mut self) {
        self.layers.push(IndexMap::new());
    }

    pub fn pop(&mut self) {
        self.layers.pop().expect("Unbalanced scope stack");
    }

    /// Adds a binding to the innermost block. Returns the span of the
    /// previous same-named binding of this block, if any.
    pub fn declare(&mut self, name: Ident, slot: LocalId, span: Span) -> Option<Span> {
        let layer = self.layers.last_mut().expect("No open scope");
        match layer.get(&name) {
            Some((_, previous)) => Some(*previous),
            None => {
                layer.insert(name, (slot, span));
                None
            }
        }
    }

    /// Looks a name up, innermost block first
    pub fn lookup(&self, name: &Ident) -> Option<LocalId> {
        self.layers
            .iter()
            .rev()
            .find_map(|layer| layer.get(name).map(|(slot, _)| *slot))
    }
}
