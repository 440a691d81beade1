//! Per-pass storage for directive nodes.

use std::sync::{Arc, RwLock};

use super::{Directive, Handle};

/// Append-only store of every directive created during one render pass.
///
/// Parent links and collection members are [`Handle`]s into this arena.
#[derive(Debug, Default)]
pub(crate) struct Arena {
    nodes: RwLock<Vec<Arc<Directive>>>,
}

impl Arena {
    /// Allocate a handle and store the directive built for it.
    pub fn insert(&self, build: impl FnOnce(Handle) -> Directive) -> Arc<Directive> {
        let mut nodes = self.nodes.write().unwrap();
        let handle = Handle(u32::try_from(nodes.len()).unwrap_or(u32::MAX));
        let directive = Arc::new(build(handle));
        nodes.push(Arc::clone(&directive));
        directive
    }

    /// Resolve a handle. Handles are only minted by [`Arena::insert`].
    pub fn get(&self, handle: Handle) -> Arc<Directive> {
        Arc::clone(&self.nodes.read().unwrap()[handle.index()])
    }

    pub fn len(&self) -> usize {
        self.nodes.read().unwrap().len()
    }

    /// Whether any directive in the pass raised an inline error.
    pub fn any_inline_error(&self) -> bool {
        self.nodes
            .read()
            .unwrap()
            .iter()
            .any(|directive| directive.has_inline_error())
    }
}
