//! Per-pass directive lookup.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, RwLock};

use super::arena::Arena;
use super::scheduler::Registration;
use super::{Directive, Handle};

/// Outcome of waiting on a bound target.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Wait {
    /// The waiter is queued and will be re-rendered when the target fires.
    Parked,
    /// The target already fired; render now with it as requester.
    Ready(Handle),
}

/// Maps unique ids and directive ids to the directives of one render pass.
///
/// Unique-id entries are write-once. The name index also holds waiters bound
/// to ids that no directive carries yet; the first directive registered
/// under such an id adopts them.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    by_unique_id: RwLock<HashMap<String, Handle>>,
    names: Mutex<NameIndex>,
}

#[derive(Debug, Default)]
struct NameIndex {
    by_name: HashMap<String, Vec<Handle>>,
    pending: HashMap<String, Vec<Handle>>,
}

impl Registry {
    /// Register a directive. Returns `false` if its unique id is taken.
    pub fn register(&self, directive: &Directive) -> bool {
        match self
            .by_unique_id
            .write()
            .unwrap()
            .entry(directive.unique_id().to_owned())
        {
            Entry::Occupied(_) => {
                tracing::warn!(directive = directive.unique_id(), "Duplicate directive id ignored");
                return false;
            }
            Entry::Vacant(entry) => {
                entry.insert(directive.handle());
            }
        }

        if let Some(name) = directive.directive_id() {
            let mut names = self.names.lock().unwrap();
            names
                .by_name
                .entry(name.to_owned())
                .or_default()
                .push(directive.handle());
            for waiter in names.pending.remove(name).unwrap_or_default() {
                directive.scheduler().register(waiter);
            }
        }
        true
    }

    pub fn get_by_unique_id(&self, unique_id: &str) -> Option<Handle> {
        self.by_unique_id.read().unwrap().get(unique_id).copied()
    }

    pub fn get_by_directive_id(&self, name: &str) -> Vec<Handle> {
        self.names
            .lock()
            .unwrap()
            .by_name
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Queue `waiter` on the first directive named `bound`.
    ///
    /// If any such directive already fired, returns it instead. If none is
    /// registered yet, the waiter is kept pending under `bound`.
    pub fn wait_for(&self, arena: &Arena, bound: &str, waiter: Handle) -> Wait {
        let mut names = self.names.lock().unwrap();
        let targets = names.by_name.get(bound).cloned().unwrap_or_default();

        if let Some(fired) = targets
            .iter()
            .copied()
            .find(|target| arena.get(*target).scheduler().has_fired())
        {
            return Wait::Ready(fired);
        }

        match targets.first() {
            Some(&target) => match arena.get(target).scheduler().register(waiter) {
                Registration::Queued => Wait::Parked,
                Registration::Fired => Wait::Ready(target),
            },
            None => {
                let pending = names.pending.entry(bound.to_owned()).or_default();
                if !pending.contains(&waiter) {
                    pending.push(waiter);
                }
                Wait::Parked
            }
        }
    }

    pub fn len(&self) -> usize {
        self.by_unique_id.read().unwrap().len()
    }
}
