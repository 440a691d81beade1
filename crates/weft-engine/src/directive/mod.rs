//! Directive nodes and the per-pass structures that connect them.
//!
//! A render pass owns an [`arena::Arena`] of [`Directive`]s addressed by
//! [`Handle`]s, a [`registry::Registry`] for lookups by id, and one
//! [`Scheduler`] per directive for bound-directive notification.
//!
//! # Lifecycle
//!
//! ```text
//! None ──begin()──▶ Rendering ──deliver(Rendered)──▶ Rendered
//!   │                                                   ▲
//!   └──────────── error boundary delivers ──────────────┘
//! ```
//!
//! A result is immutable once the directive is Rendered; later deliveries
//! are ignored.

pub(crate) mod arena;
mod collection;
pub(crate) mod registry;
mod scheduler;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Mutex, RwLock};

pub use collection::DirectiveCollection;
pub use scheduler::Scheduler;

use crate::Arguments;
use crate::elements::Element;

/// Opaque index of a directive within its render pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub(crate) u32);

impl Handle {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Closed set of directive kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DirectiveType {
    Single,
    Renderless,
    Static,
    Property,
    Control,
    Execution,
    EncodedExecution,
    InlineStatement,
    PermissionBlock,
    Translation,
    FormattableTranslation,
    Template,
    HashCodePointedTemplate,
    MessageBlock,
    PartialCache,
    AsyncGroup,
    UpdateBlock,
}

/// Render status of a directive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    None,
    Rendering,
    Rendered,
}

impl Status {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Rendering,
            2 => Self::Rendered,
            _ => Self::None,
        }
    }
}

/// One node of the directive tree.
pub struct Directive {
    handle: Handle,
    unique_id: String,
    parent: Option<Handle>,
    arguments: RwLock<Arguments>,
    status: AtomicU8,
    result: Mutex<String>,
    inline_error: AtomicBool,
    parked: AtomicBool,
    scheduler: Scheduler,
    element: Element,
}

impl Directive {
    pub(crate) fn new(
        handle: Handle,
        parent: Option<Handle>,
        arguments: Arguments,
        element: Element,
    ) -> Self {
        Self {
            handle,
            unique_id: uuid::Uuid::new_v4().to_string(),
            parent,
            arguments: RwLock::new(arguments),
            status: AtomicU8::new(Status::None as u8),
            result: Mutex::new(String::new()),
            inline_error: AtomicBool::new(false),
            parked: AtomicBool::new(false),
            scheduler: Scheduler::default(),
            element,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Id unique within the render pass.
    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// Author-given id (`$C:Menu$` → `Menu`), if the kind carries one.
    pub fn directive_id(&self) -> Option<&str> {
        self.element.directive_id()
    }

    pub fn kind(&self) -> DirectiveType {
        self.element.kind()
    }

    pub fn parent(&self) -> Option<Handle> {
        self.parent
    }

    pub fn status(&self) -> Status {
        Status::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Current result text.
    pub fn result(&self) -> String {
        self.result.lock().unwrap().clone()
    }

    /// Snapshot of the argument scope.
    pub fn arguments(&self) -> Arguments {
        self.arguments.read().unwrap().clone()
    }

    pub fn argument(&self, name: &str) -> Option<String> {
        self.arguments.read().unwrap().get(name).map(str::to_owned)
    }

    pub fn has_inline_error(&self) -> bool {
        self.inline_error.load(Ordering::Acquire)
    }

    /// Whether the directive is waiting on a bound target.
    pub fn is_parked(&self) -> bool {
        self.parked.load(Ordering::Acquire)
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn searchable(&self) -> bool {
        self.element.searchable()
    }

    pub fn can_async(&self) -> bool {
        self.element.can_async()
    }

    pub(crate) fn element(&self) -> &Element {
        &self.element
    }

    pub(crate) fn set_arguments(&self, arguments: Arguments) {
        *self.arguments.write().unwrap() = arguments;
    }

    pub(crate) fn extend_arguments(&self, other: &Arguments) {
        self.arguments.write().unwrap().extend(other);
    }

    pub(crate) fn set_inline_error(&self) {
        self.inline_error.store(true, Ordering::Release);
    }

    pub(crate) fn set_parked(&self, parked: bool) {
        self.parked.store(parked, Ordering::Release);
    }

    /// Move from None to Rendering. Returns `false` if another caller did.
    pub(crate) fn begin(&self) -> bool {
        self.status
            .compare_exchange(
                Status::None as u8,
                Status::Rendering as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Settle a directive left parked when its collection finished.
    ///
    /// Moves None straight to Rendered with an empty result, so a later fire
    /// of the bound target finds nothing to render. Returns `false` if the
    /// directive already began rendering.
    pub(crate) fn abandon(&self) -> bool {
        let abandoned = self
            .status
            .compare_exchange(
                Status::None as u8,
                Status::Rendered as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if abandoned {
            self.set_parked(false);
        }
        abandoned
    }

    /// Store a result with the given status. Ignored once Rendered.
    pub(crate) fn deliver(&self, status: Status, text: String) {
        let mut result = self.result.lock().unwrap();
        if self.status() == Status::Rendered {
            tracing::debug!(directive = %self.unique_id, "Late delivery ignored");
            return;
        }
        *result = text;
        self.status.store(status as u8, Ordering::Release);
    }

    /// Mark Rendered, keeping the current result.
    pub(crate) fn finish(&self) {
        let _result = self.result.lock().unwrap();
        self.status.store(Status::Rendered as u8, Ordering::Release);
    }
}

impl fmt::Debug for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Directive")
            .field("handle", &self.handle)
            .field("unique_id", &self.unique_id)
            .field("kind", &self.kind())
            .field("directive_id", &self.directive_id())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::arena::Arena;
    use super::registry::{Registry, Wait};
    use super::*;
    use crate::elements::Element;

    static_assertions::assert_impl_all!(Directive: Send, Sync);
    static_assertions::assert_impl_all!(DirectiveCollection: Send, Sync);

    fn translation(arena: &Arena, id: &str) -> std::sync::Arc<Directive> {
        arena.insert(|handle| Directive::new(handle, None, Arguments::new(), Element::translation(id)))
    }

    #[test]
    fn test_status_gate() {
        let arena = Arena::default();
        let directive = translation(&arena, "Hi");

        assert_eq!(directive.status(), Status::None);
        assert!(directive.begin());
        assert!(!directive.begin());
        assert_eq!(directive.status(), Status::Rendering);

        directive.deliver(Status::Rendered, "first".to_owned());
        directive.deliver(Status::Rendered, "second".to_owned());
        assert_eq!(directive.result(), "first");
        assert_eq!(directive.status(), Status::Rendered);
    }

    #[test]
    fn test_abandon_only_from_none() {
        let arena = Arena::default();
        let parked = translation(&arena, "Parked");
        parked.set_parked(true);
        assert!(parked.abandon());
        assert!(!parked.is_parked());
        assert_eq!(parked.status(), Status::Rendered);
        assert_eq!(parked.result(), "");
        assert!(!parked.begin());

        let started = translation(&arena, "Started");
        assert!(started.begin());
        assert!(!started.abandon());
        assert_eq!(started.status(), Status::Rendering);
    }

    #[test]
    fn test_unique_ids_differ() {
        let arena = Arena::default();
        let a = translation(&arena, "A");
        let b = translation(&arena, "A");
        assert_ne!(a.unique_id(), b.unique_id());
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(b.handle()).unique_id(), b.unique_id());
    }

    #[test]
    fn test_registry_write_once() {
        let arena = Arena::default();
        let registry = Registry::default();
        let directive = translation(&arena, "Greeting");

        assert!(registry.register(&directive));
        assert!(!registry.register(&directive));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get_by_unique_id(directive.unique_id()), Some(directive.handle()));
        assert_eq!(registry.get_by_directive_id("Greeting"), vec![directive.handle()]);
    }

    #[test]
    fn test_wait_for_registered_target() {
        let arena = Arena::default();
        let registry = Registry::default();
        let target = translation(&arena, "Target");
        let waiter = translation(&arena, "Waiter");
        registry.register(&target);

        assert_eq!(registry.wait_for(&arena, "Target", waiter.handle()), Wait::Parked);
        assert_eq!(target.scheduler().fire(), vec![waiter.handle()]);
        assert_eq!(
            registry.wait_for(&arena, "Target", waiter.handle()),
            Wait::Ready(target.handle())
        );
    }

    #[test]
    fn test_pending_waiter_adopted_on_registration() {
        let arena = Arena::default();
        let registry = Registry::default();
        let waiter = translation(&arena, "Waiter");

        assert_eq!(registry.wait_for(&arena, "Later", waiter.handle()), Wait::Parked);

        let target = translation(&arena, "Later");
        registry.register(&target);
        assert_eq!(target.scheduler().pending(), 1);
        assert_eq!(target.scheduler().fire(), vec![waiter.handle()]);
    }
}
