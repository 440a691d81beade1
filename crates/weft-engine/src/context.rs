//! Render pass state.
//!
//! A [`RenderContext`] owns everything scoped to one pass over a template:
//! the directive arena, the registry, the collaborators and the options.
//! Directives reach their parents, siblings and the outside world through it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use base64::Engine as _;
use base64::prelude::BASE64_URL_SAFE_NO_PAD;

use crate::cache::FragmentCache;
use crate::directive::arena::Arena;
use crate::directive::registry::{Registry, Wait};
use crate::elements::Element;
use crate::grammar::{self, Leveling};
use crate::splitter::ContentParts;
use crate::util::diagnostic_fragment;
use crate::{
    Arguments, Bind, Directive, DirectiveCollection, DirectiveType, Domain, Engine, ExecuterKind,
    Handle, Invoker, Outcome, RenderError, RenderOptions, RenderOutput, Status,
};

/// Requester resolution for a possibly bound directive.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Requester {
    /// Render now on behalf of this requester.
    Ready(Option<String>),
    /// Bound target not rendered yet; the directive is parked.
    Waiting,
}

/// State of one render pass.
pub struct RenderContext<'e> {
    engine: &'e Engine,
    domain: Arc<dyn Domain>,
    invoker: Arc<dyn Invoker>,
    options: RenderOptions,
    arena: Arena,
    registry: Registry,
    root: Handle,
    redirect: Mutex<Option<String>>,
}

impl<'e> RenderContext<'e> {
    pub(crate) fn new(
        engine: &'e Engine,
        template: &str,
        domain: Arc<dyn Domain>,
        invoker: Arc<dyn Invoker>,
        options: RenderOptions,
    ) -> Self {
        let arena = Arena::default();
        let registry = Registry::default();
        let root = arena.insert(|handle| {
            Directive::new(handle, None, options.arguments.clone(), Element::single(template))
        });
        registry.register(&root);

        Self {
            engine,
            domain,
            invoker,
            options,
            arena,
            registry,
            root: root.handle(),
            redirect: Mutex::new(None),
        }
    }

    /// The `Single` directive holding the whole template.
    pub fn root(&self) -> Arc<Directive> {
        self.arena.get(self.root)
    }

    pub fn directive(&self, handle: Handle) -> Arc<Directive> {
        self.arena.get(handle)
    }

    pub fn domain(&self) -> &dyn Domain {
        self.domain.as_ref()
    }

    pub fn invoker(&self) -> &dyn Invoker {
        self.invoker.as_ref()
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Number of directives created so far in this pass.
    pub fn directive_count(&self) -> usize {
        self.arena.len()
    }

    /// Directive registered under `unique_id`.
    pub fn get_by_unique_id(&self, unique_id: &str) -> Option<Arc<Directive>> {
        self.registry
            .get_by_unique_id(unique_id)
            .map(|handle| self.directive(handle))
    }

    /// Every directive registered under an author-given id.
    pub fn get_by_directive_id(&self, directive_id: &str) -> Vec<Arc<Directive>> {
        self.registry
            .get_by_directive_id(directive_id)
            .into_iter()
            .map(|handle| self.directive(handle))
            .collect()
    }

    /// Render the pass.
    ///
    /// With update blocks requested, the root is parsed, the last requested
    /// block is located with [`find`](Self::find) and becomes the root's only
    /// child. A missing block yields empty output.
    pub fn process(&self) {
        let root = self.root();
        if let Some(block_id) = self.options.update_blocks.last() {
            match self.find(block_id) {
                Ok(Some(found)) => {
                    root.element()
                        .replace_children(DirectiveCollection::new(root.handle(), vec![found.handle()]));
                }
                Ok(None) => {
                    tracing::warn!(block = %block_id, "Update block not found");
                    root.deliver(Status::Rendered, String::new());
                    return;
                }
                Err(error) => {
                    self.fail(&root, None, &error);
                    return;
                }
            }
        }
        self.render_isolated(&root, None, None);
    }

    /// Result of the pass so far.
    pub fn output(&self) -> RenderOutput {
        RenderOutput {
            text: self.root().result(),
            has_inline_error: self.arena.any_inline_error(),
            redirect: self.redirect(),
        }
    }

    pub fn into_output(self) -> RenderOutput {
        self.output()
    }

    pub fn redirect(&self) -> Option<String> {
        self.redirect.lock().unwrap().clone()
    }

    /// Record a redirect order. The first one wins.
    pub(crate) fn set_redirect(&self, location: String) {
        let mut redirect = self.redirect.lock().unwrap();
        if redirect.is_none() {
            tracing::info!(location = %location, "Redirect requested");
            *redirect = Some(location);
        }
    }

    /// Locate a searchable directive by its author-given id.
    ///
    /// Descends through every container, parsing on demand. Controls and
    /// permission blocks have no children until they select a branch, so
    /// they select (and invoke their binds) on the way down.
    pub fn find(&self, directive_id: &str) -> Result<Option<Arc<Directive>>, RenderError> {
        let root = self.root();
        self.find_below(&root, directive_id)
    }

    fn find_below(
        &self,
        directive: &Arc<Directive>,
        directive_id: &str,
    ) -> Result<Option<Arc<Directive>>, RenderError> {
        directive.element().prepare(self, directive, None)?;
        let Some(children) = directive.element().children() else {
            return Ok(None);
        };

        for handle in children.handles() {
            let child = self.directive(*handle);
            if child.searchable() && child.directive_id() == Some(directive_id) {
                return Ok(Some(child));
            }
            if child.element().has_children()
                && let Some(found) = self.find_below(&child, directive_id)?
            {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    pub(crate) fn pool(&self) -> &rayon::ThreadPool {
        self.engine.pool()
    }

    pub(crate) fn fragments(&self) -> &FragmentCache {
        self.engine.fragments()
    }

    pub(crate) fn content_parts(
        &self,
        tag_id: &str,
        body: &str,
        special: bool,
    ) -> Result<Arc<ContentParts>, RenderError> {
        self.engine.content_parts().get_or_split(tag_id, body, special)
    }

    /// Create and register a directive.
    pub(crate) fn create(
        &self,
        parent: Option<Handle>,
        arguments: Arguments,
        element: Element,
    ) -> Arc<Directive> {
        let directive = self
            .arena
            .insert(|handle| Directive::new(handle, parent, arguments, element));
        self.registry.register(&directive);
        directive
    }

    /// Parse raw template text into a collection owned by `owner`.
    pub(crate) fn request_parsing(
        &self,
        raw: &str,
        scope: &Arguments,
        owner: &Directive,
    ) -> Result<DirectiveCollection, RenderError> {
        let tokens = grammar::tokenize(raw)?;
        let items = tokens
            .into_iter()
            .map(|token| {
                self.create(Some(owner.handle()), scope.clone(), Element::from_token(token))
                    .handle()
            })
            .collect();
        Ok(DirectiveCollection::new(owner.handle(), items))
    }

    pub(crate) fn parent_of(&self, directive: &Directive) -> Option<Arc<Directive>> {
        directive.parent().map(|handle| self.directive(handle))
    }

    /// Nearest ancestor that is not a renderless wrapper.
    fn scope_parent(&self, directive: &Directive) -> Option<Arc<Directive>> {
        let mut parent = self.parent_of(directive)?;
        while parent.kind() == DirectiveType::Renderless {
            match self.parent_of(&parent) {
                Some(next) => parent = next,
                None => break,
            }
        }
        Some(parent)
    }

    /// Replace a directive's scope with a copy of its parent's.
    pub(crate) fn inherit_arguments(&self, directive: &Directive) {
        if let Some(parent) = self.parent_of(directive) {
            directive.set_arguments(parent.arguments());
        }
    }

    /// Directive whose scope a leveled directive resolves against.
    ///
    /// Walks `level` parent links, not counting renderless wrappers. Without
    /// the inclusive flag the scope is that of the leveled directive's parent.
    pub(crate) fn leveled(&self, directive: &Directive, leveling: Leveling) -> Arc<Directive> {
        let mut current = self.directive(directive.handle());
        for _ in 0..leveling.level {
            let Some(parent) = self.scope_parent(&current) else {
                break;
            };
            current = parent;
        }

        if leveling.inclusive {
            return current;
        }
        self.parent_of(&current).unwrap_or(current)
    }

    /// Decide whether a bound directive may render for `requester`.
    ///
    /// The requester satisfies the binding when it is a registered directive
    /// whose author-given id equals `bound`. Otherwise the directive parks on
    /// the target's scheduler, once, and waits to be re-rendered.
    pub(crate) fn requester_for(
        &self,
        directive: &Directive,
        bound: Option<&str>,
        requester: Option<&str>,
        queued: &AtomicBool,
    ) -> Requester {
        let Some(bound) = bound else {
            return Requester::Ready(requester.map(str::to_owned));
        };

        if let Some(requester) = requester
            && let Some(handle) = self.registry.get_by_unique_id(requester)
            && self.directive(handle).directive_id() == Some(bound)
        {
            return Requester::Ready(Some(requester.to_owned()));
        }

        if queued.swap(true, Ordering::AcqRel) {
            if directive.status() == Status::None {
                directive.set_parked(true);
            }
            return Requester::Waiting;
        }

        directive.set_parked(true);
        match self.registry.wait_for(&self.arena, bound, directive.handle()) {
            Wait::Parked => {
                tracing::debug!(directive = %directive.unique_id(), bound = %bound, "Waiting for bound directive");
                Requester::Waiting
            }
            Wait::Ready(target) => {
                directive.set_parked(false);
                Requester::Ready(Some(self.directive(target).unique_id().to_owned()))
            }
        }
    }

    /// Evaluate a query expression in `holder`'s scope.
    ///
    /// | query     | value                                   |
    /// |-----------|-----------------------------------------|
    /// | `=text`   | the literal text                        |
    /// | `#name`   | `name` one ancestor up per `#`          |
    /// | `^name` … | domain variable (`^ - + * ~ @`)        |
    /// | `$…$`     | rendered output of the nested directive |
    /// | `name`    | `name` in the holder's scope            |
    pub(crate) fn resolve_query(
        &self,
        holder: &Directive,
        query: &str,
        requester: Option<&str>,
    ) -> Result<String, RenderError> {
        let Some(first) = query.chars().next() else {
            return Ok(String::new());
        };

        match first {
            '=' => Ok(query[1..].to_owned()),
            '#' => {
                let depth = query.chars().take_while(|c| *c == '#').count();
                let name = &query[depth..];
                let mut scope = self.directive(holder.handle());
                for _ in 0..depth {
                    let Some(parent) = self.scope_parent(&scope) else {
                        break;
                    };
                    scope = parent;
                }
                Ok(scope.argument(name).unwrap_or_default())
            }
            '^' | '-' | '+' | '*' | '~' | '@' => {
                Ok(self.domain.variable(first, &query[1..]).unwrap_or_default())
            }
            '$' => self.render_fragment(holder, query, requester),
            _ => Ok(holder.argument(query).unwrap_or_default()),
        }
    }

    /// Render directive text nested in a parameter, in `holder`'s scope.
    fn render_fragment(
        &self,
        holder: &Directive,
        raw: &str,
        requester: Option<&str>,
    ) -> Result<String, RenderError> {
        let wrapper = self.create(
            Some(holder.handle()),
            holder.arguments(),
            Element::renderless(raw),
        );
        self.render_directive(&wrapper, requester)?;
        Ok(wrapper.result())
    }

    /// Invoke a bind, mapping collaborator failures to [`RenderError::Execution`].
    pub(crate) fn invoke(
        &self,
        directive: &Directive,
        bind: &Bind,
        executer: ExecuterKind,
    ) -> Result<Outcome, RenderError> {
        self.invoker
            .invoke(bind, executer)
            .map_err(|source| RenderError::Execution {
                directive: directive
                    .directive_id()
                    .map_or_else(|| bind.target(), str::to_owned),
                source,
            })
    }

    /// `"{hash_code}/{base64url(bind)}"` handed out by encoded executions.
    pub(crate) fn encode_call(&self, bind: &Bind) -> String {
        format!(
            "{}/{}",
            self.options.hash_code,
            BASE64_URL_SAFE_NO_PAD.encode(bind.to_string())
        )
    }

    /// Render one directive and fire its scheduler once it is Rendered.
    pub(crate) fn render_directive(
        &self,
        directive: &Arc<Directive>,
        requester: Option<&str>,
    ) -> Result<(), RenderError> {
        directive.element().render(self, directive, requester)?;
        if directive.status() == Status::Rendered {
            self.fire(directive);
        }
        Ok(())
    }

    /// Render one directive behind the error boundary.
    ///
    /// Errors and panics are logged, flag `parent` (or the directive itself
    /// when it has none) with an inline error and replace the directive's
    /// output with a diagnostic fragment in debugging mode, or nothing.
    pub(crate) fn render_isolated(
        &self,
        directive: &Arc<Directive>,
        parent: Option<&Directive>,
        requester: Option<&str>,
    ) {
        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.render_directive(directive, requester)
        }))
        .unwrap_or_else(|payload| Err(RenderError::Panic(panic_message(payload.as_ref()))));

        if let Err(error) = outcome {
            self.fail(directive, parent, &error);
        }

        if self.options.analytics {
            tracing::debug!(
                directive = %directive.unique_id(),
                kind = ?directive.kind(),
                status = ?directive.status(),
                elapsed_us = started.elapsed().as_micros(),
                "Directive rendered"
            );
        }
    }

    fn fail(&self, directive: &Arc<Directive>, parent: Option<&Directive>, error: &RenderError) {
        tracing::error!(
            directive = %directive.unique_id(),
            kind = ?directive.kind(),
            error = %error,
            "Directive failed"
        );
        parent.unwrap_or(directive).set_inline_error();

        let text = if self.options.debugging {
            diagnostic_fragment(error)
        } else {
            String::new()
        };
        directive.set_parked(false);
        directive.deliver(Status::Rendered, text);
        self.fire(directive);
    }

    /// Re-render every directive waiting on `target`.
    fn fire(&self, target: &Directive) {
        for waiter in target.scheduler().fire() {
            let waiter = self.directive(waiter);
            if waiter.status() == Status::Rendered {
                tracing::debug!(directive = %waiter.unique_id(), "Skipping abandoned waiter");
                continue;
            }
            waiter.set_parked(false);
            let parent = self.parent_of(&waiter);
            self.render_isolated(&waiter, parent.as_deref(), Some(target.unique_id()));
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}
