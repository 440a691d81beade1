//! Process-scoped engine state and the render entry point.

use std::sync::Arc;

use crate::cache::FragmentCache;
use crate::splitter::ContentPartCache;
use crate::{Arguments, Domain, Invoker, Message, Method, RenderContext, RenderError};

/// Engine construction settings.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Worker threads for asynchronous directives. `0` uses rayon's default.
    pub worker_threads: usize,
    /// Whether `$PC:{…}:PC$` blocks are cached across passes.
    ///
    /// Default: true
    pub partial_cache: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            worker_threads: 0,
            partial_cache: true,
        }
    }

    #[must_use]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    #[must_use]
    pub fn with_partial_cache(mut self, enabled: bool) -> Self {
        self.partial_cache = enabled;
        self
    }
}

/// Per-pass render settings.
#[derive(Clone, Debug, Default)]
pub struct RenderOptions {
    /// Emit diagnostic fragments for failed directives instead of nothing.
    pub debugging: bool,
    /// Log per-directive render timings at `debug` level.
    pub analytics: bool,
    pub method: Method,
    /// Message exposed to `$MB:{…}:MB$` blocks.
    pub message: Option<Message>,
    /// Update-block ids requested for partial rendering; the last one wins.
    pub update_blocks: Vec<String>,
    /// Prefix for hash-code pointed templates and encoded executions.
    pub hash_code: String,
    /// Scope mixed into partial-cache keys.
    pub cache_scope: String,
    /// Root argument scope.
    pub arguments: Arguments,
}

impl RenderOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_debugging(mut self, debugging: bool) -> Self {
        self.debugging = debugging;
        self
    }

    #[must_use]
    pub fn with_analytics(mut self, analytics: bool) -> Self {
        self.analytics = analytics;
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: Message) -> Self {
        self.message = Some(message);
        self
    }

    #[must_use]
    pub fn with_update_block(mut self, id: impl Into<String>) -> Self {
        self.update_blocks.push(id.into());
        self
    }

    #[must_use]
    pub fn with_hash_code(mut self, hash_code: impl Into<String>) -> Self {
        self.hash_code = hash_code.into();
        self
    }

    #[must_use]
    pub fn with_cache_scope(mut self, scope: impl Into<String>) -> Self {
        self.cache_scope = scope.into();
        self
    }

    #[must_use]
    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.arguments.set(key, value);
        self
    }
}

/// Result of one render pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderOutput {
    pub text: String,
    /// Whether any directive failed during the pass.
    pub has_inline_error: bool,
    /// Location of the first redirect order, if any.
    pub redirect: Option<String>,
}

/// Process-scoped rendering engine.
///
/// Owns the content-part cache, the partial-cache store and the worker pool
/// shared by every render pass.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use weft_engine::memory::{MemoryDomain, MemoryInvoker};
/// use weft_engine::{Engine, EngineConfig, RenderOptions};
///
/// let engine = Engine::new(EngineConfig::new().with_worker_threads(2)).unwrap();
/// let domain = Arc::new(MemoryDomain::new().with_translation("Hi", "Hello"));
/// let output = engine.render(
///     "$L:Hi$, $Name$!",
///     domain,
///     Arc::new(MemoryInvoker::new()),
///     RenderOptions::new().with_argument("Name", "Ann"),
/// );
/// assert_eq!(output.text, "Hello, Ann!");
/// ```
pub struct Engine {
    parts: ContentPartCache,
    fragments: FragmentCache,
    pool: rayon::ThreadPool,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, RenderError> {
        let mut builder =
            rayon::ThreadPoolBuilder::new().thread_name(|index| format!("weft-worker-{index}"));
        if config.worker_threads > 0 {
            builder = builder.num_threads(config.worker_threads);
        }
        let pool = builder.build().map_err(|e| {
            RenderError::Configuration(format!("failed to build worker pool: {e}"))
        })?;

        Ok(Self {
            parts: ContentPartCache::new(),
            fragments: if config.partial_cache {
                FragmentCache::new()
            } else {
                FragmentCache::disabled()
            },
            pool,
        })
    }

    /// Render a template in a fresh pass.
    pub fn render(
        &self,
        template: &str,
        domain: Arc<dyn Domain>,
        invoker: Arc<dyn Invoker>,
        options: RenderOptions,
    ) -> RenderOutput {
        let context = RenderContext::new(self, template, domain, invoker, options);
        context.process();
        context.into_output()
    }

    /// Start a pass without rendering it, for callers that need
    /// [`RenderContext::find`].
    pub fn context(
        &self,
        template: &str,
        domain: Arc<dyn Domain>,
        invoker: Arc<dyn Invoker>,
        options: RenderOptions,
    ) -> RenderContext<'_> {
        RenderContext::new(self, template, domain, invoker, options)
    }

    pub fn content_parts(&self) -> &ContentPartCache {
        &self.parts
    }

    pub fn fragments(&self) -> &FragmentCache {
        &self.fragments
    }

    pub(crate) fn pool(&self) -> &rayon::ThreadPool {
        &self.pool
    }

    /// Number of worker threads.
    pub fn worker_threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}
