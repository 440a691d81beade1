//! Directive rendering engine for Weft templates.
//!
//! A template is plain text with `$…$` directives: argument lookups,
//! controls, bound executions, inline statements, permission gates,
//! translations and grouping blocks. The engine parses a template into a
//! tree of [`Directive`]s and renders the tree, running asynchronous-capable
//! directives concurrently and deferring bound directives until their
//! target has rendered.
//!
//! # Architecture
//!
//! - [`Engine`]: process-scoped; owns the [`ContentPartCache`], the
//!   [`FragmentCache`] and the worker pool
//! - [`RenderContext`]: one pass; owns the directive arena and registry
//! - [`DirectiveCollection`]: ordered children plus the dispatch loop
//! - [`Domain`] / [`Invoker`]: collaborators supplied by the host
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use weft_engine::memory::{MemoryDomain, MemoryInvoker};
//! use weft_engine::{Engine, EngineConfig, Outcome, RenderOptions};
//!
//! let engine = Engine::new(EngineConfig::new()).unwrap();
//! let invoker = MemoryInvoker::new()
//!     .with_handler("App?Greet", |bind| Ok(Outcome::Value(format!("hi {}", bind.values()[0]))));
//!
//! let output = engine.render(
//!     "<p>$F:App?Greet,Name$</p>",
//!     Arc::new(MemoryDomain::new()),
//!     Arc::new(invoker),
//!     RenderOptions::new().with_argument("Name", "Ann"),
//! );
//! assert_eq!(output.text, "<p>hi Ann</p>");
//! assert!(!output.has_inline_error);
//! ```

mod arguments;
mod bind;
mod cache;
mod collaborators;
mod context;
pub mod directive;
mod elements;
mod engine;
mod error;
mod grammar;
pub mod memory;
mod splitter;
mod util;


pub use arguments::Arguments;
pub use bind::{Bind, BindParameter, Method};
pub use cache::{FragmentCache, FragmentKey};
pub use collaborators::{
    Access, Condition, ControlDefinition, Domain, ExecuterKind, Invoker, Message, MessageKind,
    Outcome, Statement,
};
pub use context::RenderContext;
pub use directive::{Directive, DirectiveCollection, DirectiveType, Handle, Scheduler, Status};
pub use engine::{Engine, EngineConfig, RenderOptions, RenderOutput};
pub use error::{BoxError, InvokeError, RenderError};
pub use grammar::{Leveling, TagHeader};
pub use splitter::{ContentPartCache, ContentParts, MESSAGE_TEMPLATE_MARKER};
