//! Concrete directive kinds.
//!
//! Each kind implements [`Capabilities`]: `parse` builds children without
//! external side effects, `render` performs effectful calls and delivers the
//! final result. [`Element`] is the closed set dispatched by the engine.

mod container;
mod control;
mod execution;
mod permission;
mod statement;
mod text;
mod translation;

use std::sync::{Arc, Mutex};

pub(crate) use container::{Container, ContainerKind};
pub(crate) use control::Control;
pub(crate) use execution::Execution;
pub(crate) use permission::PermissionBlock;
pub(crate) use statement::InlineStatement;
pub(crate) use text::{HashCodePointedTemplate, Property, Static};
pub(crate) use translation::{FormattableTranslation, Translation};

use crate::grammar::{Token, TokenKind};
use crate::{Directive, DirectiveCollection, DirectiveType, RenderContext, RenderError};

/// Behavior shared by every directive kind.
pub(crate) trait Capabilities {
    fn kind(&self) -> DirectiveType;

    /// Author-given id, for registry lookups and bound targets.
    fn directive_id(&self) -> Option<&str> {
        None
    }

    fn parse(&self, ctx: &RenderContext<'_>, directive: &Directive) -> Result<(), RenderError>;

    fn render(
        &self,
        ctx: &RenderContext<'_>,
        directive: &Directive,
        requester: Option<&str>,
    ) -> Result<(), RenderError>;

    /// Make children available for lookup. Selector kinds choose their
    /// branch here.
    fn prepare(
        &self,
        ctx: &RenderContext<'_>,
        directive: &Directive,
        _requester: Option<&str>,
    ) -> Result<(), RenderError> {
        self.parse(ctx, directive)
    }

    fn children(&self) -> Option<Arc<DirectiveCollection>> {
        None
    }

    fn has_children(&self) -> bool {
        false
    }

    fn searchable(&self) -> bool {
        false
    }

    fn can_async(&self) -> bool {
        false
    }
}

/// Lazily built child collection.
#[derive(Debug, Default)]
pub(crate) struct Children {
    slot: Mutex<Option<Arc<DirectiveCollection>>>,
}

impl Children {
    pub fn get(&self) -> Option<Arc<DirectiveCollection>> {
        self.slot.lock().unwrap().as_ref().map(Arc::clone)
    }

    /// Return the collection, building it with `parse` on first use.
    pub fn get_or_parse(
        &self,
        parse: impl FnOnce() -> Result<DirectiveCollection, RenderError>,
    ) -> Result<Arc<DirectiveCollection>, RenderError> {
        let mut slot = self.slot.lock().unwrap();
        if let Some(children) = slot.as_ref() {
            return Ok(Arc::clone(children));
        }
        let children = Arc::new(parse()?);
        *slot = Some(Arc::clone(&children));
        Ok(children)
    }

    pub fn replace(&self, children: DirectiveCollection) {
        *self.slot.lock().unwrap() = Some(Arc::new(children));
    }
}

/// Closed set of directive kinds.
pub(crate) enum Element {
    Static(Static),
    Property(Property),
    Container(Container),
    Control(Control),
    Execution(Execution),
    InlineStatement(InlineStatement),
    PermissionBlock(PermissionBlock),
    Translation(Translation),
    FormattableTranslation(FormattableTranslation),
    HashCodePointedTemplate(HashCodePointedTemplate),
}

impl Element {
    pub fn single(content: &str) -> Self {
        Self::Container(Container::inline(ContainerKind::Single, content))
    }

    pub fn renderless(content: &str) -> Self {
        Self::Container(Container::inline(ContainerKind::Renderless, content))
    }

    #[cfg(test)]
    pub fn translation(id: &str) -> Self {
        Self::Translation(Translation::new(id))
    }

    /// Build the element for one grammar token.
    ///
    /// Unknown type letters and special tags are kept as static text.
    pub fn from_token(token: Token<'_>) -> Self {
        match token.kind {
            TokenKind::Text => Self::Static(Static::new(token.raw)),
            TokenKind::Variable(expression) => Self::Property(Property::new(expression)),
            TokenKind::Tag { letter, header, id } => match letter {
                'C' => Self::Control(Control::new(id, header, Vec::new(), None)),
                'L' => Self::Translation(Translation::new(id)),
                'T' => Self::Container(Container::template(id)),
                'H' => Self::HashCodePointedTemplate(HashCodePointedTemplate::new(id)),
                _ => Self::unknown(token.raw),
            },
            TokenKind::Procedure { letter, header, bind } => match letter {
                'F' => Self::Execution(Execution::new(header, bind, false)),
                'E' => Self::Execution(Execution::new(header, bind, true)),
                _ => Self::unknown(token.raw),
            },
            TokenKind::Block(block) => {
                let body = block.body();
                match (block.letter, block.id) {
                    (None, "MB") => Self::Container(Container::block(ContainerKind::MessageBlock, "MB", body)),
                    (None, "PC") => Self::Container(Container::block(ContainerKind::PartialCache, "PC", body)),
                    (None, "AG") => Self::Container(Container::block(ContainerKind::AsyncGroup, "AG", body)),
                    (Some('C'), id) => {
                        Self::Control(Control::new(id, block.header, block.parameters, Some(body)))
                    }
                    (Some('L'), id) => Self::FormattableTranslation(FormattableTranslation::new(id, body)),
                    (Some('S'), id) => {
                        Self::InlineStatement(InlineStatement::new(id, block.header.bound, body))
                    }
                    (Some('P'), id) => Self::PermissionBlock(PermissionBlock::new(id, body)),
                    (Some('U'), id) => Self::Container(Container::block(ContainerKind::UpdateBlock, id, body)),
                    _ => Self::unknown(token.raw),
                }
            }
        }
    }

    fn unknown(raw: &str) -> Self {
        tracing::warn!(directive = raw, "Unknown directive kept as text");
        Self::Static(Static::new(raw))
    }

    fn inner(&self) -> &dyn Capabilities {
        match self {
            Self::Static(element) => element,
            Self::Property(element) => element,
            Self::Container(element) => element,
            Self::Control(element) => element,
            Self::Execution(element) => element,
            Self::InlineStatement(element) => element,
            Self::PermissionBlock(element) => element,
            Self::Translation(element) => element,
            Self::FormattableTranslation(element) => element,
            Self::HashCodePointedTemplate(element) => element,
        }
    }

    pub fn kind(&self) -> DirectiveType {
        self.inner().kind()
    }

    pub fn directive_id(&self) -> Option<&str> {
        self.inner().directive_id()
    }

    pub fn render(
        &self,
        ctx: &RenderContext<'_>,
        directive: &Directive,
        requester: Option<&str>,
    ) -> Result<(), RenderError> {
        self.inner().render(ctx, directive, requester)
    }

    pub fn prepare(
        &self,
        ctx: &RenderContext<'_>,
        directive: &Directive,
        requester: Option<&str>,
    ) -> Result<(), RenderError> {
        self.inner().prepare(ctx, directive, requester)
    }

    pub fn children(&self) -> Option<Arc<DirectiveCollection>> {
        self.inner().children()
    }

    pub fn has_children(&self) -> bool {
        self.inner().has_children()
    }

    pub fn searchable(&self) -> bool {
        self.inner().searchable()
    }

    pub fn can_async(&self) -> bool {
        self.inner().can_async()
    }

    /// Swap in a new child collection (update-block rendering).
    pub fn replace_children(&self, children: DirectiveCollection) {
        if let Self::Container(container) = self {
            container.replace_children(children);
        }
    }
}
