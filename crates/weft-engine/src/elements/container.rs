//! Kinds whose output is the concatenation of their children.

use std::borrow::Cow;
use std::sync::Arc;

use super::{Capabilities, Children};
use crate::cache::FragmentKey;
use crate::{Directive, DirectiveCollection, DirectiveType, RenderContext, RenderError, Status};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ContainerKind {
    /// Root of a pass.
    Single,
    /// Synthetic wrapper; transparent to leveling.
    Renderless,
    /// `$T:path$`
    Template,
    /// `$MB:{…}:MB$`
    MessageBlock,
    /// `$PC:{…}:PC$`
    PartialCache,
    /// `$AG:{…}:AG$`
    AsyncGroup,
    /// `$U:id:{…}:id$`
    UpdateBlock,
}

enum Source {
    Inline(String),
    Template(String),
    Block { id: String, body: String },
}

pub(crate) struct Container {
    kind: ContainerKind,
    source: Source,
    children: Children,
}

impl Container {
    pub fn inline(kind: ContainerKind, content: &str) -> Self {
        Self::with_source(kind, Source::Inline(content.to_owned()))
    }

    pub fn template(path: &str) -> Self {
        Self::with_source(ContainerKind::Template, Source::Template(path.to_owned()))
    }

    pub fn block(kind: ContainerKind, id: &str, body: String) -> Self {
        Self::with_source(
            kind,
            Source::Block {
                id: id.to_owned(),
                body,
            },
        )
    }

    fn with_source(kind: ContainerKind, source: Source) -> Self {
        Self {
            kind,
            source,
            children: Children::default(),
        }
    }

    pub fn replace_children(&self, children: DirectiveCollection) {
        self.children.replace(children);
    }

    /// Special tags trim their content parts.
    fn special(&self) -> bool {
        matches!(
            self.kind,
            ContainerKind::MessageBlock | ContainerKind::PartialCache | ContainerKind::AsyncGroup
        )
    }

    fn inherits_scope(&self) -> bool {
        matches!(
            self.kind,
            ContainerKind::Template | ContainerKind::AsyncGroup | ContainerKind::UpdateBlock
        )
    }

    fn content(&self, ctx: &RenderContext<'_>) -> Result<Cow<'_, str>, RenderError> {
        match &self.source {
            Source::Inline(content) => Ok(Cow::Borrowed(content.as_str())),
            Source::Template(path) => ctx
                .domain()
                .template(path)
                .map(Cow::Owned)
                .ok_or_else(|| RenderError::Configuration(format!("template `{path}` not found"))),
            Source::Block { id, body } => {
                let parts = ctx.content_parts(id, body, self.special())?;
                parts
                    .part(0)
                    .map(|part| Cow::Owned(part.to_owned()))
                    .ok_or_else(|| RenderError::EmptyBlock(id.clone()))
            }
        }
    }

    fn fragment_key(&self) -> Option<FragmentKey<'_>> {
        match (&self.kind, &self.source) {
            (ContainerKind::PartialCache, Source::Block { body, .. }) => Some(FragmentKey {
                scope: "",
                content: body.as_str(),
            }),
            _ => None,
        }
    }
}

impl Capabilities for Container {
    fn kind(&self) -> DirectiveType {
        match self.kind {
            ContainerKind::Single => DirectiveType::Single,
            ContainerKind::Renderless => DirectiveType::Renderless,
            ContainerKind::Template => DirectiveType::Template,
            ContainerKind::MessageBlock => DirectiveType::MessageBlock,
            ContainerKind::PartialCache => DirectiveType::PartialCache,
            ContainerKind::AsyncGroup => DirectiveType::AsyncGroup,
            ContainerKind::UpdateBlock => DirectiveType::UpdateBlock,
        }
    }

    fn directive_id(&self) -> Option<&str> {
        match (&self.kind, &self.source) {
            (ContainerKind::Template, Source::Template(path)) => Some(path.as_str()),
            (ContainerKind::UpdateBlock, Source::Block { id, .. }) => Some(id.as_str()),
            _ => None,
        }
    }

    fn parse(&self, ctx: &RenderContext<'_>, directive: &Directive) -> Result<(), RenderError> {
        self.children.get_or_parse(|| {
            let content = self.content(ctx)?;
            if self.inherits_scope() {
                ctx.inherit_arguments(directive);
            }
            if self.kind == ContainerKind::MessageBlock
                && let Some(message) = &ctx.options().message
            {
                let mut scope = directive.arguments();
                scope.set("MessageType", message.kind.to_string());
                scope.set("Message", message.content.as_str());
                directive.set_arguments(scope);
            }
            ctx.request_parsing(&content, &directive.arguments(), directive)
        })?;
        Ok(())
    }

    fn render(
        &self,
        ctx: &RenderContext<'_>,
        directive: &Directive,
        requester: Option<&str>,
    ) -> Result<(), RenderError> {
        if !directive.begin() {
            return Ok(());
        }

        let cache_scope = ctx.options().cache_scope.as_str();
        let key = self.fragment_key().map(|key| FragmentKey {
            scope: cache_scope,
            ..key
        });
        if let Some(key) = &key
            && let Some(fragment) = ctx.fragments().get(key)
        {
            tracing::debug!(directive = %directive.unique_id(), "Partial cache hit");
            directive.deliver(Status::Rendered, fragment);
            return Ok(());
        }

        self.parse(ctx, directive)?;
        let requester = match self.kind {
            ContainerKind::Renderless => requester,
            _ => Some(directive.unique_id()),
        };
        if let Some(children) = self.children.get() {
            children.render(ctx, requester);
        }

        match (&self.kind, &self.source) {
            (ContainerKind::UpdateBlock, Source::Block { id, .. }) => {
                let inner = directive.result();
                directive.deliver(Status::Rendered, format!("<div id=\"{id}\">{inner}</div>"));
            }
            (ContainerKind::PartialCache, _) => {
                let fragment = directive.result();
                if let Some(key) = &key
                    && !directive.has_inline_error()
                {
                    ctx.fragments().set(key, fragment.clone());
                }
                directive.deliver(Status::Rendered, fragment);
            }
            _ => directive.finish(),
        }
        Ok(())
    }

    fn children(&self) -> Option<Arc<DirectiveCollection>> {
        self.children.get()
    }

    fn has_children(&self) -> bool {
        true
    }

    fn searchable(&self) -> bool {
        matches!(self.kind, ContainerKind::Template | ContainerKind::UpdateBlock)
    }

    fn can_async(&self) -> bool {
        self.kind == ContainerKind::AsyncGroup
    }
}
