//! Leaf kinds: static text, properties and hash-code template paths.

use super::Capabilities;
use crate::{Directive, DirectiveType, RenderContext, RenderError, Status};

/// Literal text between directives.
pub(crate) struct Static {
    text: String,
}

impl Static {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_owned(),
        }
    }
}

impl Capabilities for Static {
    fn kind(&self) -> DirectiveType {
        DirectiveType::Static
    }

    fn parse(&self, _ctx: &RenderContext<'_>, _directive: &Directive) -> Result<(), RenderError> {
        Ok(())
    }

    fn render(
        &self,
        _ctx: &RenderContext<'_>,
        directive: &Directive,
        _requester: Option<&str>,
    ) -> Result<(), RenderError> {
        if directive.begin() {
            directive.deliver(Status::Rendered, self.text.clone());
        }
        Ok(())
    }
}

/// `$name$`, `$=literal$`, `$#name$` and domain variables.
pub(crate) struct Property {
    expression: String,
}

impl Property {
    pub fn new(expression: &str) -> Self {
        Self {
            expression: expression.to_owned(),
        }
    }
}

impl Capabilities for Property {
    fn kind(&self) -> DirectiveType {
        DirectiveType::Property
    }

    fn parse(&self, _ctx: &RenderContext<'_>, _directive: &Directive) -> Result<(), RenderError> {
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
        let value = ctx.resolve_query(directive, &self.expression, requester)?;
        directive.deliver(Status::Rendered, value);
        Ok(())
    }
}

/// `$H:path$`: a template address prefixed with the pass hash code.
pub(crate) struct HashCodePointedTemplate {
    path: String,
}

impl HashCodePointedTemplate {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_owned(),
        }
    }
}

impl Capabilities for HashCodePointedTemplate {
    fn kind(&self) -> DirectiveType {
        DirectiveType::HashCodePointedTemplate
    }

    fn parse(&self, _ctx: &RenderContext<'_>, _directive: &Directive) -> Result<(), RenderError> {
        Ok(())
    }

    fn render(
        &self,
        ctx: &RenderContext<'_>,
        directive: &Directive,
        _requester: Option<&str>,
    ) -> Result<(), RenderError> {
        if directive.begin() {
            let address = format!("{}/{}", ctx.options().hash_code, self.path);
            directive.deliver(Status::Rendered, address);
        }
        Ok(())
    }
}
