use std::sync::{Arc, Mutex};

use super::{Capabilities, Children};
use crate::{
    Access, Bind, Directive, DirectiveCollection, DirectiveType, ExecuterKind, Outcome,
    RenderContext, RenderError,
};

/// `$P:Id:{allowed}:Id:{!MESSAGETEMPLATEforbidden}:Id$`
///
/// Asks the domain's security executable whether `Id` is permitted. Allowed
/// renders the primary part, Forbidden the message template if present.
pub(crate) struct PermissionBlock {
    id: String,
    body: String,
    access: Mutex<Option<Access>>,
    children: Children,
}

impl PermissionBlock {
    pub fn new(id: &str, body: String) -> Self {
        Self {
            id: id.to_owned(),
            body,
            access: Mutex::new(None),
            children: Children::default(),
        }
    }

    fn select(&self, ctx: &RenderContext<'_>, directive: &Directive) -> Result<(), RenderError> {
        let mut access = self.access.lock().unwrap();
        if access.is_some() {
            return Ok(());
        }

        let parts = ctx.content_parts(&self.id, &self.body, false)?;
        let granted = self.ensure_permission(ctx);
        let content = match granted {
            Access::Allowed => parts.part(0),
            Access::Forbidden => parts.message_template(),
        };
        if let Some(content) = content.filter(|content| !content.is_empty()) {
            ctx.inherit_arguments(directive);
            let children = ctx.request_parsing(content, &directive.arguments(), directive)?;
            self.children.replace(children);
        }

        tracing::debug!(permission = %self.id, access = ?granted, "Permission resolved");
        *access = Some(granted);
        Ok(())
    }

    /// Anything but an explicit `Allowed` answer is Forbidden.
    fn ensure_permission(&self, ctx: &RenderContext<'_>) -> Access {
        let Some(executable) = ctx.domain().security_executable() else {
            return Access::Forbidden;
        };

        let mut bind = match Bind::parse(
            &format!("{executable}?EnsurePermission,p1"),
            ctx.options().method,
        ) {
            Ok(bind) => bind.with_instance_execution(true),
            Err(e) => {
                tracing::warn!(permission = %self.id, error = %e, "Invalid security executable");
                return Access::Forbidden;
            }
        };
        if bind.prepare(|_| Ok(self.id.clone())).is_err() {
            return Access::Forbidden;
        }

        match ctx.invoker().invoke(&bind, ExecuterKind::Permission) {
            Ok(Outcome::Permission(access)) => access,
            Ok(_) => Access::Forbidden,
            Err(e) => {
                tracing::warn!(permission = %self.id, error = %e, "Permission check failed");
                Access::Forbidden
            }
        }
    }
}

impl Capabilities for PermissionBlock {
    fn kind(&self) -> DirectiveType {
        DirectiveType::PermissionBlock
    }

    fn directive_id(&self) -> Option<&str> {
        Some(self.id.as_str())
    }

    fn parse(&self, ctx: &RenderContext<'_>, _directive: &Directive) -> Result<(), RenderError> {
        ctx.content_parts(&self.id, &self.body, false)?;
        Ok(())
    }

    fn render(
        &self,
        ctx: &RenderContext<'_>,
        directive: &Directive,
        _requester: Option<&str>,
    ) -> Result<(), RenderError> {
        if !directive.begin() {
            return Ok(());
        }

        self.parse(ctx, directive)?;
        self.select(ctx, directive)?;
        if let Some(children) = self.children.get() {
            children.render(ctx, Some(directive.unique_id()));
        }
        directive.finish();
        Ok(())
    }

    fn prepare(
        &self,
        ctx: &RenderContext<'_>,
        directive: &Directive,
        _requester: Option<&str>,
    ) -> Result<(), RenderError> {
        self.parse(ctx, directive)?;
        self.select(ctx, directive)
    }

    fn children(&self) -> Option<Arc<DirectiveCollection>> {
        self.children.get()
    }

    fn has_children(&self) -> bool {
        true
    }

    fn searchable(&self) -> bool {
        true
    }
}
