//! `$F:…$` executions and `$E:…$` encoded executions.

use std::sync::atomic::AtomicBool;

use super::Capabilities;
use crate::context::Requester;
use crate::grammar::TagHeader;
use crate::{Bind, Directive, DirectiveType, ExecuterKind, Outcome, RenderContext, RenderError, Status};

/// `$F:Exec?Class.Proc,params$` and its encoded form `$E:…$`.
///
/// Parameters resolve in the leveled scope. The encoded form hands out an
/// address for the call instead of invoking it.
pub(crate) struct Execution {
    header: TagHeader,
    bind: String,
    encoded: bool,
    queued: AtomicBool,
}

impl Execution {
    pub fn new(header: TagHeader, bind: &str, encoded: bool) -> Self {
        Self {
            header,
            bind: bind.to_owned(),
            encoded,
            queued: AtomicBool::new(false),
        }
    }
}

impl Capabilities for Execution {
    fn kind(&self) -> DirectiveType {
        if self.encoded {
            DirectiveType::EncodedExecution
        } else {
            DirectiveType::Execution
        }
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
        let Requester::Ready(requester) =
            ctx.requester_for(directive, self.header.bound.as_deref(), requester, &self.queued)
        else {
            return Ok(());
        };
        if !directive.begin() {
            return Ok(());
        }

        let holder = ctx.leveled(directive, self.header.leveling);
        let mut bind = Bind::parse(&self.bind, ctx.options().method)?;
        bind.prepare(|query| ctx.resolve_query(&holder, query, requester.as_deref()))?;

        if self.encoded {
            directive.deliver(Status::Rendered, ctx.encode_call(&bind));
            return Ok(());
        }

        let text = match ctx.invoke(directive, &bind, ExecuterKind::Other)? {
            Outcome::Redirect(location) => {
                ctx.set_redirect(location);
                String::new()
            }
            outcome => outcome.into_text(),
        };
        directive.deliver(Status::Rendered, text);
        Ok(())
    }

    fn can_async(&self) -> bool {
        !self.encoded
    }
}
