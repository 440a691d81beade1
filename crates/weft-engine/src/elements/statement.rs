//! `$S:Id:{…}:Id$` inline statements.
//!
//! The block renders its children into statement code, which the invoker
//! executes. A leading control line starting with `!` may carry `!NOCACHE`
//! and `!PARAMS(p1|p2)`.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use super::{Capabilities, Children};
use crate::context::Requester;
use crate::{
    Directive, DirectiveCollection, DirectiveType, Outcome, RenderContext, RenderError, Statement,
    Status,
};

const NO_CACHE: &str = "!NOCACHE";
const PARAMS: &str = "!PARAMS(";

/// Statement code with its control line interpreted.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct SubDirectives {
    pub cache: bool,
    /// Raw pipe-separated parameter queries from `!PARAMS(...)`.
    pub parameters: Option<String>,
    pub code: String,
}

impl SubDirectives {
    pub fn extract(block: &str) -> Result<Self, RenderError> {
        let mut cache = true;
        let mut parameters = None;

        if !block.starts_with('!') {
            return Ok(Self {
                cache,
                parameters,
                code: block.trim().to_owned(),
            });
        }

        let (line, rest) = block.split_once('\n').unwrap_or((block, ""));
        let mut line = line.trim_end_matches('\r').to_owned();

        if line.contains(NO_CACHE) {
            cache = false;
            line = line.replace(NO_CACHE, "");
        }
        if let Some(open) = line.find(PARAMS) {
            let close = line[open..]
                .find(')')
                .map(|offset| open + offset)
                .ok_or_else(|| {
                    RenderError::Parse(format!("`{PARAMS}` is not closed in `{}`", line.trim()))
                })?;
            parameters = Some(line[open + PARAMS.len()..close].to_owned());
            line.replace_range(open..=close, "");
        }

        let preserved = line.trim();
        let rest = rest.trim();
        let code = match (preserved.is_empty(), rest.is_empty()) {
            (true, _) => rest.to_owned(),
            (false, true) => preserved.to_owned(),
            (false, false) => format!("{preserved}\n{rest}"),
        };

        Ok(Self {
            cache,
            parameters,
            code,
        })
    }
}

pub(crate) struct InlineStatement {
    id: String,
    bound: Option<String>,
    body: String,
    queued: AtomicBool,
    children: Children,
}

impl InlineStatement {
    pub fn new(id: &str, bound: Option<String>, body: String) -> Self {
        Self {
            id: id.to_owned(),
            bound,
            body,
            queued: AtomicBool::new(false),
            children: Children::default(),
        }
    }
}

impl Capabilities for InlineStatement {
    fn kind(&self) -> DirectiveType {
        DirectiveType::InlineStatement
    }

    fn directive_id(&self) -> Option<&str> {
        Some(self.id.as_str())
    }

    fn parse(&self, ctx: &RenderContext<'_>, directive: &Directive) -> Result<(), RenderError> {
        self.children.get_or_parse(|| {
            ctx.inherit_arguments(directive);
            let parts = ctx.content_parts(&self.id, &self.body, false)?;
            let code = parts
                .part(0)
                .ok_or_else(|| RenderError::EmptyBlock(self.id.clone()))?;
            ctx.request_parsing(code, &directive.arguments(), directive)
        })?;
        Ok(())
    }

    fn render(
        &self,
        ctx: &RenderContext<'_>,
        directive: &Directive,
        requester: Option<&str>,
    ) -> Result<(), RenderError> {
        let Requester::Ready(requester) =
            ctx.requester_for(directive, self.bound.as_deref(), requester, &self.queued)
        else {
            return Ok(());
        };
        if !directive.begin() {
            return Ok(());
        }

        self.parse(ctx, directive)?;
        if let Some(children) = self.children.get() {
            children.render(ctx, Some(directive.unique_id()));
        }

        let sub = SubDirectives::extract(&directive.result())?;
        if !sub.cache && sub.code.is_empty() {
            return Err(RenderError::EmptyBlock(self.id.clone()));
        }
        let parameters = sub
            .parameters
            .as_deref()
            .map(|queries| {
                queries
                    .split('|')
                    .map(|query| ctx.resolve_query(directive, query, requester.as_deref()))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        let statement = Statement {
            id: &self.id,
            code: &sub.code,
            parameters: parameters.as_deref(),
            cache: sub.cache,
        };
        let outcome = ctx
            .invoker()
            .execute_statement(&statement)
            .map_err(|source| RenderError::Execution {
                directive: self.id.clone(),
                source,
            })?;

        let text = match outcome {
            Outcome::Redirect(location) => {
                ctx.set_redirect(location);
                String::new()
            }
            outcome => outcome.into_text(),
        };
        directive.deliver(Status::Rendered, text);
        Ok(())
    }

    fn children(&self) -> Option<Arc<DirectiveCollection>> {
        self.children.get()
    }

    fn has_children(&self) -> bool {
        true
    }
}
