//! `$C:Id$` and `$C:Id(params):{…}:Id:{…}:Id$` controls.
//!
//! A control's behavior comes from the domain's [`ControlDefinition`]:
//! conditional statements pick part 0 or 1 from a tri-state bind result,
//! variable blocks render part 0 with variables returned by their bind.
//! The chosen part renders inside a renderless wrapper, and the choice is
//! made at most once per pass.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, LazyLock, Mutex};

use regex::Regex;

use super::{Capabilities, Children, Element};
use crate::context::Requester;
use crate::grammar::TagHeader;
use crate::{
    Arguments, Bind, Condition, ControlDefinition, Directive, DirectiveCollection, DirectiveType,
    ExecuterKind, Outcome, RenderContext, RenderError,
};

/// `{N}`: a pointer into the control's own parameter list.
static PARAMETER_POINTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{([0-9]+)\}$").unwrap());

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Selection {
    Part(usize),
    Nothing,
}

pub(crate) struct Control {
    id: String,
    header: TagHeader,
    parameters: Vec<String>,
    body: Option<String>,
    queued: AtomicBool,
    selection: Mutex<Option<Selection>>,
    children: Children,
}

impl Control {
    pub fn new(id: &str, header: TagHeader, parameters: Vec<String>, body: Option<String>) -> Self {
        Self {
            id: id.to_owned(),
            header,
            parameters,
            body,
            queued: AtomicBool::new(false),
            selection: Mutex::new(None),
            children: Children::default(),
        }
    }

    /// Replace a `{N}` pointer with the control's N-th parameter.
    fn dereference<'a>(&'a self, query: &'a str) -> Result<&'a str, RenderError> {
        let Some(caps) = PARAMETER_POINTER.captures(query) else {
            return Ok(query);
        };
        let index = caps[1].parse().unwrap_or(usize::MAX);
        self.parameters
            .get(index)
            .map(String::as_str)
            .ok_or(RenderError::FormatIndexOutOfRange {
                index,
                count: self.parameters.len(),
            })
    }

    /// Invoke the definition's bind and pick a part, once.
    fn select(
        &self,
        ctx: &RenderContext<'_>,
        directive: &Directive,
        requester: Option<&str>,
    ) -> Result<(), RenderError> {
        let mut selection = self.selection.lock().unwrap();
        if selection.is_some() {
            return Ok(());
        }

        let Some(definition) = ctx.domain().control(&self.id) else {
            tracing::warn!(control = %self.id, "Unknown control");
            *selection = Some(Selection::Nothing);
            return Ok(());
        };
        let parts = match &self.body {
            Some(body) => Some(ctx.content_parts(&self.id, body, false)?),
            None => None,
        };

        let bind = definition.bind().ok_or_else(|| {
            RenderError::Configuration(format!("control `{}` has no bind", self.id))
        })?;
        let mut bind = Bind::parse(bind, ctx.options().method)?;
        let holder = ctx.leveled(directive, self.header.leveling);
        bind.prepare(|query| ctx.resolve_query(&holder, self.dereference(query)?, requester))?;
        let outcome = ctx.invoke(directive, &bind, ExecuterKind::Control)?;

        let (chosen, variables) = match (&definition, outcome) {
            (ControlDefinition::ConditionalStatement { .. }, Outcome::Conditional(condition)) => {
                match condition {
                    Condition::True => (Some(0), None),
                    Condition::False => (Some(1), None),
                    Condition::Unknown => (None, None),
                }
            }
            (ControlDefinition::ConditionalStatement { .. }, other) => {
                tracing::warn!(control = %self.id, outcome = ?other, "Conditional bind returned no condition");
                (None, None)
            }
            (ControlDefinition::VariableBlock { .. }, Outcome::Variables(variables)) => {
                (Some(0), Some(variables))
            }
            (ControlDefinition::VariableBlock { .. }, _) => (Some(0), None),
        };

        let content = chosen.and_then(|index| {
            parts
                .as_ref()
                .and_then(|parts| parts.part(index))
                .map(|content| (index, content))
        });
        *selection = Some(match content {
            Some((index, content)) => {
                let mut scope: Arguments = directive.arguments();
                if let Some(variables) = variables {
                    scope.extend(&variables);
                }
                let wrapper = ctx.create(Some(directive.handle()), scope, Element::renderless(content));
                self.children
                    .replace(DirectiveCollection::new(directive.handle(), vec![wrapper.handle()]));
                Selection::Part(index)
            }
            None => Selection::Nothing,
        });
        Ok(())
    }
}

impl Capabilities for Control {
    fn kind(&self) -> DirectiveType {
        DirectiveType::Control
    }

    fn directive_id(&self) -> Option<&str> {
        Some(self.id.as_str())
    }

    /// Validates the content parts. Children exist only after selection.
    fn parse(&self, ctx: &RenderContext<'_>, _directive: &Directive) -> Result<(), RenderError> {
        if let Some(body) = &self.body {
            ctx.content_parts(&self.id, body, false)?;
        }
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

        self.parse(ctx, directive)?;
        self.select(ctx, directive, requester.as_deref())?;
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
        requester: Option<&str>,
    ) -> Result<(), RenderError> {
        self.parse(ctx, directive)?;
        self.select(ctx, directive, requester)
    }

    fn children(&self) -> Option<Arc<DirectiveCollection>> {
        self.children.get()
    }

    fn has_children(&self) -> bool {
        self.body.is_some()
    }

    fn searchable(&self) -> bool {
        true
    }

    fn can_async(&self) -> bool {
        true
    }
}
