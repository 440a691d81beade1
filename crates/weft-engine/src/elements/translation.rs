//! `$L:Id$` translations and `$L:Id:{p0|p1}:Id$` formattable translations.

use std::ops::Range;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use super::{Capabilities, Children};
use crate::{Directive, DirectiveCollection, DirectiveType, RenderContext, RenderError, Status};

static FORMAT_INDEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{([0-9]+)\}").unwrap());

/// Collects in-place edits and applies them right to left, so earlier
/// ranges stay valid while later ones change length.
#[derive(Debug, Default)]
pub(crate) struct Substitutions {
    items: Vec<(Range<usize>, String)>,
}

impl Substitutions {
    pub fn add(&mut self, range: Range<usize>, value: impl Into<String>) {
        self.items.push((range, value.into()));
    }

    pub fn apply(mut self, text: &mut String) {
        self.items.sort_by_key(|(range, _)| range.start);
        for (range, value) in self.items.into_iter().rev() {
            text.replace_range(range, &value);
        }
    }
}

/// Replace every `{N}` in `template` with `parameters[N]`.
pub(crate) fn format_indexed(template: &str, parameters: &[&str]) -> Result<String, RenderError> {
    let mut substitutions = Substitutions::default();
    for caps in FORMAT_INDEX.captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        let index = caps[1].parse().unwrap_or(usize::MAX);
        let value = parameters
            .get(index)
            .ok_or(RenderError::FormatIndexOutOfRange {
                index,
                count: parameters.len(),
            })?;
        substitutions.add(whole.range(), *value);
    }

    let mut text = template.to_owned();
    substitutions.apply(&mut text);
    Ok(text)
}

fn lookup(ctx: &RenderContext<'_>, id: &str) -> Option<String> {
    let text = ctx.domain().translation(id);
    if text.is_none() {
        tracing::warn!(translation = id, "Missing translation");
    }
    text
}

pub(crate) struct Translation {
    id: String,
}

impl Translation {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_owned() }
    }
}

impl Capabilities for Translation {
    fn kind(&self) -> DirectiveType {
        DirectiveType::Translation
    }

    fn directive_id(&self) -> Option<&str> {
        Some(self.id.as_str())
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
            directive.deliver(Status::Rendered, lookup(ctx, &self.id).unwrap_or_default());
        }
        Ok(())
    }
}

pub(crate) struct FormattableTranslation {
    id: String,
    body: String,
    children: Children,
}

impl FormattableTranslation {
    pub fn new(id: &str, body: String) -> Self {
        Self {
            id: id.to_owned(),
            body,
            children: Children::default(),
        }
    }
}

impl Capabilities for FormattableTranslation {
    fn kind(&self) -> DirectiveType {
        DirectiveType::FormattableTranslation
    }

    fn directive_id(&self) -> Option<&str> {
        Some(self.id.as_str())
    }

    fn parse(&self, ctx: &RenderContext<'_>, directive: &Directive) -> Result<(), RenderError> {
        self.children.get_or_parse(|| {
            ctx.inherit_arguments(directive);
            let parts = ctx.content_parts(&self.id, &self.body, false)?;
            let parameters = parts
                .part(0)
                .ok_or_else(|| RenderError::EmptyBlock(self.id.clone()))?;
            ctx.request_parsing(parameters, &directive.arguments(), directive)
        })?;
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
        if let Some(children) = self.children.get() {
            children.render(ctx, Some(directive.unique_id()));
        }

        let Some(template) = lookup(ctx, &self.id) else {
            directive.deliver(Status::Rendered, String::new());
            return Ok(());
        };
        let rendered = directive.result();
        let parameters: Vec<&str> = rendered.split('|').collect();
        directive.deliver(Status::Rendered, format_indexed(&template, &parameters)?);
        Ok(())
    }

    fn children(&self) -> Option<Arc<DirectiveCollection>> {
        self.children.get()
    }

    fn has_children(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_format_indexed() {
        let text = format_indexed("Hello {0}, you are {1}", &["Ann", "42"]).unwrap();
        assert_eq!(text, "Hello Ann, you are 42");
    }

    #[test]
    fn test_format_indexed_repeated_and_reordered() {
        let text = format_indexed("{1}-{0}-{1}", &["a", "bbbb"]).unwrap();
        assert_eq!(text, "bbbb-a-bbbb");
    }

    #[test]
    fn test_format_index_out_of_range() {
        let result = format_indexed("{0} {2}", &["a", "b"]);
        assert!(matches!(
            result,
            Err(RenderError::FormatIndexOutOfRange { index: 2, count: 2 })
        ));
    }

    #[test]
    fn test_format_without_placeholders() {
        assert_eq!(format_indexed("plain {x}", &[]).unwrap(), "plain {x}");
    }

    #[test]
    fn test_substitutions_apply_right_to_left() {
        let mut text = "ab".to_owned();
        let mut substitutions = Substitutions::default();
        substitutions.add(0..1, "xyz");
        substitutions.add(1..2, "");
        substitutions.apply(&mut text);
        assert_eq!(text, "xyz");
    }
}
