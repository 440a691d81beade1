//! HTML helpers for error output.

use std::error::Error;

/// Escape special HTML characters.
pub(crate) fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

/// Nested `<div>` fragment describing an error and each of its sources.
pub(crate) fn diagnostic_fragment(error: &dyn Error) -> String {
    let mut messages = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        messages.push(cause.to_string());
        source = cause.source();
    }

    messages
        .iter()
        .rev()
        .fold(String::new(), |inner, message| {
            format!(
                "<div class=\"weft-error\"><span>{}</span>{inner}</div>",
                escape_html(message)
            )
        })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{InvokeError, RenderError};

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<a href=\"x\">&'</a>"), "&lt;a href=&quot;x&quot;&gt;&amp;&#x27;&lt;/a&gt;");
    }

    #[test]
    fn test_diagnostic_fragment_nests_sources() {
        let error = RenderError::Execution {
            directive: "Run".to_owned(),
            source: InvokeError::new("<boom>"),
        };

        assert_eq!(
            diagnostic_fragment(&error),
            "<div class=\"weft-error\"><span>execution of `Run` failed</span>\
             <div class=\"weft-error\"><span>&lt;boom&gt;</span></div></div>"
        );
    }

    #[test]
    fn test_diagnostic_fragment_single_error() {
        let error = RenderError::EmptyBlock("X".to_owned());
        assert_eq!(
            diagnostic_fragment(&error),
            "<div class=\"weft-error\"><span>block `X` has no content</span></div>"
        );
    }
}
