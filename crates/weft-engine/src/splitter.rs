//! Content splitting for block directives.
//!
//! A block directive carries raw text of the form `ID:{part}:ID:{part}:ID`.
//! The splitter extracts the ordered parts and an optional message template
//! (a part starting with [`MESSAGE_TEMPLATE_MARKER`]). Results are cached per
//! tag id for the lifetime of the [`Engine`](crate::Engine).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::RenderError;

/// Marker that turns a part into the block's message template.
pub const MESSAGE_TEMPLATE_MARKER: &str = "!MESSAGETEMPLATE";

/// Ordered content segments of one block directive.
#[derive(Debug, PartialEq, Eq)]
pub struct ContentParts {
    content: String,
    parts: Vec<String>,
    message_template: Option<String>,
}

impl ContentParts {
    /// Split raw `ID:{…}:ID` text.
    ///
    /// Special directives (`MB`, `PC`, `AG`) have each part trimmed.
    ///
    /// # Example
    ///
    /// ```
    /// use weft_engine::ContentParts;
    ///
    /// let parts = ContentParts::split("Id", "Id:{A}:Id:{B}:Id", false).unwrap();
    /// assert_eq!(parts.parts(), ["A", "B"]);
    /// assert_eq!(parts.message_template(), None);
    /// ```
    pub fn split(tag_id: &str, content: &str, special: bool) -> Result<Self, RenderError> {
        let opening = format!("{tag_id}:{{");
        let closing = format!("}}:{tag_id}");
        if content.len() < opening.len() + closing.len()
            || !content.starts_with(&opening)
            || !content.ends_with(&closing)
        {
            return Err(RenderError::Parse(format!(
                "content of `{tag_id}` is not enclosed by `{opening}` and `{closing}`"
            )));
        }

        let core = &content[opening.len()..content.len() - closing.len()];
        let core = if special { core.trim() } else { core };
        let separator = format!("}}:{tag_id}:{{");

        let mut parts = Vec::new();
        let mut message_template = None;
        for piece in core.split(separator.as_str()) {
            let piece = if special { piece.trim() } else { piece };
            if let Some(template) = piece.strip_prefix(MESSAGE_TEMPLATE_MARKER) {
                if message_template.is_some() {
                    return Err(RenderError::MultipleBlock(tag_id.to_owned()));
                }
                message_template = Some(template.to_owned());
                continue;
            }
            if !piece.is_empty() {
                parts.push(piece.to_owned());
            }
        }

        if parts.is_empty() {
            return Err(RenderError::EmptyBlock(tag_id.to_owned()));
        }

        Ok(Self {
            content: content.to_owned(),
            parts,
            message_template,
        })
    }

    /// Raw content this split was computed from.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Non-empty parts in source order.
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Part at `index`, if present.
    pub fn part(&self, index: usize) -> Option<&str> {
        self.parts.get(index).map(String::as_str)
    }

    pub fn message_template(&self) -> Option<&str> {
        self.message_template.as_deref()
    }
}

/// Process-wide cache of content splits keyed by tag id.
///
/// A hit requires the stored raw content to equal the requested content;
/// otherwise the content is split again and the entry replaced.
#[derive(Debug, Default)]
pub struct ContentPartCache {
    entries: RwLock<HashMap<String, Arc<ContentParts>>>,
}

impl ContentPartCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the split for `content`, computing and caching it on a miss.
    pub fn get_or_split(
        &self,
        tag_id: &str,
        content: &str,
        special: bool,
    ) -> Result<Arc<ContentParts>, RenderError> {
        if let Some(cached) = self.entries.read().unwrap().get(tag_id)
            && cached.content() == content
        {
            return Ok(Arc::clone(cached));
        }

        let parts = Arc::new(ContentParts::split(tag_id, content, special)?);
        self.entries
            .write()
            .unwrap()
            .insert(tag_id.to_owned(), Arc::clone(&parts));
        tracing::debug!(tag = tag_id, parts = parts.parts().len(), "Content split cached");
        Ok(parts)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_split_two_parts() {
        let parts = ContentParts::split("Id", "Id:{A}:Id:{B}:Id", false).unwrap();
        assert_eq!(parts.parts(), ["A", "B"]);
    }

    #[test]
    fn test_split_message_template() {
        let parts = ContentParts::split(
            "Perm",
            "Perm:{secret}:Perm:{!MESSAGETEMPLATEdenied}:Perm",
            false,
        )
        .unwrap();

        assert_eq!(parts.parts(), ["secret"]);
        assert_eq!(parts.message_template(), Some("denied"));
    }

    #[test]
    fn test_split_second_message_template_fails() {
        let result = ContentParts::split(
            "P",
            "P:{a}:P:{!MESSAGETEMPLATEx}:P:{!MESSAGETEMPLATEy}:P",
            false,
        );
        assert!(matches!(result, Err(RenderError::MultipleBlock(id)) if id == "P"));
    }

    #[test]
    fn test_split_empty_parts_dropped() {
        let parts = ContentParts::split("Id", "Id:{}:Id:{B}:Id", false).unwrap();
        assert_eq!(parts.parts(), ["B"]);
    }

    #[test]
    fn test_split_no_usable_parts() {
        for content in ["Id:{}:Id", "Id:{}:Id:{}:Id", "Id:{!MESSAGETEMPLATEonly}:Id"] {
            let result = ContentParts::split("Id", content, false);
            assert!(
                matches!(result, Err(RenderError::EmptyBlock(_))),
                "expected empty block for {content}"
            );
        }
    }

    #[test]
    fn test_split_special_trims_parts() {
        let parts = ContentParts::split("MB", "MB:{  hello \n}:MB", true).unwrap();
        assert_eq!(parts.parts(), ["hello"]);

        let parts = ContentParts::split("Id", "Id:{  hello \n}:Id", false).unwrap();
        assert_eq!(parts.parts(), ["  hello \n"]);
    }

    #[test]
    fn test_split_whitespace_only_special_is_empty() {
        let result = ContentParts::split("AG", "AG:{   }:AG", true);
        assert!(matches!(result, Err(RenderError::EmptyBlock(_))));
    }

    #[test]
    fn test_split_misplaced_markers() {
        for content in ["x Id:{A}:Id", "Id:{A}:Id x", "Id:{A}:Other", "Id:{:Id"] {
            let result = ContentParts::split("Id", content, false);
            assert!(
                matches!(result, Err(RenderError::Parse(_))),
                "expected parse error for {content}"
            );
        }
    }

    #[test]
    fn test_cache_returns_identical_split() {
        let cache = ContentPartCache::new();
        let first = cache.get_or_split("Id", "Id:{A}:Id:{B}:Id", false).unwrap();
        let second = cache.get_or_split("Id", "Id:{A}:Id:{B}:Id", false).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_replaces_on_content_mismatch() {
        let cache = ContentPartCache::new();
        let first = cache.get_or_split("Id", "Id:{A}:Id", false).unwrap();
        let second = cache.get_or_split("Id", "Id:{C}:Id", false).unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.parts(), ["C"]);

        let third = cache.get_or_split("Id", "Id:{C}:Id", false).unwrap();
        assert!(Arc::ptr_eq(&second, &third));
    }

    #[test]
    fn test_cache_errors_not_cached() {
        let cache = ContentPartCache::new();
        assert!(cache.get_or_split("Id", "Id:{}:Id", false).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_concurrent_access() {
        let cache = Arc::new(ContentPartCache::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    let id = format!("T{}", i % 2);
                    let content = format!("{id}:{{x}}:{id}");
                    let parts = cache.get_or_split(&id, &content, false).unwrap();
                    assert_eq!(parts.parts(), ["x"]);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 2);
    }
}
