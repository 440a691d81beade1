//! Template grammar.
//!
//! Directives are delimited by `$`. A single capture regex recognizes
//! variables (`$name$`), single tags (`$L:Id$`), procedure calls
//! (`$F:Exec?Class.Proc,p1|p2$`), block openings (`$C:Id:{`, `$MB:{`),
//! separators (`}:Id:{`) and closings (`}:Id$`). A stack of open block ids
//! pairs openings with closings; only depth-0 matches become tokens, nested
//! directives stay inside their block's raw text.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::RenderError;

const VARIABLE: &str =
    r"(?:#+|[\^\-+*~])?[0-9_a-zA-Z]+|=[^$|]*|@(?:#+|-)?[0-9_a-zA-Z]+\.[.0-9_a-zA-Z]+";
const PARAMETER: &str =
    r"(?:#+|[\^\-+*~])?[0-9_a-zA-Z]+|=[^$|)]*|@(?:#+|-)?[0-9_a-zA-Z]+\.[.0-9_a-zA-Z]+";
const TAG_ID: &str = r"[.\-0-9_a-zA-Z]+";
const TAG_PATH: &str = r"[/.\-0-9_a-zA-Z]+";

static CAPTURE: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(
        concat!(
            r"\$(?:",
            r"(?P<variable>{VARIABLE})\$",
            r"|(?P<special>{TAG_ID}):\{{",
            r"|(?P<letter>[A-Z])(?P<leveling>#[0-9]+\+?)?(?:\[(?P<bound>{TAG_ID})\])?:(?:",
            r"(?P<procedure>{TAG_ID}\?{TAG_ID}(?:,(?:\|?(?:{VARIABLE})?)*)?)\$",
            r"|(?P<open>{TAG_ID})(?P<parameters>\((?:\|?(?:{PARAMETER})?)*\))?:\{{",
            r"|(?P<single>{TAG_PATH})\$",
            r"))",
            r"|\}}:(?P<close>{TAG_ID})(?P<closing>:\{{|\$)",
        ),
        VARIABLE = VARIABLE,
        PARAMETER = PARAMETER,
        TAG_ID = TAG_ID,
        TAG_PATH = TAG_PATH,
    );
    Regex::new(&pattern).unwrap()
});

/// Ancestor-skip count attached to a typed tag: `#N` or `#N+`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Leveling {
    /// Number of parent links to walk.
    pub level: usize,
    /// Use the leveled directive's own scope instead of its parent's.
    pub inclusive: bool,
}

impl Leveling {
    /// Parse `#N` / `#N+`. Anything unparseable is level zero.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let text = text.strip_prefix('#').unwrap_or(text);
        let (digits, inclusive) = match text.strip_suffix('+') {
            Some(digits) => (digits, true),
            None => (text, false),
        };
        Self {
            level: digits.parse().unwrap_or(0),
            inclusive,
        }
    }
}

/// Leveling and bound id shared by all typed tags.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagHeader {
    pub leveling: Leveling,
    pub bound: Option<String>,
}

/// One depth-0 element of a template.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Token<'a> {
    /// Source text of the whole token.
    pub raw: &'a str,
    pub kind: TokenKind<'a>,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum TokenKind<'a> {
    Text,
    /// `$expr$`, with the delimiters removed.
    Variable(&'a str),
    /// `$X:id$`
    Tag {
        letter: char,
        header: TagHeader,
        id: &'a str,
    },
    /// `$X:Exec?Class.Proc,params$`
    Procedure {
        letter: char,
        header: TagHeader,
        bind: &'a str,
    },
    Block(Block<'a>),
}

/// A complete block directive with its nested content.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Block<'a> {
    /// `None` for special tags such as `$MB:{…}:MB$`.
    pub letter: Option<char>,
    pub header: TagHeader,
    pub id: &'a str,
    pub parameters: Vec<String>,
    /// Text between the opening `:{` and the final `}`, separators included.
    pub core: &'a str,
}

impl Block<'_> {
    /// The `ID:{…}:ID` form consumed by the content splitter.
    pub fn body(&self) -> String {
        format!("{id}:{{{core}}}:{id}", id = self.id, core = self.core)
    }
}

struct OpenBlock<'a> {
    start: usize,
    content_start: usize,
    letter: Option<char>,
    header: TagHeader,
    id: &'a str,
    parameters: Vec<String>,
}

/// Split a template into depth-0 tokens.
pub(crate) fn tokenize(text: &str) -> Result<Vec<Token<'_>>, RenderError> {
    let mut tokens = Vec::new();
    let mut stack: Vec<OpenBlock<'_>> = Vec::new();
    let mut cursor = 0;

    for caps in CAPTURE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };

        if let Some(close) = caps.name("close") {
            let Some(top) = stack.last() else {
                return Err(RenderError::Parse(format!(
                    "`}}:{}` at offset {} has no open block",
                    close.as_str(),
                    whole.start()
                )));
            };
            if top.id != close.as_str() {
                return Err(RenderError::Parse(format!(
                    "`}}:{}` at offset {} does not match open block `{}`",
                    close.as_str(),
                    whole.start(),
                    top.id
                )));
            }
            if caps.name("closing").is_some_and(|m| m.as_str() == "$") {
                let Some(open) = stack.pop() else { continue };
                if stack.is_empty() {
                    push_text(&mut tokens, text, cursor, open.start);
                    tokens.push(Token {
                        raw: &text[open.start..whole.end()],
                        kind: TokenKind::Block(Block {
                            letter: open.letter,
                            header: open.header,
                            id: open.id,
                            parameters: open.parameters,
                            core: &text[open.content_start..whole.start()],
                        }),
                    });
                    cursor = whole.end();
                }
            }
            continue;
        }

        if let Some(id) = caps.name("open").or_else(|| caps.name("special")) {
            let id = id.as_str();
            if stack.iter().any(|open| open.id == id) {
                return Err(RenderError::Parse(format!(
                    "block `{id}` at offset {} is nested inside a block with the same id",
                    whole.start()
                )));
            }
            stack.push(OpenBlock {
                start: whole.start(),
                content_start: whole.end(),
                letter: caps.name("special").is_none().then(|| letter(&caps)),
                header: header(&caps),
                id,
                parameters: caps
                    .name("parameters")
                    .map(|m| split_parameters(m.as_str()))
                    .unwrap_or_default(),
            });
            continue;
        }

        if !stack.is_empty() {
            continue;
        }

        let kind = if let Some(variable) = caps.name("variable") {
            TokenKind::Variable(variable.as_str())
        } else if let Some(bind) = caps.name("procedure") {
            TokenKind::Procedure {
                letter: letter(&caps),
                header: header(&caps),
                bind: bind.as_str(),
            }
        } else if let Some(id) = caps.name("single") {
            TokenKind::Tag {
                letter: letter(&caps),
                header: header(&caps),
                id: id.as_str(),
            }
        } else {
            continue;
        };

        push_text(&mut tokens, text, cursor, whole.start());
        tokens.push(Token {
            raw: whole.as_str(),
            kind,
        });
        cursor = whole.end();
    }

    if let Some(open) = stack.last() {
        return Err(RenderError::Parse(format!(
            "block `{}` opened at offset {} is never closed",
            open.id, open.start
        )));
    }

    push_text(&mut tokens, text, cursor, text.len());
    Ok(tokens)
}

fn push_text<'a>(tokens: &mut Vec<Token<'a>>, text: &'a str, start: usize, end: usize) {
    if start < end {
        tokens.push(Token {
            raw: &text[start..end],
            kind: TokenKind::Text,
        });
    }
}

fn letter(caps: &Captures<'_>) -> char {
    caps.name("letter")
        .and_then(|m| m.as_str().chars().next())
        .unwrap_or_default()
}

fn header(caps: &Captures<'_>) -> TagHeader {
    TagHeader {
        leveling: caps
            .name("leveling")
            .map(|m| Leveling::parse(m.as_str()))
            .unwrap_or_default(),
        bound: caps.name("bound").map(|m| m.as_str().to_owned()),
    }
}

/// Split `(p1|p2)` into its pipe-separated entries.
fn split_parameters(text: &str) -> Vec<String> {
    let inner = text
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .unwrap_or(text);
    if inner.is_empty() {
        return Vec::new();
    }
    inner.split('|').map(str::to_owned).collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind<'_>> {
        tokenize(text).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_static_text_only() {
        let tokens = tokenize("plain text, $5 and no directives").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Text);
        assert_eq!(tokens[0].raw, "plain text, $5 and no directives");
    }

    #[test]
    fn test_empty_template() {
        assert!(tokenize("").unwrap().is_empty());
    }

    #[test]
    fn test_variables() {
        assert_eq!(
            kinds("$Name$$=hello world$$##Outer$$^Session$$@Obj.Path$"),
            vec![
                TokenKind::Variable("Name"),
                TokenKind::Variable("=hello world"),
                TokenKind::Variable("##Outer"),
                TokenKind::Variable("^Session"),
                TokenKind::Variable("@Obj.Path"),
            ]
        );
    }

    #[test]
    fn test_text_around_directives() {
        let tokens = tokenize("Hi $Name$!").unwrap();
        let raws: Vec<_> = tokens.iter().map(|t| t.raw).collect();
        assert_eq!(raws, vec!["Hi ", "$Name$", "!"]);
    }

    #[test]
    fn test_single_tags() {
        assert_eq!(
            kinds("$L:Greeting$$T:pages/home$"),
            vec![
                TokenKind::Tag {
                    letter: 'L',
                    header: TagHeader::default(),
                    id: "Greeting",
                },
                TokenKind::Tag {
                    letter: 'T',
                    header: TagHeader::default(),
                    id: "pages/home",
                },
            ]
        );
    }

    #[test]
    fn test_procedure_with_leveling_and_bound() {
        assert_eq!(
            kinds("$F#2+[Target]:App?Users.List,Id|=5$"),
            vec![TokenKind::Procedure {
                letter: 'F',
                header: TagHeader {
                    leveling: Leveling {
                        level: 2,
                        inclusive: true,
                    },
                    bound: Some("Target".to_owned()),
                },
                bind: "App?Users.List,Id|=5",
            }]
        );
    }

    #[test]
    fn test_block_with_parameters() {
        let tokens = tokenize("a$C:Menu(Id|=x):{yes}:Menu:{no}:Menu$b").unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].raw, "$C:Menu(Id|=x):{yes}:Menu:{no}:Menu$");

        let TokenKind::Block(block) = &tokens[1].kind else {
            panic!("expected block, got {:?}", tokens[1].kind);
        };
        assert_eq!(block.letter, Some('C'));
        assert_eq!(block.id, "Menu");
        assert_eq!(block.parameters, vec!["Id", "=x"]);
        assert_eq!(block.core, "yes}:Menu:{no");
        assert_eq!(block.body(), "Menu:{yes}:Menu:{no}:Menu");
    }

    #[test]
    fn test_special_block() {
        let tokens = tokenize("$MB:{ $Message$ }:MB$").unwrap();
        let TokenKind::Block(block) = &tokens[0].kind else {
            panic!("expected block");
        };
        assert_eq!(block.letter, None);
        assert_eq!(block.id, "MB");
        assert_eq!(block.core, " $Message$ ");
    }

    #[test]
    fn test_nested_directives_stay_in_block() {
        let text = "$S:Outer:{ $Name$ $C:Inner:{x}:Inner$ }:Outer$$Tail$";
        let tokens = tokenize(text).unwrap();
        assert_eq!(tokens.len(), 2);
        let TokenKind::Block(block) = &tokens[0].kind else {
            panic!("expected block");
        };
        assert_eq!(block.core, " $Name$ $C:Inner:{x}:Inner$ ");
        assert_eq!(tokens[1].kind, TokenKind::Variable("Tail"));
    }

    #[test]
    fn test_same_id_nesting_rejected() {
        let result = tokenize("$C:X:{ $U:X:{a}:X$ }:X$");
        assert!(matches!(result, Err(RenderError::Parse(_))));
    }

    #[test]
    fn test_mismatched_closing_rejected() {
        let result = tokenize("$C:X:{ a }:Y$");
        assert!(matches!(result, Err(RenderError::Parse(_))));
    }

    #[test]
    fn test_unclosed_block_rejected() {
        let result = tokenize("$C:X:{ a ");
        assert!(matches!(result, Err(RenderError::Parse(_))));
    }

    #[test]
    fn test_stray_closing_rejected() {
        let result = tokenize("text }:X$");
        assert!(matches!(result, Err(RenderError::Parse(_))));
    }

    #[test]
    fn test_leveling_parse() {
        assert_eq!(Leveling::parse("#3"), Leveling { level: 3, inclusive: false });
        assert_eq!(Leveling::parse("#1+"), Leveling { level: 1, inclusive: true });
        assert_eq!(Leveling::parse("#"), Leveling::default());
    }
}
