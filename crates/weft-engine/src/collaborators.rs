//! Contracts the engine consumes from its host.
//!
//! A render pass talks to the outside world through two traits: a
//! [`Domain`] exposing language tables, templates and control definitions,
//! and an [`Invoker`] executing binds and inline statements. Both are shared
//! across worker threads and must be safe under concurrent calls.

use std::fmt;

use crate::{Arguments, Bind, InvokeError};

/// Which directive family is invoking a bind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExecuterKind {
    Control,
    Permission,
    Other,
}

/// Tri-state result of a conditional bind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    True,
    False,
    Unknown,
}

/// Result of a permission bind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Allowed,
    Forbidden,
}

/// Value returned by an invoked bind or statement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Empty,
    Value(String),
    Conditional(Condition),
    Permission(Access),
    Variables(Arguments),
    /// Redirect order; the location is recorded on the render pass.
    Redirect(String),
}

impl Outcome {
    /// Text delivered by a directive that received this outcome.
    pub fn into_text(self) -> String {
        match self {
            Self::Value(text) => text,
            Self::Conditional(Condition::True) => "true".to_owned(),
            Self::Conditional(Condition::False) => "false".to_owned(),
            Self::Empty
            | Self::Conditional(Condition::Unknown)
            | Self::Permission(_)
            | Self::Variables(_)
            | Self::Redirect(_) => String::new(),
        }
    }
}

/// Control definition resolved from the domain by control id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlDefinition {
    /// Renders part 0 on `True`, part 1 on `False`.
    ConditionalStatement { bind: Option<String> },
    /// Renders part 0 with the variables returned by the bind.
    VariableBlock { bind: Option<String> },
}

impl ControlDefinition {
    pub fn bind(&self) -> Option<&str> {
        match self {
            Self::ConditionalStatement { bind } | Self::VariableBlock { bind } => bind.as_deref(),
        }
    }
}

/// Inline statement handed to [`Invoker::execute_statement`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Statement<'a> {
    /// Directive id of the statement block.
    pub id: &'a str,
    /// Statement code with the control line removed.
    pub code: &'a str,
    /// Positional parameter values when `!PARAMS(...)` was declared.
    pub parameters: Option<&'a [String]>,
    /// `false` when the control line carried `!NOCACHE`.
    pub cache: bool,
}

/// Message attached to a render pass, exposed by message blocks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub content: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Error,
    Warning,
    Success,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => f.write_str("Error"),
            Self::Warning => f.write_str("Warning"),
            Self::Success => f.write_str("Success"),
        }
    }
}

/// Language tables, templates and control definitions of the current domain.
pub trait Domain: Send + Sync {
    /// Localized string for a translation id.
    fn translation(&self, id: &str) -> Option<String>;

    /// Name of the executable answering `EnsurePermission` calls.
    fn security_executable(&self) -> Option<String>;

    fn control(&self, _id: &str) -> Option<ControlDefinition> {
        None
    }

    /// Raw template text for `$T:path$`.
    fn template(&self, _path: &str) -> Option<String> {
        None
    }

    /// Value of a domain-scoped variable such as `$^name$` or `$@obj.path$`.
    fn variable(&self, _prefix: char, _name: &str) -> Option<String> {
        None
    }
}

/// Executes binds and inline statements on behalf of directives.
pub trait Invoker: Send + Sync {
    fn invoke(&self, bind: &Bind, executer: ExecuterKind) -> Result<Outcome, InvokeError>;

    fn execute_statement(&self, statement: &Statement<'_>) -> Result<Outcome, InvokeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_text() {
        assert_eq!(Outcome::Value("x".to_owned()).into_text(), "x");
        assert_eq!(Outcome::Conditional(Condition::True).into_text(), "true");
        assert_eq!(Outcome::Redirect("/login".to_owned()).into_text(), "");
        assert_eq!(Outcome::Empty.into_text(), "");
    }

    #[test]
    fn test_control_definition_bind() {
        let definition = ControlDefinition::VariableBlock {
            bind: Some("App?Vars".to_owned()),
        };
        assert_eq!(definition.bind(), Some("App?Vars"));
        assert_eq!(ControlDefinition::ConditionalStatement { bind: None }.bind(), None);
    }
}
