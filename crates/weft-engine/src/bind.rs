//! External call descriptors.
//!
//! A bind string has the form `Executable?Class.Sub.Procedure,p1|p2`. The
//! class path is optional; parameters are query expressions resolved at
//! render time (argument names, `=literals`, `#ancestor` lookups or nested
//! `$…$` directives).

use std::fmt;

use crate::RenderError;

/// Request method the render pass was started with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Method {
    #[default]
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

/// One bind parameter: the query text and, once prepared, its value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindParameter {
    query: String,
    value: Option<String>,
}

impl BindParameter {
    fn new(query: &str) -> Self {
        Self {
            query: query.to_owned(),
            value: None,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Resolved value; `None` until [`Bind::prepare`] succeeds.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

/// External call descriptor.
///
/// # Example
///
/// ```
/// use weft_engine::{Bind, Method};
///
/// let bind = Bind::parse("App?Users.List,Id|=5", Method::Get).unwrap();
/// assert_eq!(bind.executable(), "App");
/// assert_eq!(bind.classes(), ["Users"]);
/// assert_eq!(bind.procedure(), "List");
/// assert_eq!(bind.to_string(), "App?Users.List,Id|=5");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bind {
    method: Method,
    executable: String,
    classes: Vec<String>,
    procedure: String,
    parameters: Vec<BindParameter>,
    instance_execution: bool,
}

impl Bind {
    /// Parse a bind string.
    ///
    /// Fails with [`RenderError::Configuration`] when the executable or the
    /// procedure is missing.
    pub fn parse(raw: &str, method: Method) -> Result<Self, RenderError> {
        let malformed = || RenderError::Configuration(format!("malformed bind `{raw}`"));

        let (executable, rest) = raw.split_once('?').ok_or_else(malformed)?;
        if executable.is_empty() || rest.contains('?') {
            return Err(malformed());
        }

        let (path, parameters) = match rest.split_once(',') {
            Some((path, parameters)) => (path, Some(parameters)),
            None => (rest, None),
        };

        let mut classes: Vec<String> = path.split('.').map(str::to_owned).collect();
        let procedure = classes.pop().unwrap_or_default();
        if procedure.is_empty() || classes.iter().any(String::is_empty) {
            return Err(malformed());
        }

        Ok(Self {
            method,
            executable: executable.to_owned(),
            classes,
            procedure,
            parameters: parameters
                .map(|p| p.split('|').map(BindParameter::new).collect())
                .unwrap_or_default(),
            instance_execution: false,
        })
    }

    /// Resolve every parameter query through `resolve`.
    ///
    /// The first failing query aborts preparation and leaves the bind not
    /// ready.
    pub fn prepare<F>(&mut self, mut resolve: F) -> Result<(), RenderError>
    where
        F: FnMut(&str) -> Result<String, RenderError>,
    {
        for parameter in &mut self.parameters {
            parameter.value = None;
        }
        for parameter in &mut self.parameters {
            parameter.value = Some(resolve(&parameter.query)?);
        }
        Ok(())
    }

    /// Whether every parameter has been resolved.
    pub fn is_ready(&self) -> bool {
        self.parameters.iter().all(|p| p.value.is_some())
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn procedure(&self) -> &str {
        &self.procedure
    }

    pub fn parameters(&self) -> &[BindParameter] {
        &self.parameters
    }

    /// Resolved parameter values in order. Unresolved entries are empty.
    pub fn values(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .map(|p| p.value().unwrap_or_default())
            .collect()
    }

    /// `Executable?Class.Procedure`, without parameters.
    pub fn target(&self) -> String {
        let mut target = format!("{}?", self.executable);
        for class in &self.classes {
            target.push_str(class);
            target.push('.');
        }
        target.push_str(&self.procedure);
        target
    }

    /// Whether the call targets an instance rather than a static procedure.
    pub fn instance_execution(&self) -> bool {
        self.instance_execution
    }

    #[must_use]
    pub fn with_instance_execution(mut self, instance: bool) -> Self {
        self.instance_execution = instance;
        self
    }
}

impl fmt::Display for Bind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.target())?;
        if !self.parameters.is_empty() {
            f.write_str(",")?;
            let queries: Vec<&str> = self.parameters.iter().map(BindParameter::query).collect();
            f.write_str(&queries.join("|"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_without_class_or_parameters() {
        let bind = Bind::parse("App?Run", Method::Post).unwrap();
        assert_eq!(bind.executable(), "App");
        assert!(bind.classes().is_empty());
        assert_eq!(bind.procedure(), "Run");
        assert!(bind.parameters().is_empty());
        assert_eq!(bind.method(), Method::Post);
        assert!(bind.is_ready());
    }

    #[test]
    fn test_parse_nested_classes() {
        let bind = Bind::parse("App?Admin.Users.Find,Id", Method::Get).unwrap();
        assert_eq!(bind.classes(), ["Admin", "Users"]);
        assert_eq!(bind.procedure(), "Find");
        assert_eq!(bind.target(), "App?Admin.Users.Find");
    }

    #[test]
    fn test_parameters_keep_commas() {
        let bind = Bind::parse("App?Join,=a,b|=c", Method::Get).unwrap();
        let queries: Vec<_> = bind.parameters().iter().map(BindParameter::query).collect();
        assert_eq!(queries, vec!["=a,b", "=c"]);
    }

    #[test]
    fn test_parse_malformed() {
        for raw in ["", "App", "?Run", "App?", "App?Users.", "App?.Run", "A?B?C"] {
            let result = Bind::parse(raw, Method::Get);
            assert!(
                matches!(result, Err(RenderError::Configuration(_))),
                "expected configuration error for `{raw}`"
            );
        }
    }

    #[test]
    fn test_prepare_resolves_in_order() {
        let mut bind = Bind::parse("App?Run,a|b", Method::Get).unwrap();
        assert!(!bind.is_ready());

        bind.prepare(|query| Ok(query.to_uppercase())).unwrap();
        assert!(bind.is_ready());
        assert_eq!(bind.values(), vec!["A", "B"]);
    }

    #[test]
    fn test_prepare_failure_leaves_bind_not_ready() {
        let mut bind = Bind::parse("App?Run,a|b", Method::Get).unwrap();
        let result = bind.prepare(|query| {
            if query == "b" {
                Err(RenderError::Parse("bad".to_owned()))
            } else {
                Ok(query.to_owned())
            }
        });

        assert!(result.is_err());
        assert!(!bind.is_ready());
    }

    #[test]
    fn test_display_round_trip() {
        let raw = "App?Users.List,Id|=5";
        assert_eq!(Bind::parse(raw, Method::Get).unwrap().to_string(), raw);
    }
}
