//! In-memory collaborators.
//!
//! [`MemoryDomain`] and [`MemoryInvoker`] back a render pass with plain
//! tables. The `weft` binary fills them from `weft.toml`; tests use them
//! directly.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::{
    Bind, ControlDefinition, Domain, ExecuterKind, InvokeError, Invoker, Outcome, Statement,
};

/// Table-backed [`Domain`].
#[derive(Debug, Default)]
pub struct MemoryDomain {
    translations: HashMap<String, String>,
    security_executable: Option<String>,
    controls: HashMap<String, ControlDefinition>,
    templates: HashMap<String, String>,
    variables: HashMap<(char, String), String>,
}

impl MemoryDomain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_translation(mut self, id: impl Into<String>, text: impl Into<String>) -> Self {
        self.translations.insert(id.into(), text.into());
        self
    }

    #[must_use]
    pub fn with_security_executable(mut self, executable: impl Into<String>) -> Self {
        self.security_executable = Some(executable.into());
        self
    }

    #[must_use]
    pub fn with_control(mut self, id: impl Into<String>, definition: ControlDefinition) -> Self {
        self.controls.insert(id.into(), definition);
        self
    }

    #[must_use]
    pub fn with_template(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.templates.insert(path.into(), content.into());
        self
    }

    #[must_use]
    pub fn with_variable(
        mut self,
        prefix: char,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.variables.insert((prefix, name.into()), value.into());
        self
    }
}

impl Domain for MemoryDomain {
    fn translation(&self, id: &str) -> Option<String> {
        self.translations.get(id).cloned()
    }

    fn security_executable(&self) -> Option<String> {
        self.security_executable.clone()
    }

    fn control(&self, id: &str) -> Option<ControlDefinition> {
        self.controls.get(id).cloned()
    }

    fn template(&self, path: &str) -> Option<String> {
        self.templates.get(path).cloned()
    }

    fn variable(&self, prefix: char, name: &str) -> Option<String> {
        self.variables.get(&(prefix, name.to_owned())).cloned()
    }
}

type BindHandler = Box<dyn Fn(&Bind) -> Result<Outcome, InvokeError> + Send + Sync>;
type StatementHandler = Box<dyn Fn(&Statement<'_>) -> Result<Outcome, InvokeError> + Send + Sync>;

/// Handler-table [`Invoker`].
///
/// Binds are dispatched by [`Bind::target`] (`Executable?Class.Procedure`),
/// statements by their directive id. Statement results are memoized unless
/// the statement opted out with `!NOCACHE`.
#[derive(Default)]
pub struct MemoryInvoker {
    binds: HashMap<String, BindHandler>,
    statements: HashMap<String, StatementHandler>,
    calls: Mutex<HashMap<String, usize>>,
    memo: Mutex<HashMap<String, Outcome>>,
}

impl MemoryInvoker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `target` with a fixed outcome.
    #[must_use]
    pub fn with_outcome(self, target: impl Into<String>, outcome: Outcome) -> Self {
        self.with_handler(target, move |_| Ok(outcome.clone()))
    }

    #[must_use]
    pub fn with_handler<F>(mut self, target: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Bind) -> Result<Outcome, InvokeError> + Send + Sync + 'static,
    {
        self.binds.insert(target.into(), Box::new(handler));
        self
    }

    #[must_use]
    pub fn with_statement<F>(mut self, id: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Statement<'_>) -> Result<Outcome, InvokeError> + Send + Sync + 'static,
    {
        self.statements.insert(id.into(), Box::new(handler));
        self
    }

    /// Number of times a bind target or statement id was executed.
    pub fn calls(&self, key: &str) -> usize {
        self.calls.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    fn count(&self, key: &str) {
        *self.calls.lock().unwrap().entry(key.to_owned()).or_default() += 1;
    }
}

impl Invoker for MemoryInvoker {
    fn invoke(&self, bind: &Bind, executer: ExecuterKind) -> Result<Outcome, InvokeError> {
        if !bind.is_ready() {
            return Err(InvokeError::new(format!("bind `{bind}` is not ready")));
        }

        let target = bind.target();
        let handler = self
            .binds
            .get(&target)
            .ok_or_else(|| InvokeError::new(format!("no handler for `{target}`")))?;

        self.count(&target);
        tracing::debug!(target = %target, executer = ?executer, "Invoking bind");
        handler(bind)
    }

    fn execute_statement(&self, statement: &Statement<'_>) -> Result<Outcome, InvokeError> {
        let handler = self
            .statements
            .get(statement.id)
            .ok_or_else(|| InvokeError::new(format!("no handler for statement `{}`", statement.id)))?;

        let key = format!(
            "{}\u{0}{}\u{0}{}",
            statement.id,
            statement.code,
            statement.parameters.map(|p| p.join("|")).unwrap_or_default()
        );
        if statement.cache
            && let Some(outcome) = self.memo.lock().unwrap().get(&key)
        {
            return Ok(outcome.clone());
        }

        self.count(statement.id);
        let outcome = handler(statement)?;
        if statement.cache {
            self.memo.lock().unwrap().insert(key, outcome.clone());
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Method;

    #[test]
    fn test_invoke_dispatches_by_target() {
        let invoker = MemoryInvoker::new()
            .with_handler("App?Echo", |bind| Ok(Outcome::Value(bind.values().join(","))));

        let mut bind = Bind::parse("App?Echo,a|b", Method::Get).unwrap();
        bind.prepare(|q| Ok(q.to_owned())).unwrap();

        let outcome = invoker.invoke(&bind, ExecuterKind::Other).unwrap();
        assert_eq!(outcome, Outcome::Value("a,b".to_owned()));
        assert_eq!(invoker.calls("App?Echo"), 1);
    }

    #[test]
    fn test_invoke_rejects_unprepared_bind() {
        let invoker = MemoryInvoker::new().with_outcome("App?Run", Outcome::Empty);
        let bind = Bind::parse("App?Run,a", Method::Get).unwrap();

        assert!(invoker.invoke(&bind, ExecuterKind::Other).is_err());
        assert_eq!(invoker.calls("App?Run"), 0);
    }

    #[test]
    fn test_statement_memoization() {
        let invoker =
            MemoryInvoker::new().with_statement("Sum", |_| Ok(Outcome::Value("3".to_owned())));
        let cached = Statement {
            id: "Sum",
            code: "1 + 2",
            parameters: None,
            cache: true,
        };
        let uncached = Statement {
            cache: false,
            ..cached
        };

        invoker.execute_statement(&cached).unwrap();
        invoker.execute_statement(&cached).unwrap();
        assert_eq!(invoker.calls("Sum"), 1);

        invoker.execute_statement(&uncached).unwrap();
        invoker.execute_statement(&uncached).unwrap();
        assert_eq!(invoker.calls("Sum"), 3);
    }

    #[test]
    fn test_domain_tables() {
        let domain = MemoryDomain::new()
            .with_translation("Hi", "Hello")
            .with_variable('^', "User", "ann");

        assert_eq!(domain.translation("Hi").as_deref(), Some("Hello"));
        assert_eq!(domain.translation("Bye"), None);
        assert_eq!(domain.variable('^', "User").as_deref(), Some("ann"));
        assert_eq!(domain.security_executable(), None);
    }
}
