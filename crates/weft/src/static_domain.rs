//! Domain and invoker answering from `weft.toml`.
//!
//! Bind answers are plain strings interpreted by the kind of caller:
//!
//! | caller     | answer                          | outcome                 |
//! |------------|---------------------------------|-------------------------|
//! | control    | `true` / `false`                | condition               |
//! | control    | `k=v;k2=v2`                     | variables               |
//! | permission | `allowed` / anything else       | access                  |
//! | execution  | `redirect:/path`                | redirect                |
//! | execution  | any text, `{N}` = N-th value    | value                   |

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use weft_config::{Config, ControlKind};
use weft_engine::{
    Access, Arguments, Bind, Condition, ControlDefinition, Domain, ExecuterKind, InvokeError,
    Invoker, Outcome, Statement,
};

const REDIRECT_PREFIX: &str = "redirect:";

pub(crate) struct StaticDomain {
    translations: HashMap<String, String>,
    security_executable: Option<String>,
    controls: HashMap<String, ControlDefinition>,
    variables: HashMap<(char, String), String>,
    templates_dir: PathBuf,
}

impl StaticDomain {
    pub(crate) fn new(config: &Config) -> Self {
        let controls = config
            .controls
            .iter()
            .map(|(id, control)| {
                let bind = control.bind.clone();
                let definition = match control.kind {
                    ControlKind::Conditional => ControlDefinition::ConditionalStatement { bind },
                    ControlKind::Variables => ControlDefinition::VariableBlock { bind },
                };
                (id.clone(), definition)
            })
            .collect();

        let variables = config
            .variables
            .iter()
            .filter_map(|(prefix, table)| Some((prefix.chars().next()?, table)))
            .flat_map(|(prefix, table)| {
                table
                    .iter()
                    .map(move |(name, value)| ((prefix, name.clone()), value.clone()))
            })
            .collect();

        if config.translations().is_none() && !config.translations.is_empty() {
            tracing::warn!(
                language = %config.domain_resolved.language,
                "No translation table for language"
            );
        }

        Self {
            translations: config.translations().cloned().unwrap_or_default(),
            security_executable: config.domain_resolved.security_executable.clone(),
            controls,
            variables,
            templates_dir: config.domain_resolved.templates_dir.clone(),
        }
    }
}

/// Template path below `root`, or `None` if it would escape it.
fn template_path(root: &Path, path: &str) -> Option<PathBuf> {
    let relative = Path::new(path);
    relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
        .then(|| root.join(relative))
}

impl Domain for StaticDomain {
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
        let Some(file) = template_path(&self.templates_dir, path) else {
            tracing::warn!(template = path, "Template path escapes the templates directory");
            return None;
        };
        match std::fs::read_to_string(&file) {
            Ok(content) => Some(content),
            Err(e) => {
                tracing::debug!(path = %file.display(), error = %e, "Template not readable");
                None
            }
        }
    }

    fn variable(&self, prefix: char, name: &str) -> Option<String> {
        self.variables.get(&(prefix, name.to_owned())).cloned()
    }
}

pub(crate) struct StaticInvoker {
    binds: HashMap<String, String>,
    statements: HashMap<String, String>,
}

impl StaticInvoker {
    pub(crate) fn new(config: &Config) -> Self {
        Self {
            binds: config.binds.clone(),
            statements: config.statements.clone(),
        }
    }
}

fn control_outcome(answer: &str) -> Outcome {
    match answer.trim() {
        "true" => Outcome::Conditional(Condition::True),
        "false" => Outcome::Conditional(Condition::False),
        answer if answer.contains('=') => Outcome::Variables(
            answer
                .split(';')
                .filter_map(Arguments::parse_pair)
                .collect(),
        ),
        _ => Outcome::Conditional(Condition::Unknown),
    }
}

fn value_outcome(answer: &str, values: &[&str]) -> Outcome {
    if let Some(location) = answer.strip_prefix(REDIRECT_PREFIX) {
        return Outcome::Redirect(location.trim().to_owned());
    }
    let text = values
        .iter()
        .enumerate()
        .fold(answer.to_owned(), |text, (index, value)| {
            text.replace(&format!("{{{index}}}"), value)
        });
    Outcome::Value(text)
}

impl Invoker for StaticInvoker {
    fn invoke(&self, bind: &Bind, executer: ExecuterKind) -> Result<Outcome, InvokeError> {
        let target = bind.target();
        let answer = self
            .binds
            .get(&target)
            .ok_or_else(|| InvokeError::new(format!("no answer configured for `{target}`")))?;

        let outcome = match executer {
            ExecuterKind::Control => control_outcome(answer),
            ExecuterKind::Permission => Outcome::Permission(if answer.trim() == "allowed" {
                Access::Allowed
            } else {
                Access::Forbidden
            }),
            ExecuterKind::Other => value_outcome(answer, &bind.values()),
        };
        tracing::debug!(target = %target, executer = ?executer, "Answered bind");
        Ok(outcome)
    }

    fn execute_statement(&self, statement: &Statement<'_>) -> Result<Outcome, InvokeError> {
        let answer = self.statements.get(statement.id).ok_or_else(|| {
            InvokeError::new(format!("no answer configured for statement `{}`", statement.id))
        })?;
        let parameters: Vec<&str> = statement
            .parameters
            .unwrap_or_default()
            .iter()
            .map(String::as_str)
            .collect();
        Ok(value_outcome(answer, &parameters))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use weft_engine::Method;

    use super::*;

    fn prepared(raw: &str) -> Bind {
        let mut bind = Bind::parse(raw, Method::Get).unwrap();
        bind.prepare(|query| Ok(query.trim_start_matches('=').to_owned()))
            .unwrap();
        bind
    }

    fn invoker(binds: &[(&str, &str)]) -> StaticInvoker {
        StaticInvoker {
            binds: binds
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            statements: HashMap::from([("Total".to_owned(), "sum={0}".to_owned())]),
        }
    }

    #[test]
    fn test_control_answers() {
        assert_eq!(control_outcome("true"), Outcome::Conditional(Condition::True));
        assert_eq!(control_outcome(" false "), Outcome::Conditional(Condition::False));
        assert_eq!(control_outcome("maybe"), Outcome::Conditional(Condition::Unknown));
        assert_eq!(
            control_outcome("Title=Home;Lang=en"),
            Outcome::Variables([("Title", "Home"), ("Lang", "en")].into_iter().collect())
        );
    }

    #[test]
    fn test_invoke_by_executer_kind() {
        let invoker = invoker(&[
            ("Sec?EnsurePermission", "allowed"),
            ("App?Greet", "hi {0}"),
            ("Auth?Check", "redirect: /login"),
        ]);

        let permission = prepared("Sec?EnsurePermission,=Zone");
        assert_eq!(
            invoker.invoke(&permission, ExecuterKind::Permission).unwrap(),
            Outcome::Permission(Access::Allowed)
        );
        assert_eq!(
            invoker.invoke(&prepared("App?Greet,=Ann"), ExecuterKind::Other).unwrap(),
            Outcome::Value("hi Ann".to_owned())
        );
        assert_eq!(
            invoker.invoke(&prepared("Auth?Check"), ExecuterKind::Other).unwrap(),
            Outcome::Redirect("/login".to_owned())
        );
        assert!(invoker.invoke(&prepared("App?Missing"), ExecuterKind::Other).is_err());
    }

    #[test]
    fn test_statement_answer() {
        let invoker = invoker(&[]);
        let parameters = vec!["3".to_owned()];
        let statement = Statement {
            id: "Total",
            code: "select 3",
            parameters: Some(&parameters),
            cache: true,
        };
        assert_eq!(
            invoker.execute_statement(&statement).unwrap(),
            Outcome::Value("sum=3".to_owned())
        );
    }

    #[test]
    fn test_template_path_stays_inside_root() {
        let root = Path::new("/site/templates");
        assert_eq!(
            template_path(root, "partials/nav.html"),
            Some(PathBuf::from("/site/templates/partials/nav.html"))
        );
        assert_eq!(template_path(root, "../secret"), None);
        assert_eq!(template_path(root, "/etc/passwd"), None);
    }

    #[test]
    fn test_domain_reads_templates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("nav.html"), "<nav>$L:Home$</nav>").unwrap();
        let domain = StaticDomain {
            translations: HashMap::new(),
            security_executable: None,
            controls: HashMap::new(),
            variables: HashMap::from([(('^', "User".to_owned()), "ann".to_owned())]),
            templates_dir: dir.path().to_path_buf(),
        };

        assert_eq!(domain.template("nav.html").as_deref(), Some("<nav>$L:Home$</nav>"));
        assert_eq!(domain.template("missing.html"), None);
        assert_eq!(domain.variable('^', "User").as_deref(), Some("ann"));
        assert_eq!(domain.variable('@', "User"), None);
    }
}
