//! Configuration management for Weft.
//!
//! Parses `weft.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `domain.security_executable`
//! - `domain.templates_dir`
//! - `domain.hash_code`

mod expand;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    pub debugging: Option<bool>,
    pub analytics: Option<bool>,
    pub worker_threads: Option<usize>,
    pub language: Option<String>,
    pub templates_dir: Option<PathBuf>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "weft.toml";

/// Prefixes accepted as keys of the `[variables]` table.
const VARIABLE_PREFIXES: [&str; 6] = ["^", "-", "+", "*", "~", "@"];

/// Upper bound for `render.worker_threads`.
const MAX_WORKER_THREADS: usize = 512;

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Render pass settings.
    pub render: RenderConfig,
    /// Domain settings (paths are relative strings from TOML).
    domain: DomainConfigRaw,
    /// Translation tables keyed by language, then translation id.
    pub translations: HashMap<String, HashMap<String, String>>,
    /// Canned bind answers keyed by `Executable?Class.Procedure`.
    pub binds: HashMap<String, String>,
    /// Control definitions keyed by control id.
    pub controls: HashMap<String, ControlConfig>,
    /// Canned inline statement answers keyed by statement id.
    pub statements: HashMap<String, String>,
    /// Domain variables keyed by prefix character, then name.
    pub variables: HashMap<String, HashMap<String, String>>,

    /// Resolved domain configuration (set after loading).
    #[serde(skip)]
    pub domain_resolved: DomainConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Render pass settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Emit diagnostic fragments in place of failed directives.
    pub debugging: bool,
    /// Log per-directive timings.
    pub analytics: bool,
    /// Worker pool size; 0 picks the rayon default.
    pub worker_threads: usize,
    /// Whether `$PC:` blocks are cached across passes.
    pub partial_cache: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            debugging: false,
            analytics: false,
            worker_threads: 0,
            partial_cache: true,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct DomainConfigRaw {
    security_executable: Option<String>,
    templates_dir: Option<String>,
    hash_code: Option<String>,
    language: Option<String>,
}

/// Resolved domain configuration with absolute paths.
#[derive(Debug, Default)]
pub struct DomainConfig {
    /// Executable asked by permission blocks; none means always forbidden.
    pub security_executable: Option<String>,
    /// Directory `$T:` paths are resolved against.
    pub templates_dir: PathBuf,
    /// Prefix for hash-code pointed paths and encoded calls.
    pub hash_code: String,
    /// Translation table to use.
    pub language: String,
}

/// Kind of a configured control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    /// Selects a branch from a true/false bind answer.
    Conditional,
    /// Introduces variables from a bind answer.
    Variables,
}

/// Control definition.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlConfig {
    #[serde(rename = "type")]
    pub kind: ControlKind,
    pub bind: Option<String>,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`domain.templates_dir`").
        field: String,
        /// Error message (e.g., "${`TEMPLATES`} not set").
        message: String,
    },
}

fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `weft.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = std::env::current_dir()
            .ok()
            .and_then(|cwd| Self::discover_config(&cwd))
        {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_base(&std::env::current_dir().unwrap_or_default())
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        Ok(config)
    }

    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(debugging) = settings.debugging {
            self.render.debugging = debugging;
        }
        if let Some(analytics) = settings.analytics {
            self.render.analytics = analytics;
        }
        if let Some(worker_threads) = settings.worker_threads {
            self.render.worker_threads = worker_threads;
        }
        if let Some(language) = &settings.language {
            self.domain_resolved.language.clone_from(language);
        }
        if let Some(templates_dir) = &settings.templates_dir {
            self.domain_resolved.templates_dir.clone_from(templates_dir);
        }
    }

    /// Translation table for the configured language.
    pub fn translations(&self) -> Option<&HashMap<String, String>> {
        self.translations.get(&self.domain_resolved.language)
    }

    /// Search for a config file in `start` and its parents.
    fn discover_config(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    fn default_with_base(base: &Path) -> Self {
        Self {
            render: RenderConfig::default(),
            domain: DomainConfigRaw::default(),
            translations: HashMap::new(),
            binds: HashMap::new(),
            controls: HashMap::new(),
            statements: HashMap::new(),
            variables: HashMap::new(),
            domain_resolved: DomainConfig {
                security_executable: None,
                templates_dir: base.join("templates"),
                hash_code: "0".to_owned(),
                language: "en".to_owned(),
            },
            config_path: None,
        }
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_render()?;
        self.validate_domain()?;
        self.validate_controls()?;
        self.validate_variables()?;
        Ok(())
    }

    fn validate_variables(&self) -> Result<(), ConfigError> {
        for prefix in self.variables.keys() {
            if !VARIABLE_PREFIXES.contains(&prefix.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "variables.{prefix:?} is not one of {}",
                    VARIABLE_PREFIXES.join(" ")
                )));
            }
        }
        Ok(())
    }

    fn validate_render(&self) -> Result<(), ConfigError> {
        if self.render.worker_threads > MAX_WORKER_THREADS {
            return Err(ConfigError::Validation(format!(
                "render.worker_threads cannot exceed {MAX_WORKER_THREADS}"
            )));
        }
        Ok(())
    }

    fn validate_domain(&self) -> Result<(), ConfigError> {
        let domain = &self.domain_resolved;
        if let Some(executable) = &domain.security_executable {
            require_non_empty(executable, "domain.security_executable")?;
            if executable.contains(['?', ',', '|']) {
                return Err(ConfigError::Validation(
                    "domain.security_executable must be a bare executable name".to_owned(),
                ));
            }
        }
        require_non_empty(&domain.language, "domain.language")?;
        Ok(())
    }

    fn validate_controls(&self) -> Result<(), ConfigError> {
        for (id, control) in &self.controls {
            if let Some(bind) = &control.bind
                && !bind.contains('?')
            {
                return Err(ConfigError::Validation(format!(
                    "controls.{id}.bind must look like `Executable?Procedure`"
                )));
            }
        }
        Ok(())
    }

    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        let domain = &mut self.domain;
        if let Some(ref executable) = domain.security_executable {
            domain.security_executable = Some(expand::expand_env(
                executable,
                "domain.security_executable",
            )?);
        }
        if let Some(ref dir) = domain.templates_dir {
            domain.templates_dir = Some(expand::expand_env(dir, "domain.templates_dir")?);
        }
        if let Some(ref hash_code) = domain.hash_code {
            domain.hash_code = Some(expand::expand_env(hash_code, "domain.hash_code")?);
        }
        Ok(())
    }

    /// Resolve relative paths against the config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let domain = &self.domain;
        self.domain_resolved = DomainConfig {
            security_executable: domain.security_executable.clone(),
            templates_dir: config_dir.join(domain.templates_dir.as_deref().unwrap_or("templates")),
            hash_code: domain.hash_code.clone().unwrap_or_else(|| "0".to_owned()),
            language: domain.language.clone().unwrap_or_else(|| "en".to_owned()),
        };
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const FULL: &str = r#"
[render]
debugging = true
worker_threads = 4

[domain]
security_executable = "Security"
templates_dir = "views"
hash_code = "42"
language = "de"

[translations.de]
GREETING = "Hallo {0}"

[translations.en]
GREETING = "Hello {0}"

[binds]
"Rules?IsAdmin" = "true"

[controls.IsAdmin]
type = "conditional"
bind = "Rules?IsAdmin"

[controls.Profile]
type = "variables"
bind = "App?Profile"

[statements]
Total = "42"

[variables."^"]
User = "ann"
"#;

    fn assert_validation_error(config: &Config, fragments: &[&str]) {
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation(_)),
            "Expected ConfigError::Validation, got {err:?}"
        );
        let message = err.to_string();
        for fragment in fragments {
            assert!(message.contains(fragment), "{message:?} lacks {fragment:?}");
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/test"));
        assert!(!config.render.debugging);
        assert!(config.render.partial_cache);
        assert_eq!(config.render.worker_threads, 0);
        assert_eq!(
            config.domain_resolved.templates_dir,
            PathBuf::from("/test/templates")
        );
        assert_eq!(config.domain_resolved.hash_code, "0");
        assert_eq!(config.domain_resolved.language, "en");
        assert!(config.domain_resolved.security_executable.is_none());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.binds.is_empty());
        assert!(config.controls.is_empty());
        assert!(config.render.partial_cache);
    }

    #[test]
    fn test_parse_full_config() {
        let mut config: Config = toml::from_str(FULL).unwrap();
        config.resolve_paths(Path::new("/project"));

        assert!(config.render.debugging);
        assert_eq!(config.render.worker_threads, 4);
        assert_eq!(
            config.domain_resolved.security_executable.as_deref(),
            Some("Security")
        );
        assert_eq!(
            config.domain_resolved.templates_dir,
            PathBuf::from("/project/views")
        );
        assert_eq!(config.domain_resolved.hash_code, "42");
        assert_eq!(
            config.translations().unwrap().get("GREETING").map(String::as_str),
            Some("Hallo {0}")
        );
        assert_eq!(config.binds["Rules?IsAdmin"], "true");
        assert_eq!(config.controls["IsAdmin"].kind, ControlKind::Conditional);
        assert_eq!(config.controls["Profile"].kind, ControlKind::Variables);
        assert_eq!(
            config.controls["Profile"].bind.as_deref(),
            Some("App?Profile")
        );
        assert_eq!(config.statements["Total"], "42");
        assert_eq!(config.variables["^"]["User"], "ann");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_variable_prefix() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config
            .variables
            .insert("%".to_owned(), HashMap::from([("X".to_owned(), "y".to_owned())]));
        assert_validation_error(&config, &["variables", "%"]);
    }

    #[test]
    fn test_unknown_control_type_rejected() {
        let toml = r#"
[controls.X]
type = "loop"
"#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn test_apply_cli_settings() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.apply_cli_settings(&CliSettings {
            debugging: Some(true),
            language: Some("fr".to_owned()),
            ..Default::default()
        });

        assert!(config.render.debugging);
        assert!(!config.render.analytics);
        assert_eq!(config.domain_resolved.language, "fr");
        assert_eq!(
            config.domain_resolved.templates_dir,
            PathBuf::from("/test/templates")
        );
    }

    #[test]
    fn test_validate_default_config_passes() {
        let config = Config::default_with_base(Path::new("/test"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_worker_threads() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.render.worker_threads = 10_000;
        assert_validation_error(&config, &["render.worker_threads", "512"]);
    }

    #[test]
    fn test_validate_security_executable() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.domain_resolved.security_executable = Some(String::new());
        assert_validation_error(&config, &["domain.security_executable", "empty"]);

        config.domain_resolved.security_executable = Some("Sec?Check".to_owned());
        assert_validation_error(&config, &["domain.security_executable", "bare"]);
    }

    #[test]
    fn test_validate_language() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.domain_resolved.language = " ".to_owned();
        assert_validation_error(&config, &["domain.language"]);
    }

    #[test]
    fn test_validate_control_bind() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.controls.insert(
            "IsAdmin".to_owned(),
            ControlConfig {
                kind: ControlKind::Conditional,
                bind: Some("IsAdmin".to_owned()),
            },
        );
        assert_validation_error(&config, &["controls.IsAdmin.bind"]);
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, FULL).unwrap();

        let settings = CliSettings {
            worker_threads: Some(2),
            ..Default::default()
        };
        let config = Config::load(Some(&path), Some(&settings)).unwrap();

        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
        assert_eq!(config.render.worker_threads, 2);
        assert_eq!(config.domain_resolved.templates_dir, dir.path().join("views"));
    }

    #[test]
    fn test_load_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = Config::load(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[render\n").unwrap();
        let err = Config::load(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_discover_config_in_parent() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("site/pages");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME), "").unwrap();

        let found = Config::discover_config(&nested).unwrap();
        assert_eq!(found, dir.path().join(CONFIG_FILENAME));
    }

    #[test]
    fn test_expand_env_in_domain() {
        // SAFETY: the variable name is unique to this test
        unsafe {
            std::env::set_var("WEFT_TEST_SECURITY", "Guard");
        }
        let mut config: Config = toml::from_str(
            r#"
[domain]
security_executable = "${WEFT_TEST_SECURITY}"
templates_dir = "${WEFT_TEST_UNSET_TEMPLATES:-views}"
"#,
        )
        .unwrap();
        config.expand_env_vars().unwrap();
        config.resolve_paths(Path::new("/project"));
        unsafe {
            std::env::remove_var("WEFT_TEST_SECURITY");
        }

        assert_eq!(
            config.domain_resolved.security_executable.as_deref(),
            Some("Guard")
        );
        assert_eq!(
            config.domain_resolved.templates_dir,
            PathBuf::from("/project/views")
        );
    }
}
