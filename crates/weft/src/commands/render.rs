//! `weft render` command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use weft_config::{CliSettings, Config};
use weft_engine::{Arguments, Engine, EngineConfig, RenderOptions};

use crate::error::CliError;
use crate::output::Output;
use crate::static_domain::{StaticDomain, StaticInvoker};

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Template file to render.
    template: PathBuf,

    /// Path to configuration file (default: auto-discover weft.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Template argument as `key=value` (repeatable).
    #[arg(short = 'a', long = "arg", value_parser = parse_argument)]
    arguments: Vec<(String, String)>,

    /// Render diagnostic fragments in place of failed directives.
    #[arg(long)]
    debug: bool,

    /// Log per-directive timings at debug level.
    #[arg(long)]
    analytics: bool,

    /// Render only the named update block (repeatable, last one wins).
    #[arg(long = "update-block")]
    update_blocks: Vec<String>,

    /// Translation language (overrides config).
    #[arg(long)]
    language: Option<String>,

    /// Templates directory for `$T:` directives (overrides config).
    #[arg(long)]
    templates_dir: Option<PathBuf>,

    /// Worker pool size (overrides config).
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_argument(raw: &str) -> Result<(String, String), String> {
    Arguments::parse_pair(raw).ok_or_else(|| format!("expected key=value, got `{raw}`"))
}

impl RenderArgs {
    /// Execute the render command.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            debugging: self.debug.then_some(true),
            analytics: self.analytics.then_some(true),
            worker_threads: self.threads,
            language: self.language,
            templates_dir: self.templates_dir,
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        if let Some(path) = &config.config_path {
            tracing::info!(config = %path.display(), "Loaded configuration");
        }

        let template =
            std::fs::read_to_string(&self.template).map_err(|source| CliError::Template {
                path: self.template.display().to_string(),
                source,
            })?;

        let engine = Engine::new(
            EngineConfig::new()
                .with_worker_threads(config.render.worker_threads)
                .with_partial_cache(config.render.partial_cache),
        )?;
        tracing::info!(
            template = %self.template.display(),
            workers = engine.worker_threads(),
            "Rendering template"
        );

        let options = render_options(&config, self.arguments, self.update_blocks);
        let rendered = engine.render(
            &template,
            Arc::new(StaticDomain::new(&config)),
            Arc::new(StaticInvoker::new(&config)),
            options,
        );

        output.text(&rendered.text)?;
        if let Some(location) = &rendered.redirect {
            output.notice(&format!("Redirect requested: {location}"));
        }
        if rendered.has_inline_error {
            let hint = if config.render.debugging {
                ""
            } else {
                " (use --debug to see them)"
            };
            output.warning(&format!("Template rendered with inline errors{hint}"));
        }
        Ok(())
    }
}

fn render_options(
    config: &Config,
    arguments: Vec<(String, String)>,
    update_blocks: Vec<String>,
) -> RenderOptions {
    let options = RenderOptions::new()
        .with_debugging(config.render.debugging)
        .with_analytics(config.render.analytics)
        .with_hash_code(config.domain_resolved.hash_code.clone())
        .with_cache_scope(config.domain_resolved.language.clone());
    let options = arguments
        .into_iter()
        .fold(options, |options, (key, value)| options.with_argument(key, value));
    update_blocks
        .into_iter()
        .fold(options, RenderOptions::with_update_block)
}
