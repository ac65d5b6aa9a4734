//! Configuration management for retfix
//!
//! retfix reads ~/.retfix/config.toml unless --config points elsewhere

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::pattern::PatternRule;
use crate::rewriter::EngineKind;
use crate::rules::RuleSet;

pub const DEFAULT_TARGET: &str = "models/cart_items.ts";
const MAX_CONTEXT_LINES: usize = 10;

/// retfix configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// What to rewrite and how
    #[serde(default)]
    pub target: TargetConfig,

    /// Rule parameters shared by both engines
    #[serde(default)]
    pub rules: RuleSet,

    /// Custom regex rules; replaces the default list for the regex engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patterns: Option<Vec<PatternRule>>,

    /// Backup settings
    #[serde(default)]
    pub backup: BackupConfig,

    /// Preview settings
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Log settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Handler file rewritten when no FILE argument is given
    pub path: PathBuf,

    /// "syntax" or "regex"
    pub engine: EngineKind,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_TARGET),
            engine: EngineKind::Syntax,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Back up the file before rewriting it
    pub enabled: bool,

    /// Custom backup directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<String>,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backup_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Number of context lines shown around changes
    pub context_lines: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self { context_lines: 2 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Also write logs to ~/.retfix/retfix.log
    pub debug: bool,
}

/// Get the retfix home directory (~/.retfix)
pub fn retfix_home() -> Result<PathBuf> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home_dir.join(".retfix"))
}

/// Get the configuration file path
pub fn config_file_path() -> Result<PathBuf> {
    let config_dir = retfix_home()?;
    fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;

    Ok(config_dir.join("config.toml"))
}

/// Get the default configuration file content with comments
fn get_default_config_content() -> &'static str {
    r#"# retfix configuration file
#
# Command-line flags override values set here.
# Run `retfix config --show` to print the effective configuration.

[target]
# Handler file rewritten when no FILE argument is given
path = "models/cart_items.ts"

# "syntax" (TypeScript parse, default) or "regex" (pattern list)
engine = "syntax"

[rules]
# Response object and the call chain that gets split:
#   return res.status(..).json(..);  ->  res.status(..).json(..)
#                                        return;
response = "res"
status_method = "status"
send_method = "json"

# Indentation placed before the bare `return;` (12 spaces)
return_indent = "            "

# Reuse the rewritten statement's own indentation instead of return_indent
# (syntax engine only; the regex engine always uses return_indent)
match_statement_indent = false

# Keep the `;` after the expression
keep_terminator = false

# Handler registrations that get the return type:
#   cart_items.post(path, authMiddleware, async (req, res): Promise<void> => {
routers = ["cart_items"]
middleware = "authMiddleware"
return_type = "Promise<void>"

# Custom rules for the regex engine; when present they replace the two
# built-in rules. Replacements use $1 / ${name} for capture groups.
#[[patterns]]
#name = "send"
#pattern = 'return (res\.send\([^;]*\));'
#replacement = "$1;\n            return;"

[backup]
# Back up the file before rewriting it (default: true)
enabled = true

# Custom backup directory (optional, default: ~/.retfix/backups)
#backup_dir = "/mnt/backups/retfix"

[processing]
# Context lines shown around changes in previews (default: 2, max: 10)
context_lines = 2

[logging]
# Also write logs to ~/.retfix/retfix.log
debug = false
"#
}

/// Save the default commented configuration file
pub fn save_default_config(config_path: &Path) -> Result<()> {
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
    }

    fs::write(config_path, get_default_config_content()).with_context(|| {
        format!("Failed to write default config file: {}", config_path.display())
    })?;

    Ok(())
}

/// Parse configuration text
pub fn parse_config(config_str: &str) -> Result<Config> {
    let config: Config = toml::from_str(config_str).context("Failed to parse config")?;
    Ok(config)
}

/// Load configuration
///
/// With an explicit path the file must exist and parse. Without one,
/// ~/.retfix/config.toml is read through [`load_config_at`].
///
/// The second value is a warning for the caller to log once logging is up.
pub fn load_config(explicit: Option<&Path>) -> Result<(Config, Option<String>)> {
    if let Some(path) = explicit {
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = parse_config(&config_str)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        validate_config(&config)?;
        return Ok((config, None));
    }

    load_config_at(&config_file_path()?)
}

/// Load the config file at `config_path`, creating it with defaults when
/// missing. A malformed file yields the defaults plus a warning.
pub fn load_config_at(config_path: &Path) -> Result<(Config, Option<String>)> {
    if !config_path.exists() {
        save_default_config(config_path)?;
    }

    let config_str = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

    let config = match parse_config(&config_str) {
        Ok(config) => config,
        Err(e) => {
            let warning = format!(
                "ignoring malformed config {}: {:#}; using defaults",
                config_path.display(),
                e
            );
            return Ok((Config::default(), Some(warning)));
        }
    };

    validate_config(&config)?;
    Ok((config, None))
}

/// Render the effective configuration
pub fn render_config(config: &Config) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to serialize config")
}

/// Validate configuration values
pub fn validate_config(config: &Config) -> Result<()> {
    if config.target.path.as_os_str().is_empty() {
        anyhow::bail!("Invalid target.path: must not be empty");
    }

    config.rules.validate()?;

    if let Some(patterns) = &config.patterns {
        if patterns.is_empty() {
            anyhow::bail!("Invalid patterns: list is empty (remove it to use the built-in rules)");
        }
        for rule in patterns {
            if rule.name.trim().is_empty() {
                anyhow::bail!("Invalid pattern rule: name must not be empty");
            }
            regex::Regex::new(&rule.pattern)
                .with_context(|| format!("Invalid regex in rule '{}'", rule.name))?;
        }
    }

    if config.processing.context_lines > MAX_CONTEXT_LINES {
        anyhow::bail!(
            "Invalid context_lines: {} (max {})",
            config.processing.context_lines,
            MAX_CONTEXT_LINES
        );
    }

    Ok(())
}
