use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::backup_manager::BackupManager;
use crate::edit::apply_edits;
use crate::error_helpers;
use crate::pattern::{PatternRewriter, PatternRule};
use crate::rules::{RuleKind, RuleSet};
use crate::syntax::{SyntaxRewriter, line_ending};

/// Which implementation of the rules to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// tree-sitter TypeScript parse, span edits
    #[default]
    Syntax,
    /// Ordered regex substitutions
    Regex,
}

impl EngineKind {
    pub fn name(&self) -> &'static str {
        match self {
            EngineKind::Syntax => "syntax",
            EngineKind::Regex => "regex",
        }
    }
}

/// How many times one rule fired
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleHits {
    pub rule: String,
    pub count: usize,
}

/// Result of rewriting a source string
#[derive(Debug, Clone)]
pub struct Rewrite {
    pub text: String,
    pub applied: Vec<RuleHits>,
}

impl Rewrite {
    pub fn total(&self) -> usize {
        self.applied.iter().map(|h| h.count).sum()
    }
}

/// Result of rewriting a file, before anything is written
#[derive(Debug, Clone)]
pub struct FileRewrite {
    pub file_path: String,
    pub original: String,
    pub rewrite: Rewrite,
}

impl FileRewrite {
    pub fn is_changed(&self) -> bool {
        self.original != self.rewrite.text
    }
}

enum Engine {
    Syntax(SyntaxRewriter),
    /// `None` derives the default list from the rule set for each file
    Regex(Option<PatternRewriter>),
}

pub struct Rewriter {
    engine: Engine,
    rules: RuleSet,
}

impl Rewriter {
    /// `patterns` replaces the regex engine's default rule list; the syntax
    /// engine ignores it.
    pub fn new(
        kind: EngineKind,
        rules: RuleSet,
        patterns: Option<Vec<PatternRule>>,
    ) -> Result<Self> {
        rules.validate()?;

        if kind == EngineKind::Regex && patterns.is_none() && rules.match_statement_indent {
            warn!(
                "match_statement_indent is not supported by the regex engine; \
                 using return_indent"
            );
        }

        let engine = match kind {
            EngineKind::Syntax => Engine::Syntax(SyntaxRewriter::new(rules.clone())?),
            EngineKind::Regex => Engine::Regex(
                patterns
                    .as_deref()
                    .map(PatternRewriter::new)
                    .transpose()?,
            ),
        };

        Ok(Self { engine, rules })
    }

    pub fn engine_kind(&self) -> EngineKind {
        match self.engine {
            Engine::Syntax(_) => EngineKind::Syntax,
            Engine::Regex(_) => EngineKind::Regex,
        }
    }

    /// Apply both rules to `source`
    pub fn rewrite_str(&mut self, source: &str) -> Result<Rewrite> {
        match &mut self.engine {
            Engine::Syntax(syntax) => {
                let edits = syntax.collect_edits(source)?;
                let (text, applied) = apply_edits(source, edits)?;

                let applied = [RuleKind::ReturnStatement, RuleKind::HandlerSignature]
                    .into_iter()
                    .map(|kind| RuleHits {
                        rule: kind.name().to_string(),
                        count: applied.iter().filter(|e| e.rule == kind).count(),
                    })
                    .collect();

                Ok(Rewrite { text, applied })
            }
            Engine::Regex(Some(custom)) => {
                let (text, applied) = custom.rewrite(source);
                Ok(Rewrite { text, applied })
            }
            Engine::Regex(None) => {
                let patterns = self.rules.default_patterns(line_ending(source));
                let defaults = PatternRewriter::new(&patterns)?;
                let (text, applied) = defaults.rewrite(source);
                Ok(Rewrite { text, applied })
            }
        }
    }

    /// Read `file_path` and rewrite it in memory
    pub fn process_file(&mut self, file_path: &Path) -> Result<FileRewrite> {
        let original = read_source(file_path)?;
        let rewrite = self.rewrite_str(&original)?;

        for hits in &rewrite.applied {
            debug!(file = %file_path.display(), rule = %hits.rule, count = hits.count, "rule hits");
        }

        Ok(FileRewrite {
            file_path: file_path.display().to_string(),
            original,
            rewrite,
        })
    }

    /// Rewrite `file_path` in place. A backup is taken first when `backup`
    /// is given; unchanged files are neither backed up nor rewritten.
    ///
    /// Returns the rewrite and the backup id, if one was created.
    pub fn apply_to_file(
        &mut self,
        file_path: &Path,
        backup: Option<&mut BackupManager>,
    ) -> Result<(FileRewrite, Option<String>)> {
        let result = self.process_file(file_path)?;

        if !result.is_changed() {
            info!(file = %file_path.display(), "no rule matched; file left as is");
            return Ok((result, None));
        }

        let backup_id = match backup {
            Some(manager) => {
                let description =
                    format!("{} engine on {}", self.engine_kind().name(), result.file_path);
                Some(manager.create_backup(&description, &[file_path.to_path_buf()])?)
            }
            None => None,
        };

        write_atomic(file_path, &result.rewrite.text)?;
        info!(
            file = %file_path.display(),
            changes = result.rewrite.total(),
            "rewrote file"
        );

        Ok((result, backup_id))
    }
}

/// The line printed after a file has been processed
pub fn confirmation(file_path: &Path) -> String {
    format!("Fixed TypeScript return types in {}", file_path.display())
}

/// Read the whole file as UTF-8
pub fn read_source(file_path: &Path) -> Result<String> {
    let bytes = match fs::read(file_path) {
        Ok(bytes) => bytes,
        Err(e) if error_helpers::is_not_found(&e) => {
            anyhow::bail!(error_helpers::not_found_error(file_path, "reading handler source"))
        }
        Err(e) if error_helpers::is_permission_denied(&e) => {
            anyhow::bail!(error_helpers::permission_error(file_path, "reading"))
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read file: {}", file_path.display()));
        }
    };

    String::from_utf8(bytes)
        .map_err(|e| anyhow::anyhow!(error_helpers::encoding_error(file_path, &e)))
}

/// Write through a temp file in the same directory, then rename over the
/// target. The target's permissions are carried over.
pub fn write_atomic(file_path: &Path, content: &str) -> Result<()> {
    let parent_dir = file_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let mut temp_file = NamedTempFile::new_in(parent_dir).map_err(|e| {
        if error_helpers::is_permission_denied(&e) {
            anyhow::anyhow!(error_helpers::permission_error(parent_dir, "creating a temp file in"))
        } else {
            anyhow::Error::new(e)
                .context(format!("Failed to create temp file in {}", parent_dir.display()))
        }
    })?;

    temp_file
        .write_all(content.as_bytes())
        .context("Failed to write temp file")?;
    temp_file
        .as_file()
        .sync_all()
        .context("Failed to flush temp file")?;

    match fs::metadata(file_path) {
        Ok(metadata) => {
            fs::set_permissions(temp_file.path(), metadata.permissions()).with_context(|| {
                format!("Failed to copy permissions of {}", file_path.display())
            })?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to stat {}", file_path.display()));
        }
    }

    temp_file
        .persist(file_path)
        .with_context(|| format!("Failed to persist temp file to {}", file_path.display()))?;

    Ok(())
}
