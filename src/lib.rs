//! retfix: make Express route handlers return void
//!
//! Rewrites `return res.status(..).json(..);` into an expression statement
//! followed by a bare `return;`, and annotates handler registrations with
//! `: Promise<void>`. The binary is at src/main.rs.

pub mod backup_manager;
pub mod cli;
pub mod config;
pub mod diff_formatter;
pub mod edit;
pub mod error_helpers;
pub mod logger;
pub mod pattern;
pub mod rewriter;
pub mod rules;
pub mod syntax;

// Re-export commonly used types for convenience
pub use backup_manager::{BackupManager, BackupMetadata, FileBackup};
pub use config::Config;
pub use edit::{Edit, apply_edits};
pub use pattern::{PatternRewriter, PatternRule};
pub use rewriter::{EngineKind, FileRewrite, Rewrite, Rewriter, RuleHits};
pub use rules::{RuleKind, RuleSet};
pub use syntax::SyntaxRewriter;
