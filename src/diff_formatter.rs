use colored::*;
use similar::{ChangeTag, TextDiff};
use std::io::IsTerminal;

use crate::backup_manager::BackupMetadata;
use crate::rewriter::FileRewrite;

pub struct DiffFormatter;

impl DiffFormatter {
    /// Auto-detect if we should use colors
    fn should_use_color() -> bool {
        // Check NO_COLOR env var (https://no-color.org/)
        if std::env::var("NO_COLOR").is_ok() {
            return false;
        }

        std::io::stdout().is_terminal()
    }

    /// Format the change preview for one file
    pub fn format_diff(result: &FileRewrite, context_size: usize) -> String {
        Self::format_diff_colored(result, context_size, Self::should_use_color())
    }

    fn format_diff_colored(result: &FileRewrite, context_size: usize, use_color: bool) -> String {
        let mut output = String::new();

        if use_color {
            output.push_str(&format!("{}\n", result.file_path.bold().cyan()));
        } else {
            output.push_str(&format!("{}\n", result.file_path));
        }

        let diff = TextDiff::from_lines(&result.original, &result.rewrite.text);

        for (i, group) in diff.grouped_ops(context_size).iter().enumerate() {
            if i > 0 {
                if use_color {
                    output.push_str(&format!("{}\n", "...".dimmed()));
                } else {
                    output.push_str("...\n");
                }
            }

            for op in group {
                for change in diff.iter_changes(op) {
                    let (indicator, line_num) = match change.tag() {
                        ChangeTag::Equal => ("=", change.new_index()),
                        ChangeTag::Delete => ("-", change.old_index()),
                        ChangeTag::Insert => ("+", change.new_index()),
                    };
                    let line_num = line_num.map_or(0, |n| n + 1);
                    let content = change.value().trim_end_matches(['\n', '\r']);

                    if use_color {
                        let line = match change.tag() {
                            ChangeTag::Equal => format!(
                                "L{}: {} {}\n",
                                line_num,
                                indicator.dimmed(),
                                content.dimmed()
                            ),
                            ChangeTag::Delete => format!(
                                "L{}: {} {}\n",
                                line_num,
                                indicator.red().bold(),
                                content.red()
                            ),
                            ChangeTag::Insert => format!(
                                "L{}: {} {}\n",
                                line_num,
                                indicator.green().bold(),
                                content.green().bold()
                            ),
                        };
                        output.push_str(&line);
                    } else {
                        output.push_str(&format!("L{}: {} {}\n", line_num, indicator, content));
                    }
                }
            }
        }

        output.push_str(&Self::format_summary(result, use_color));
        output
    }

    /// "Total: 3 changes (2 return-statement, 1 handler-signature)"
    fn format_summary(result: &FileRewrite, use_color: bool) -> String {
        let total = result.rewrite.total();
        let parts: Vec<String> = result
            .rewrite
            .applied
            .iter()
            .filter(|h| h.count > 0)
            .map(|h| {
                if use_color {
                    format!("{} {}", h.count, h.rule.yellow())
                } else {
                    format!("{} {}", h.count, h.rule)
                }
            })
            .collect();

        let mut line = if use_color {
            format!("\nTotal: {} change", total.to_string().bold().white())
        } else {
            format!("\nTotal: {} change", total)
        };
        if total != 1 {
            line.push('s');
        }
        if !parts.is_empty() {
            line.push_str(&format!(" ({})", parts.join(", ")));
        }
        line.push('\n');
        line
    }

    /// Header printed before dry-run output
    pub fn format_dry_run_header(engine: &str) -> String {
        let use_color = Self::should_use_color();
        if use_color {
            format!(
                "{} {} {}\n",
                "Dry run:".yellow().bold(),
                "engine".dimmed(),
                engine.cyan()
            )
        } else {
            format!("Dry run: engine {}\n", engine)
        }
    }

    /// Format backup history, newest first
    pub fn format_history(backups: Vec<BackupMetadata>) -> String {
        Self::format_history_colored(backups, Self::should_use_color())
    }

    fn format_history_colored(backups: Vec<BackupMetadata>, use_color: bool) -> String {
        if backups.is_empty() {
            return "No backups found.".to_string();
        }

        let mut output = String::new();
        if use_color {
            output.push_str(&format!("{}\n\n", "Backup history:".bold()));
        } else {
            output.push_str("Backup history:\n\n");
        }

        for backup in backups.iter().rev() {
            let timestamp = backup.timestamp.format("%Y-%m-%d %H:%M:%S").to_string();
            if use_color {
                output.push_str(&format!(
                    "{}  {}  {}\n",
                    backup.id.cyan(),
                    timestamp.dimmed(),
                    backup.description
                ));
            } else {
                output.push_str(&format!("{}  {}  {}\n", backup.id, timestamp, backup.description));
            }
            for file in &backup.files {
                output.push_str(&format!("    {}\n", file.original_path.display()));
            }
        }

        output
    }
}
