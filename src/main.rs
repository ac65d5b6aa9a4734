use anyhow::Result;
use std::path::Path;
use tracing::{debug, warn};

use retfix::backup_manager::BackupManager;
use retfix::cli::{Args, GlobalArgs, parse_args};
use retfix::config::{self, Config};
use retfix::diff_formatter::DiffFormatter;
use retfix::logger;
use retfix::rewriter::{self, Rewriter};

fn main() -> Result<()> {
    let (global, args) = parse_args()?;
    let loaded = config::load_config(global.config.as_deref());

    // The config decides whether to log to a file, so its warnings wait for
    // the subscriber
    let debug_file = match &loaded {
        Ok((cfg, _)) if cfg.logging.debug => Some(logger::default_log_path()?),
        _ => None,
    };
    logger::init_logging(global.verbose, debug_file.as_deref())?;
    let (config, config_warning) = loaded?;
    if let Some(warning) = config_warning {
        warn!("{}", warning);
    }
    debug!(?config, "loaded configuration");

    match args {
        Args::Execute {
            file,
            engine,
            dry_run,
            show_diff,
            context,
            no_backup,
            backup_dir,
        } => {
            let file = file.unwrap_or_else(|| config.target.path.clone());
            let options = ExecuteOptions {
                engine: engine.unwrap_or(config.target.engine),
                dry_run,
                show_diff,
                context: context.unwrap_or(config.processing.context_lines),
                backup: !no_backup && config.backup.enabled,
                backup_dir: backup_dir.or_else(|| config.backup.backup_dir.clone()),
            };
            execute(&config, &file, &options)?;
        }
        Args::Rollback { id, backup_dir } => {
            rollback(id, backup_dir.or(config.backup.backup_dir))?;
        }
        Args::History { backup_dir } => {
            show_history(backup_dir.or(config.backup.backup_dir))?;
        }
        Args::Config { show } => {
            show_config(global, &config, show)?;
        }
    }

    Ok(())
}

struct ExecuteOptions {
    engine: rewriter::EngineKind,
    dry_run: bool,
    show_diff: bool,
    context: usize,
    backup: bool,
    backup_dir: Option<String>,
}

fn backup_manager(dir: Option<String>) -> Result<BackupManager> {
    match dir {
        Some(dir) => BackupManager::with_directory(dir),
        None => BackupManager::new(),
    }
}

fn execute(config: &Config, file: &Path, options: &ExecuteOptions) -> Result<()> {
    let mut rewriter =
        Rewriter::new(options.engine, config.rules.clone(), config.patterns.clone())?;

    if options.dry_run {
        let result = rewriter.process_file(file)?;
        print!("{}", DiffFormatter::format_dry_run_header(options.engine.name()));
        if result.is_changed() {
            print!("{}", DiffFormatter::format_diff(&result, options.context));
        } else {
            println!("No changes would be made to {}", file.display());
        }
        return Ok(());
    }

    let mut manager = if options.backup {
        Some(backup_manager(options.backup_dir.clone())?)
    } else {
        None
    };

    let (result, backup_id) = rewriter.apply_to_file(file, manager.as_mut())?;

    if options.show_diff && result.is_changed() {
        print!("{}", DiffFormatter::format_diff(&result, options.context));
    }

    println!("{}", rewriter::confirmation(file));

    if let Some(id) = backup_id {
        eprintln!("Backup ID: {} (rollback with: retfix rollback {})", id, id);
    }

    Ok(())
}

fn rollback(id: Option<String>, backup_dir: Option<String>) -> Result<()> {
    let manager = backup_manager(backup_dir)?;

    let backup_id = match id {
        Some(id) => id,
        None => match manager.get_last_backup_id()? {
            Some(id) => {
                println!("Rolling back last run: {}\n", id);
                id
            }
            None => {
                anyhow::bail!("No backups found to rollback");
            }
        },
    };

    for path in manager.restore_backup(&backup_id)? {
        println!("Restored: {}", path.display());
    }
    println!("\nRollback complete");

    Ok(())
}

fn show_history(backup_dir: Option<String>) -> Result<()> {
    let manager = backup_manager(backup_dir)?;
    let backups = manager.list_backups()?;

    println!("{}", DiffFormatter::format_history(backups));

    Ok(())
}

fn show_config(global: GlobalArgs, config: &Config, show: bool) -> Result<()> {
    if show {
        print!("{}", config::render_config(config)?);
        return Ok(());
    }

    let path = match global.config {
        Some(path) => path,
        None => config::config_file_path()?,
    };
    println!("Configuration file: {}", path.display());

    Ok(())
}
