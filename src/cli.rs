use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::rewriter::EngineKind;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "

License: MIT
Rust Edition: 2024"
);

#[derive(Parser)]
#[command(name = "retfix")]
#[command(about = "Make Express route handlers return void")]
#[command(long_about = "retfix rewrites one TypeScript route handler file in place.

It applies two rules:
  1. `return res.status(X).json(Y);` becomes `res.status(X).json(Y)`
     followed by a bare `return;` on its own line.
  2. `cart_items.get(path, authMiddleware, async (req, res) => {` gets
     the return type: `async (req, res): Promise<void> => {`.

Running it again on a fixed file changes nothing.

ENGINES:
  syntax (default) - Parses the file as TypeScript; safe with nested
                     parentheses and multi-line call chains
  regex            - Ordered regex substitutions; custom rules can be
                     set with [[patterns]] in the config file

SAFETY:
  The file is written through a temporary file and renamed into place.
  A backup is taken first unless --no-backup --force is given.

EXAMPLES:
  retfix                              Fix the configured file (models/cart_items.ts)
  retfix src/routes/cart_items.ts     Fix a specific file
  retfix -d src/routes/cart_items.ts  Preview without writing
  retfix --engine regex file.ts       Use the regex rules
  retfix rollback                     Undo the last run")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_version = LONG_VERSION)]
#[command(propagate_version = true)]
struct Cli {
    /// Handler file to rewrite (default: [target] path from the config)
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Rewrite engine
    #[arg(long, value_enum, value_name = "ENGINE")]
    engine: Option<EngineArg>,

    /// Dry run mode (preview changes without applying)
    #[arg(short = 'd', long = "dry-run")]
    #[arg(help = "Preview changes without modifying the file")]
    dry_run: bool,

    /// Number of context lines to show (default: 2)
    #[arg(short = 'n', long, value_name = "NUM")]
    #[arg(help = "Number of context lines to show around changes in previews")]
    context: Option<usize>,

    /// Show the diff of applied changes
    #[arg(long)]
    diff: bool,

    /// Skip backup creation (requires --force)
    #[arg(long = "no-backup", requires = "force")]
    #[arg(help = "Skip creating a backup (requires --force)\nChanges cannot be rolled back!")]
    no_backup: bool,

    /// Force dangerous operations (use with --no-backup)
    #[arg(long = "force", requires = "no_backup")]
    force: bool,

    /// Custom backup directory
    #[arg(long, value_name = "DIR")]
    #[arg(help = "Use custom directory for backups\nDefault: ~/.retfix/backups/")]
    backup_dir: Option<String>,

    /// Configuration file (default: ~/.retfix/config.toml)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EngineArg {
    Syntax,
    Regex,
}

impl From<EngineArg> for EngineKind {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Syntax => EngineKind::Syntax,
            EngineArg::Regex => EngineKind::Regex,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Rollback a previous run
    #[command(long_about = "Restore the file from a backup.

If no backup ID is specified, rolls back the most recent run.
Use 'retfix history' to see all available backups.

EXAMPLES:
  retfix rollback                              Rollback last run
  retfix rollback 20250110-120000123-abc12345  Rollback specific backup")]
    Rollback {
        /// Backup ID to rollback (optional, defaults to last run)
        #[arg(value_name = "ID")]
        id: Option<String>,

        /// Backup directory to read from
        #[arg(long, value_name = "DIR")]
        backup_dir: Option<String>,
    },

    /// Show backup history
    History {
        /// Backup directory to read from
        #[arg(long, value_name = "DIR")]
        backup_dir: Option<String>,
    },

    /// Show or create the configuration file
    #[command(long_about = "Manage the configuration file.

Without --show, prints the configuration file location (creating it with
commented defaults if missing). With --show, prints the effective
configuration after defaults are applied.

EXAMPLES:
  retfix config                   Show config location
  retfix config --show            Show effective configuration")]
    Config {
        /// Print the effective configuration
        #[arg(long = "show")]
        show: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Args {
    Execute {
        file: Option<PathBuf>,
        engine: Option<EngineKind>,
        dry_run: bool,
        show_diff: bool,
        context: Option<usize>,
        no_backup: bool,
        backup_dir: Option<String>,
    },
    Rollback {
        id: Option<String>,
        backup_dir: Option<String>,
    },
    History {
        backup_dir: Option<String>,
    },
    Config {
        show: bool,
    },
}

/// Options shared by every subcommand
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalArgs {
    pub config: Option<PathBuf>,
    pub verbose: bool,
}

pub fn parse_args() -> Result<(GlobalArgs, Args)> {
    Ok(convert(Cli::parse()))
}

fn convert(cli: Cli) -> (GlobalArgs, Args) {
    let global = GlobalArgs {
        config: cli.config,
        verbose: cli.verbose,
    };

    let args = match cli.command {
        Some(Commands::Rollback { id, backup_dir }) => Args::Rollback {
            id,
            backup_dir: backup_dir.or(cli.backup_dir),
        },
        Some(Commands::History { backup_dir }) => Args::History {
            backup_dir: backup_dir.or(cli.backup_dir),
        },
        Some(Commands::Config { show }) => Args::Config { show },
        None => Args::Execute {
            file: cli.file,
            engine: cli.engine.map(EngineKind::from),
            dry_run: cli.dry_run,
            show_diff: cli.diff,
            context: cli.context,
            no_backup: cli.no_backup,
            backup_dir: cli.backup_dir,
        },
    };

    (global, args)
}
