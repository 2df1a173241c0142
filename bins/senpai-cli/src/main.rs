mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "senpai-cli")]
#[command(about = "Senpai CLI - Grade submissions locally and inspect harness configuration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade one submission against a checker definition and print the report JSON
    Check {
        /// Checker definition (JSON)
        #[arg(short, long)]
        checker: PathBuf,

        /// Submitted source file
        #[arg(short, long)]
        submission: PathBuf,

        /// Message locale (en, fi)
        #[arg(short, long, default_value = "en")]
        locale: String,

        /// Language runner; defaults to the checker's language, then python
        #[arg(short = 'L', long)]
        language: Option<String>,

        /// Language configuration file (defaults to $SENPAI_LANGUAGES or config/languages.json)
        #[arg(long)]
        languages: Option<PathBuf>,

        /// Pretty-print the report
        #[arg(long, default_value = "false")]
        pretty: bool,
    },

    /// List configured language runners
    Languages {
        /// Language configuration file
        #[arg(long)]
        languages: Option<PathBuf>,
    },

    /// Print the default message catalog for one test mode
    Messages {
        /// Which catalog to print
        #[arg(short, long, value_enum, default_value = "function")]
        mode: CatalogKind,

        /// Message locale (en, fi)
        #[arg(short, long, default_value = "en")]
        locale: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CatalogKind {
    Load,
    Function,
    Program,
    Snippet,
}

fn main() -> Result<()> {
    // stdout carries the report; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            checker,
            submission,
            locale,
            language,
            languages,
            pretty,
        } => {
            commands::check(
                &checker,
                &submission,
                &locale,
                language.as_deref(),
                languages.as_deref(),
                pretty,
            )?;
        }
        Commands::Languages { languages } => {
            commands::list_languages(languages.as_deref())?;
        }
        Commands::Messages { mode, locale } => {
            commands::print_messages(mode, &locale)?;
        }
    }

    Ok(())
}
