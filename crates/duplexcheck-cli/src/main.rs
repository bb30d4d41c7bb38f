//! duplexcheck CLI
//!
//! Tests one TCP connection against a scripted conversation.
//!
//! ## Usage
//!
//! ```bash
//! # Wait for one connection on port 9999 and run the built-in script
//! duplexcheck serve
//!
//! # Run your own script with a 2 second race-detection window
//! duplexcheck serve --script hello.txt --write-delay-ms 2000 --log-level all
//!
//! # Save what happened as JSONL
//! duplexcheck serve --script hello.txt --transcript run.jsonl
//!
//! # Parse a script and list its directives without running it
//! duplexcheck check hello.txt
//! ```
//!
//! Then connect with `telnet localhost 9999` and play the stream under test.

mod script_file;
mod serve;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use duplexcheck_core::{LogLevel, Verdict};

use script_file::{ScriptFile, DEFAULT_SCRIPT};
use serve::ServeOptions;

/// duplexcheck - scripted tests for duplex streams
#[derive(Parser)]
#[command(name = "duplexcheck")]
#[command(version = "0.1.0")]
#[command(about = "duplexcheck - scripted tests for duplex streams")]
#[command(
    long_about = "Runs a scripted conversation against a single TCP connection, failing on the first out-of-order or incorrect line."
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Accept one connection and test it against a script
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:9999")]
        bind: SocketAddr,

        /// Script file (default: built-in greeting script)
        #[arg(short, long)]
        script: Option<PathBuf>,

        /// Race-detection window before each write, in milliseconds
        #[arg(long, default_value_t = 2000)]
        write_delay_ms: u64,

        /// Tester log categories: none, info, input, output, internals, interaction, all
        #[arg(long, default_value = "all")]
        log_level: LogLevel,

        /// Write the run transcript here as JSONL
        #[arg(short, long)]
        transcript: Option<PathBuf>,
    },

    /// Parse a script and list its directives
    Check {
        /// Script file
        script: PathBuf,
    },
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn,duplexcheck_core=info",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_script(path: Option<&PathBuf>) -> Result<ScriptFile> {
    match path {
        Some(path) => ScriptFile::load(path)
            .with_context(|| format!("Failed to load script {}", path.display())),
        None => Ok(ScriptFile::parse(DEFAULT_SCRIPT)?),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match cli.command {
        Commands::Serve {
            bind,
            script,
            write_delay_ms,
            log_level,
            transcript,
        } => {
            let options = ServeOptions {
                bind,
                write_delay: Duration::from_millis(write_delay_ms),
                log_level,
                script: load_script(script.as_ref())?,
            };

            let (verdict, record) = serve::serve(options, |addr| {
                println!("Listening on {}", addr);
            })
            .await?;

            if let Some(path) = transcript {
                record
                    .write_jsonl(&path)
                    .with_context(|| format!("Failed to write transcript {}", path.display()))?;
                println!("Transcript: {}", path.display());
            }

            match verdict {
                Verdict::Passed => println!("PASSED"),
                Verdict::Failed(violation) => {
                    println!("FAILED");
                    anyhow::bail!("{}", violation);
                }
            }
        }

        Commands::Check { script } => {
            let parsed = load_script(Some(&script))?;
            println!("{} directives", parsed.steps().len());
            for (i, step) in parsed.steps().iter().enumerate() {
                println!("  {:>3}. {}", i + 1, step);
            }
        }
    }

    Ok(())
}
