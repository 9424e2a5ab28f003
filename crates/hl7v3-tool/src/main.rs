//! HL7 v3 envelope tool.
//!
//! Inspects, validates and acknowledges transmission wrapper documents.

mod commands;
mod config;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use commands::{DEFAULT_ACK_INTERACTION, Expectation};
use config::{ToolConfig, init_logging};

#[derive(Debug, Parser)]
#[command(name = "hl7v3")]
#[command(about = "Inspect, validate and acknowledge HL7 v3 envelopes")]
struct Cli {
    #[command(flatten)]
    config: ToolConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse, classify and summarize an envelope.
    Inspect {
        file: PathBuf,

        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Check that an envelope is a valid request or reply.
    Validate {
        file: PathBuf,

        #[arg(long, value_enum)]
        expect: Expectation,
    },
    /// Write an acknowledgement for a request.
    Ack {
        file: PathBuf,

        /// Interaction of the acknowledgement envelope.
        #[arg(long, default_value = DEFAULT_ACK_INTERACTION)]
        interaction: String,

        /// Output file; standard output when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.config.log_level);

    if let Err(errors) = cli.config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    info!(
        version = %cli.config.version,
        sender = %cli.config.sender,
        "Starting hl7v3 tool"
    );

    match cli.command {
        Command::Inspect { file, json } => {
            let stdout = io::stdout();
            commands::inspect(&file, json, &mut stdout.lock())?;
        }
        Command::Validate { file, expect } => match commands::validate(&file, expect)? {
            Ok(message) => println!("{}: valid {}", file.display(), message.kind()),
            Err(fault) => {
                eprintln!("{}: {}", file.display(), fault);
                std::process::exit(1);
            }
        },
        Command::Ack {
            file,
            interaction,
            output,
        } => {
            let reply = match output {
                Some(path) => {
                    let mut out = BufWriter::new(File::create(&path)?);
                    let reply = commands::acknowledge(&file, &interaction, &cli.config, &mut out)?;
                    out.flush()?;
                    reply
                }
                None => {
                    let stdout = io::stdout();
                    let mut out = stdout.lock();
                    let reply = commands::acknowledge(&file, &interaction, &cli.config, &mut out)?;
                    writeln!(out)?;
                    reply
                }
            };
            info!(
                message_id = %reply.wrapper().id(),
                kind = %reply.kind(),
                "Acknowledgement written"
            );
        }
    }

    Ok(())
}
