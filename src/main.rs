//! calc-mesh
//!
//! A four-role calculator whose inter-service calls survive outages.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────── edge ────────────────────────┐
//!   Client ──────▶│ handler ──▶ CallProtector ──▶ Transport ──▶ sum/subtract│
//!                 │    │        (retry + breaker)        ▲                 │
//!                 │    ▼ circuit open                    │ replay          │
//!                 │ QueueRegistry ──▶ TargetQueue ──▶ DrainWorker          │
//!                 │                                (health probe first)    │
//!                 └──────────────────────────────────────────────────────┘
//!
//!   sum / subtract ──▶ CallProtector ──▶ history   (same queue + drain path)
//! ```
//!
//! Trace context rides in the outbound headers and in every queued record,
//! so a replay joins the trace of the request that failed.

use std::path::PathBuf;

use calc_mesh::lifecycle::startup;
use calc_mesh::ServiceRole;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "calc-mesh", version, about = "Calculator services with resilient outbound delivery")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve one role
    Serve {
        #[arg(short, long, value_enum)]
        role: ServiceRole,

        /// TOML configuration file; defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { role, config } => {
            startup::run(role, config.as_deref()).await?;
        }
    }

    Ok(())
}
