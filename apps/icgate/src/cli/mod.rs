//! # icgate CLI Module
//!
//! This module implements the CLI interface for icgate.
//!
//! ## Available Commands
//!
//! - `init` - Create a deal at the first gate
//! - `advance` - Move a deal to the next gate, asserting its artifacts
//! - `approve` - Record a committee vote on the deal's current gate
//! - `check` - Show completion of a gate (artifacts and quorum)
//! - `status` - Show one deal, or every deal
//! - `history` - Show a deal's audit entries
//! - `bottlenecks` - List deals idle past their gate timeout
//! - `metrics` - Governance report over a window
//! - `catalog` - Show the configured gates and committee
//! - `digest` - Compute BLAKE3 digest of the audit trail

mod commands;

use clap::{Parser, Subcommand};
use icgate_core::GateError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// icgate - Investment-Committee gate workflow
///
/// Moves deals through Screen → IOI → LOI → IC1 → IC2 → Close, gating each
/// step on artifacts and weighted committee votes.
#[derive(Parser, Debug)]
#[command(name = "icgate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the deal ledger database
    #[arg(short = 'D', long, global = true, default_value = "icgate.redb")]
    pub database: PathBuf,

    /// Governance configuration (TOML); built-in gates and no committee if omitted
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a deal at the first gate (no-op if it exists)
    Init {
        /// Deal identifier
        deal_id: String,

        /// Who is creating the deal
        #[arg(long, default_value = icgate_core::primitives::SYSTEM_ACTOR)]
        actor: String,
    },

    /// Move a deal to the next gate
    Advance {
        /// Deal identifier
        deal_id: String,

        /// Target gate (must be the next gate)
        #[arg(short, long)]
        to: String,

        /// Artifact asserted as provided (repeat or comma-separate)
        #[arg(short, long = "artifact", value_delimiter = ',')]
        artifacts: Vec<String>,

        /// Who is advancing the deal
        #[arg(long)]
        actor: String,

        /// Free-text comment for the audit trail
        #[arg(long)]
        comment: Option<String>,
    },

    /// Record a committee vote on the deal's current gate
    Approve {
        /// Deal identifier
        deal_id: String,

        /// Gate being voted on
        #[arg(short, long)]
        gate: String,

        /// Voting member
        #[arg(short, long)]
        member: String,

        /// Vote value (approve, reject, abstain)
        #[arg(long)]
        vote: String,

        /// Free-text comment
        #[arg(long)]
        comment: Option<String>,

        /// Who submits the vote (defaults to the member)
        #[arg(long)]
        actor: Option<String>,
    },

    /// Show completion of a gate
    Check {
        /// Deal identifier
        deal_id: String,

        /// Gate to check (defaults to the deal's current gate)
        #[arg(short, long)]
        gate: Option<String>,
    },

    /// Show one deal, or every deal
    Status {
        /// Deal identifier
        deal_id: Option<String>,
    },

    /// Show a deal's audit entries
    History {
        /// Deal identifier
        deal_id: String,
    },

    /// List deals idle past their gate timeout
    Bottlenecks {
        /// Override every gate's timeout (hours)
        #[arg(long)]
        timeout_hours: Option<i64>,
    },

    /// Governance report
    Metrics {
        /// Report over the trailing N days (whole trail if omitted)
        #[arg(short, long)]
        window_days: Option<i64>,
    },

    /// Show the configured gates and committee
    Catalog,

    /// Compute BLAKE3 digest of the audit trail
    Digest,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), GateError> {
    let ctx = Context {
        database: cli.database,
        config: cli.config,
        json_mode: cli.json_mode,
        verbose: cli.verbose,
    };

    match cli.command {
        Some(Commands::Init { deal_id, actor }) => cmd_init(&ctx, &deal_id, &actor),
        Some(Commands::Advance {
            deal_id,
            to,
            artifacts,
            actor,
            comment,
        }) => cmd_advance(&ctx, &deal_id, &to, &artifacts, &actor, comment.as_deref()),
        Some(Commands::Approve {
            deal_id,
            gate,
            member,
            vote,
            comment,
            actor,
        }) => cmd_approve(
            &ctx,
            &deal_id,
            &gate,
            &member,
            &vote,
            comment.as_deref(),
            actor.as_deref(),
        ),
        Some(Commands::Check { deal_id, gate }) => cmd_check(&ctx, &deal_id, gate.as_deref()),
        Some(Commands::Status { deal_id }) => cmd_status(&ctx, deal_id.as_deref()),
        Some(Commands::History { deal_id }) => cmd_history(&ctx, &deal_id),
        Some(Commands::Bottlenecks { timeout_hours }) => cmd_bottlenecks(&ctx, timeout_hours),
        Some(Commands::Metrics { window_days }) => cmd_metrics(&ctx, window_days),
        Some(Commands::Catalog) => cmd_catalog(&ctx),
        Some(Commands::Digest) => cmd_digest(&ctx),
        None => {
            // No subcommand - show every deal by default
            cmd_status(&ctx, None)
        }
    }
}
