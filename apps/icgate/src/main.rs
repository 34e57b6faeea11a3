//! # icgate - Investment-Committee Gate Workflow
//!
//! The main binary for the IC gate workflow.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │              apps/icgate (THE BINARY)         │
//! │                                               │
//! │   ┌──────────────┐      ┌────────────────┐    │
//! │   │     CLI      │      │  TOML config   │    │
//! │   │    (clap)    │      │ gates/committee│    │
//! │   └──────┬───────┘      └───────┬────────┘    │
//! │          └──────────┬───────────┘             │
//! │                     ▼                         │
//! │             ┌───────────────┐                 │
//! │             │  icgate-core  │                 │
//! │             │  (THE LOGIC)  │                 │
//! │             └───────────────┘                 │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! icgate advance deal-42 --to IOI -a market_analysis -a ioi_letter --actor ana
//! icgate approve deal-42 --gate IC1 --member alice --vote approve
//! icgate check deal-42
//! icgate metrics --window-days 30
//! ```

use clap::Parser;
use icgate::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Initialize tracing. ICGATE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("ICGATE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "icgate=debug,icgate_core=debug"
    } else {
        "icgate=info,icgate_core=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    // Display startup banner
    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli) {
        tracing::error!(kind = e.kind(), "Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the icgate startup banner.
fn print_banner() {
    println!(
        r#"
  ██╗ ██████╗ ██████╗  █████╗ ████████╗███████╗
  ██║██╔════╝██╔════╝ ██╔══██╗╚══██╔══╝██╔════╝
  ██║██║     ██║  ███╗███████║   ██║   █████╗
  ██║██║     ██║   ██║██╔══██║   ██║   ██╔══╝
  ██║╚██████╗╚██████╔╝██║  ██║   ██║   ███████╗
  ╚═╝ ╚═════╝ ╚═════╝ ╚═╝  ╚═╝   ╚═╝   ╚══════╝

  Investment-Committee Gate Workflow v{}

  Ordered • Quorum-gated • Audited
"#,
        env!("CARGO_PKG_VERSION")
    );
}
