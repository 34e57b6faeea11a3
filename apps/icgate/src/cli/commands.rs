//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use chrono::{TimeDelta, Utc};
use icgate_core::{
    ApprovalType, AuditDetails, AuditEntry, DealGateState, DealId, GateError, GateName,
    GateWorkflow, GovernanceConfig, MemberId, StorageBackend, TimeWindow,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

// =============================================================================
// CONTEXT
// =============================================================================

/// Global options shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub database: PathBuf,
    pub config: Option<PathBuf>,
    pub json_mode: bool,
    pub verbose: bool,
}

/// Open the redb ledger with the configured (or built-in) governance.
pub fn open_workflow(database: &Path, config: Option<&Path>) -> Result<GateWorkflow, GateError> {
    let config = match config {
        Some(path) => GovernanceConfig::load(path)?,
        None => GovernanceConfig::default(),
    };
    let (catalog, registry) = config.into_parts()?;
    let store = StorageBackend::with_redb(database)?;
    tracing::debug!(database = %database.display(), gates = catalog.len(), "Ledger opened");
    Ok(GateWorkflow::new(store, catalog, registry))
}

fn workflow(ctx: &Context) -> Result<GateWorkflow, GateError> {
    open_workflow(&ctx.database, ctx.config.as_deref())
}

fn print_json<T: Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

fn print_deal(state: &DealGateState) {
    println!("Deal:         {}", state.deal_id);
    println!("Gate:         {}", state.current_gate);
    println!("Entered:      {}", state.entered_at.to_rfc3339());
    println!("Last Updated: {}", state.last_updated.to_rfc3339());
}

fn format_secs(secs: Option<i64>) -> String {
    match secs {
        Some(secs) => format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60),
        None => "n/a".to_string(),
    }
}

fn hours(value: i64) -> Result<TimeDelta, GateError> {
    if value <= 0 {
        return Err(GateError::InvalidInput(format!(
            "timeout must be positive, got {} hours",
            value
        )));
    }
    TimeDelta::try_hours(value)
        .ok_or_else(|| GateError::InvalidInput(format!("timeout of {} hours is out of range", value)))
}

// =============================================================================
// STATE-CHANGING COMMANDS
// =============================================================================

/// Create a deal at the first gate.
pub fn cmd_init(ctx: &Context, deal_id: &str, actor: &str) -> Result<(), GateError> {
    let wf = workflow(ctx)?;
    let state = wf.initialize(&DealId::new(deal_id), actor)?;

    if ctx.json_mode {
        print_json(&state);
        return Ok(());
    }

    println!("Deal {} is at gate {}", state.deal_id, state.current_gate);
    Ok(())
}

/// Advance a deal to the next gate.
pub fn cmd_advance(
    ctx: &Context,
    deal_id: &str,
    to: &str,
    artifacts: &[String],
    actor: &str,
    comment: Option<&str>,
) -> Result<(), GateError> {
    let wf = workflow(ctx)?;
    let state = wf.advance(
        &DealId::new(deal_id),
        &GateName::new(to),
        artifacts,
        actor,
        comment,
    )?;

    if ctx.json_mode {
        print_json(&state);
        return Ok(());
    }

    println!("Advanced {} to {}", state.deal_id, state.current_gate);
    println!("Artifacts recorded: {}", artifacts.len());
    Ok(())
}

/// Record a committee vote.
pub fn cmd_approve(
    ctx: &Context,
    deal_id: &str,
    gate: &str,
    member: &str,
    vote: &str,
    comment: Option<&str>,
    actor: Option<&str>,
) -> Result<(), GateError> {
    let approval_type: ApprovalType = vote.parse()?;
    let wf = workflow(ctx)?;
    let record = wf.submit_approval(
        &DealId::new(deal_id),
        &GateName::new(gate),
        &MemberId::new(member),
        approval_type,
        comment,
        actor,
    )?;

    if ctx.json_mode {
        print_json(&record);
        return Ok(());
    }

    println!(
        "Recorded {} from {} on {} / {} (weight {})",
        record.approval_type, record.member_id, record.deal_id, record.gate, record.voting_weight
    );
    Ok(())
}

// =============================================================================
// READ COMMANDS
// =============================================================================

/// Show completion of a gate.
pub fn cmd_check(ctx: &Context, deal_id: &str, gate: Option<&str>) -> Result<(), GateError> {
    let wf = workflow(ctx)?;
    let deal = DealId::new(deal_id);
    let gate = match gate {
        Some(gate) => GateName::new(gate),
        None => match wf.deal_state(&deal)? {
            Some(state) => state.current_gate,
            None => wf.catalog()?.first_gate().name.clone(),
        },
    };
    let report = wf.check_completion(&deal, &gate)?;

    if ctx.json_mode {
        print_json(&report);
        return Ok(());
    }

    println!("Gate Completion: {} / {}", report.deal_id, report.gate);
    println!("================");
    match &report.current_gate {
        Some(current) if report.is_current => println!("Current gate:  {} (this gate)", current),
        Some(current) => println!("Current gate:  {}", current),
        None => println!("Current gate:  (deal not started)"),
    }
    println!();
    println!(
        "Artifacts:     {} / {} provided",
        report
            .artifacts
            .required
            .len()
            .saturating_sub(report.artifacts.missing.len()),
        report.artifacts.required.len()
    );
    for missing in &report.artifacts.missing {
        println!("  missing: {}", missing);
    }
    if report.quorum.required {
        println!(
            "Quorum:        {} of {} approving ({} needed) {}",
            report.quorum.tally.approve,
            report.quorum.total_weight,
            report.quorum.threshold,
            if report.quorum.met { "MET" } else { "NOT MET" }
        );
        println!(
            "Votes:         {} approve / {} reject / {} abstain ({} cast)",
            report.quorum.tally.approve,
            report.quorum.tally.reject,
            report.quorum.tally.abstain,
            report.quorum.tally.votes
        );
    } else {
        println!("Quorum:        not required");
    }
    if ctx.verbose {
        for record in wf.approvals(&deal, &gate)? {
            println!(
                "  {} {} (weight {})",
                record.member_id, record.approval_type, record.voting_weight
            );
        }
    }
    println!();
    println!("Complete:      {}", if report.complete { "yes" } else { "no" });
    Ok(())
}

/// Show one deal, or every deal.
pub fn cmd_status(ctx: &Context, deal_id: Option<&str>) -> Result<(), GateError> {
    let wf = workflow(ctx)?;

    match deal_id {
        Some(deal_id) => {
            let deal = DealId::new(deal_id);
            let state = wf.deal_state(&deal)?;
            if ctx.json_mode {
                print_json(&state);
                return Ok(());
            }
            match state {
                Some(state) => print_deal(&state),
                None => println!("Deal {} not found", deal),
            }
        }
        None => {
            let deals = wf.deals()?;
            if ctx.json_mode {
                print_json(&deals);
                return Ok(());
            }
            println!("icgate Deal Status");
            println!("==================");
            println!("Database: {:?}", ctx.database);
            println!("Deals:    {}", deals.len());
            println!();
            for state in &deals {
                println!(
                    "  {:<24} {:<8} since {}",
                    state.deal_id.as_str(),
                    state.current_gate.as_str(),
                    state.last_updated.to_rfc3339()
                );
            }
        }
    }
    Ok(())
}

fn describe(entry: &AuditEntry) -> String {
    match &entry.details {
        AuditDetails::DealCreated { initial_gate } => format!("created at {}", initial_gate),
        AuditDetails::GateAdvance {
            from,
            to,
            artifacts,
            comment,
        } => {
            let mut line = format!("{} -> {} [{}]", from, to, artifacts.join(", "));
            if let Some(comment) = comment {
                line.push_str(&format!(" \"{}\"", comment));
            }
            line
        }
        AuditDetails::ApprovalSubmitted {
            member_id,
            approval_type,
            voting_weight,
            comment,
        } => {
            let mut line = format!("{} {} (weight {})", member_id, approval_type, voting_weight);
            if let Some(comment) = comment {
                line.push_str(&format!(" \"{}\"", comment));
            }
            line
        }
    }
}

/// Show a deal's audit entries.
pub fn cmd_history(ctx: &Context, deal_id: &str) -> Result<(), GateError> {
    let wf = workflow(ctx)?;
    let entries = wf.history(&DealId::new(deal_id))?;

    if ctx.json_mode {
        print_json(&entries);
        return Ok(());
    }

    println!("Audit history for {} ({} entries)", deal_id, entries.len());
    println!();
    for entry in &entries {
        println!(
            "#{:<6} {} {:<18} {:<8} {:<12} {}",
            entry.sequence,
            entry.timestamp.to_rfc3339(),
            entry.action.as_str(),
            entry.gate.as_str(),
            entry.actor,
            describe(entry)
        );
    }
    Ok(())
}

/// List deals idle past their gate timeout.
pub fn cmd_bottlenecks(ctx: &Context, timeout_hours: Option<i64>) -> Result<(), GateError> {
    let timeout = timeout_hours.map(hours).transpose()?;
    let wf = workflow(ctx)?;
    let deals = wf.bottlenecked_deals(timeout)?;

    if ctx.json_mode {
        print_json(&deals);
        return Ok(());
    }

    if deals.is_empty() {
        println!("No bottlenecked deals");
        return Ok(());
    }
    println!("Bottlenecked deals: {}", deals.len());
    let now = Utc::now();
    for state in &deals {
        let idle = now.signed_duration_since(state.last_updated).num_seconds();
        println!(
            "  {:<24} {:<8} idle {}",
            state.deal_id.as_str(),
            state.current_gate.as_str(),
            format_secs(Some(idle))
        );
    }
    Ok(())
}

/// Governance report.
pub fn cmd_metrics(ctx: &Context, window_days: Option<i64>) -> Result<(), GateError> {
    let window = match window_days {
        Some(days) if days > 0 => {
            let span = TimeDelta::try_days(days).ok_or_else(|| {
                GateError::InvalidInput(format!("window of {} days is out of range", days))
            })?;
            TimeWindow::trailing(Utc::now(), span)
        }
        Some(days) => {
            return Err(GateError::InvalidInput(format!(
                "window must be positive, got {} days",
                days
            )));
        }
        None => TimeWindow::unbounded(),
    };
    let wf = workflow(ctx)?;
    let report = wf.governance_metrics(window)?;

    if ctx.json_mode {
        print_json(&report);
        return Ok(());
    }

    println!("icgate Governance Report");
    println!("========================");
    match window_days {
        Some(days) => println!("Window:            last {} days", days),
        None => println!("Window:            entire trail"),
    }
    println!("Deals:             {}", report.total_deals);
    println!("Activity:          {}", report.total_activity);
    println!(
        "Approval velocity: {}",
        format_secs(report.approval_velocity_secs)
    );
    println!();
    println!(
        "  {:<8} {:>6} {:>9} {:>9} {:>6} {:>12} {:>6}",
        "gate", "deals", "activity", "advances", "votes", "avg dwell", "stuck"
    );
    for gate in &report.gates {
        println!(
            "  {:<8} {:>6} {:>9} {:>9} {:>6} {:>12} {:>6}",
            gate.gate.as_str(),
            gate.deals_in_gate,
            gate.activity_count,
            gate.advances,
            gate.approvals,
            format_secs(gate.average_dwell_secs),
            gate.bottlenecked
        );
    }
    if !report.bottlenecked_deals.is_empty() {
        println!();
        println!("Bottlenecked:");
        for state in &report.bottlenecked_deals {
            println!("  {} in {}", state.deal_id, state.current_gate);
        }
    }
    Ok(())
}

/// Show the configured gates and committee.
pub fn cmd_catalog(ctx: &Context) -> Result<(), GateError> {
    let wf = workflow(ctx)?;
    let governance = wf.governance()?;

    if ctx.json_mode {
        let gates: Vec<serde_json::Value> = governance
            .catalog
            .iter()
            .map(|gate| {
                serde_json::json!({
                    "name": gate.name,
                    "position": gate.position,
                    "required_artifacts": gate.required_artifacts,
                    "approval_threshold": gate.approval_threshold,
                    "quorum_required": gate.quorum_required,
                    "timeout_hours": gate.timeout.num_hours(),
                })
            })
            .collect();
        let committee: Vec<_> = governance.registry.all_members().collect();
        let output = serde_json::json!({
            "gates": gates,
            "committee": committee,
            "total_weight": governance.registry.total_weight(),
        });
        print_json(&output);
        return Ok(());
    }

    println!("Gates");
    println!("=====");
    for gate in governance.catalog.iter() {
        let quorum = if gate.quorum_required {
            format!("quorum {}", gate.approval_threshold)
        } else {
            "no quorum".to_string()
        };
        println!(
            "  {}. {:<8} {:<12} timeout {}h",
            gate.position + 1,
            gate.name.as_str(),
            quorum,
            gate.timeout.num_hours()
        );
        for artifact in &gate.required_artifacts {
            println!("       - {}", artifact);
        }
    }
    println!();
    println!(
        "Committee ({} active, total weight {})",
        governance.registry.active_count(),
        governance.registry.total_weight()
    );
    println!("=========");
    for member in governance.registry.all_members() {
        println!(
            "  {:<16} {:<24} {:<10} {:>6}{}",
            member.member_id.as_str(),
            member.display_name,
            member.role.to_string(),
            member.voting_weight.to_string(),
            if member.active { "" } else { "  (inactive)" }
        );
    }
    Ok(())
}

/// Compute the BLAKE3 digest of the audit trail.
pub fn cmd_digest(ctx: &Context) -> Result<(), GateError> {
    let wf = workflow(ctx)?;
    let trail = wf.audit_trail()?;
    let digest = icgate_core::trail_digest(&trail)?;

    if ctx.json_mode {
        let output = serde_json::json!({
            "entries": trail.len(),
            "digest": digest,
        });
        print_json(&output);
        return Ok(());
    }

    println!("Audit Trail Digest (BLAKE3)");
    println!("===========================");
    println!("Entries: {}", trail.len());
    println!("Digest:  {}", digest);
    Ok(())
}
