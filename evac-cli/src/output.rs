use colored::*;
use evac_protocol::evacuation::{ArrivalReport, EvacuationSession, RosterRow};
use evac_protocol::feed::FeedPayload;
use evac_protocol::scan::{ScanOutcome, ScanStatus};

use crate::client::StartedSession;

/// Formats an optional coordinate pair the way operators read it.
pub fn format_position(latitude: Option<f64>, longitude: Option<f64>) -> String {
    match (latitude, longitude) {
        (Some(lat), Some(lng)) => format!("{lat:.6}, {lng:.6}"),
        _ => "unknown".to_string(),
    }
}

pub fn print_payload_summary(payload: &FeedPayload) {
    let data = &payload.data;
    println!(
        "{} network {} ({} observations, window {} .. {})",
        "✔ Payload is valid:".green().bold(),
        data.network_id.bold(),
        data.observations.len(),
        data.start_time.to_rfc3339(),
        data.end_time.to_rfc3339()
    );
    for observation in &data.observations {
        let position = observation
            .latest_fix()
            .and_then(|fix| fix.coordinates())
            .map(|(lat, lng)| format_position(Some(lat), Some(lng)))
            .unwrap_or_else(|| "unknown".to_string());
        println!(
            "  {}  fixes: {:>3}  latest: {}",
            observation.client_mac,
            observation.locations.len(),
            position
        );
    }
}

pub fn print_outcomes(outcomes: &[ScanOutcome]) {
    let stored = outcomes.iter().filter(|outcome| outcome.is_stored()).count();
    println!(
        "{} {}/{} scans stored",
        "✔ Batch processed:".green().bold(),
        stored,
        outcomes.len()
    );
    for outcome in outcomes {
        let status = match outcome.status {
            ScanStatus::Stored => "stored".green(),
            ScanStatus::Failed => "failed".red(),
            ScanStatus::TimedOut => "timed out".yellow(),
        };
        let beacon = outcome
            .beacon
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {} [{}] beacon: {} position: {}",
            outcome.mac_address,
            status,
            beacon,
            format_position(outcome.latitude, outcome.longitude)
        );
        if let Some(warning) = &outcome.warning {
            println!("    {} {}", "warning:".yellow(), warning);
        }
        if let Some(error) = &outcome.error {
            println!("    {} {}", "error:".red(), error);
        }
    }
}

pub fn print_started(started: &StartedSession) {
    println!(
        "{} {} (worksite {})",
        "✔ Evacuation started:".green().bold(),
        started.session.id.to_string().bold(),
        started.session.worksite_id
    );
    println!("  Roster entries: {}", started.roster.created_count());
    if let Some(error) = &started.roster.query_error {
        println!(
            "  {} roster could not be built: {}",
            "warning:".yellow(),
            error
        );
    }
    for failure in &started.roster.failed {
        println!(
            "  {} beacon {}: {}",
            "failed:".red(),
            failure.beacon_id,
            failure.error
        );
    }
}

pub fn print_already_active(active: &[EvacuationSession]) {
    println!("{}", "⚠ Evacuation already active".yellow().bold());
    for session in active {
        println!(
            "  {} since {}",
            session.id,
            session.created_at.to_rfc3339()
        );
    }
}

pub fn print_ended(session: &EvacuationSession) {
    let ended = session
        .end_date
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{} {} at {}",
        "✔ Evacuation ended:".green().bold(),
        session.id.to_string().bold(),
        ended
    );
}

pub fn print_roster(rows: &[RosterRow]) {
    if rows.is_empty() {
        println!("{}", "No one on the roster".dimmed());
        return;
    }
    let arrived = rows.iter().filter(|row| row.arrival_time.is_some()).count();
    println!(
        "{} {}/{} arrived",
        "Roster:".bold(),
        arrived,
        rows.len()
    );
    for row in rows {
        let arrival = match row.arrival_time {
            Some(at) => at.to_rfc3339().green(),
            None => "missing".red(),
        };
        println!(
            "  {}  {} ({}, {})  {}  entry {}",
            row.mac_address, row.name, row.role, row.company, arrival, row.id
        );
    }
}

pub fn print_unresolved(unresolved: &[ArrivalReport]) {
    if unresolved.is_empty() {
        println!("{}", "✔ All arrivals recorded".green().bold());
        return;
    }
    println!(
        "{} {}",
        "⚠ Arrivals needing attention:".yellow().bold(),
        unresolved.len()
    );
    for report in unresolved {
        println!("  {}: {}", report.id, report.message);
    }
}
