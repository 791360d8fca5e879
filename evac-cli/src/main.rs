use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use evac_core::logging::{init_tracing, LogFormat};
use evac_core::serde_utils::to_pretty_json;
use evac_protocol::evacuation::ArrivalUpdate;
use evac_protocol::feed::{parse_feed, FeedPayload};
use evac_protocol::registry::Site;
use evac_protocol::scan::ScanOutcome;
use evac_service::ingest::ingest_feed;
use evac_service::MemoryStorage;
use uuid::Uuid;

mod client;
mod output;

use client::{CliError, EvacClient, StartOutcome};

const DRY_RUN_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "evac")]
#[command(about = "Evacuation tracking - feed replay, sessions and roster", long_about = None)]
struct Cli {
    /// Base URL of the evacuation service
    #[arg(
        long,
        global = true,
        env = "EVAC_URL",
        default_value = "http://127.0.0.1:8090"
    )]
    url: String,
    /// Print raw JSON instead of the formatted report
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
    /// Log verbosity when RUST_LOG is unset
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a captured feed payload offline
    Validate(ValidateArgs),
    /// Post a captured feed payload to the service
    Replay(PayloadArgs),
    /// Start an evacuation for a worksite
    Start(StartArgs),
    /// End an evacuation
    End(EndArgs),
    /// Show who is on an evacuation roster
    Roster(RosterArgs),
    /// Confirm arrivals for roster entries
    Arrive(ArriveArgs),
}

#[derive(Args)]
struct PayloadArgs {
    /// Path to the JSON body as received from the feed
    payload: PathBuf,
}

#[derive(Args)]
struct ValidateArgs {
    #[command(flatten)]
    payload: PayloadArgs,
    /// Also run the batch through an in-memory store and show per-device outcomes
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Args)]
struct StartArgs {
    #[arg(long)]
    worksite: Uuid,
}

#[derive(Args)]
struct EndArgs {
    session: Uuid,
    /// End timestamp (RFC 3339); defaults to the service's current time
    #[arg(long)]
    at: Option<DateTime<Utc>>,
}

#[derive(Args)]
struct RosterArgs {
    /// Evacuation id, or 0 for the most recent evacuation
    #[arg(default_value = "0")]
    session: String,
}

#[derive(Args)]
struct ArriveArgs {
    /// Roster entry ids
    #[arg(required = true)]
    entries: Vec<String>,
    /// Arrival timestamp (RFC 3339) applied to every entry; defaults to now
    #[arg(long)]
    at: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let level = cli.log_level.as_deref().or(Some("warn"));
    if let Err(err) = init_tracing(level, LogFormat::Pretty) {
        eprintln!("failed to initialise tracing: {err}");
    }

    let client = || EvacClient::new(&cli.url);
    match cli.command {
        Commands::Validate(args) => {
            let raw = read_payload(&args.payload.payload)?;
            let payload = parse_feed(&raw).map_err(|err| {
                CliError::Validation(format!(
                    "{err}\nexpected shape:\n{}",
                    to_pretty_json(err.expected_shape()).unwrap_or_default()
                ))
            })?;
            if args.dry_run {
                let outcomes = dry_run(&payload, &raw).await?;
                emit(cli.json, outcomes.as_slice(), output::print_outcomes)?;
            } else {
                emit(cli.json, &payload, output::print_payload_summary)?;
            }
        }
        Commands::Replay(args) => {
            let raw = read_payload(&args.payload)?;
            let outcomes = client()?.replay(raw).await?;
            emit(cli.json, outcomes.as_slice(), output::print_outcomes)?;
        }
        Commands::Start(args) => match client()?.start_session(args.worksite).await? {
            StartOutcome::Started(started) => {
                if cli.json {
                    print_json(&started.session)?;
                } else {
                    output::print_started(&started);
                }
            }
            StartOutcome::AlreadyActive(active) => {
                emit(cli.json, active.as_slice(), output::print_already_active)?;
            }
        },
        Commands::End(args) => {
            let session = client()?.end_session(args.session, args.at).await?;
            emit(cli.json, &session, output::print_ended)?;
        }
        Commands::Roster(args) => {
            let rows = client()?.roster(&args.session).await?;
            emit(cli.json, rows.as_slice(), output::print_roster)?;
        }
        Commands::Arrive(args) => {
            let updates: Vec<ArrivalUpdate> = args
                .entries
                .into_iter()
                .map(|id| ArrivalUpdate {
                    id,
                    arrival_time: args.at.clone(),
                })
                .collect();
            let unresolved = client()?.arrive(&updates).await?;
            emit(cli.json, unresolved.as_slice(), output::print_unresolved)?;
        }
    }

    Ok(())
}

fn read_payload(path: &Path) -> Result<Vec<u8>, CliError> {
    fs::read(path).map_err(|err| CliError::Input {
        path: path.display().to_string(),
        message: err.to_string(),
    })
}

/// Runs the batch against a throwaway store holding only the payload's site.
async fn dry_run(
    payload: &FeedPayload,
    raw: &[u8],
) -> Result<Vec<ScanOutcome>, CliError> {
    let storage = MemoryStorage::new();
    storage.add_site(Site {
        id: Uuid::new_v4(),
        external_id: payload.data.network_id.clone(),
        name: "dry-run".into(),
    });
    ingest_feed(Arc::new(storage), raw, DRY_RUN_DEADLINE)
        .await
        .map_err(|err| CliError::Validation(err.to_string()))
}

fn emit<T, F>(as_json: bool, value: &T, print: F) -> Result<(), CliError>
where
    T: serde::Serialize + ?Sized,
    F: FnOnce(&T),
{
    if as_json {
        print_json(value)
    } else {
        print(value);
        Ok(())
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let rendered = to_pretty_json(value).map_err(|err| CliError::Validation(err.to_string()))?;
    println!("{rendered}");
    Ok(())
}
