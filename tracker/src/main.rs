use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use interfaces::{cleanup, normalize, window_days, Item, RawRecord, SourceKind, StateStore, MAX_WINDOW_DAYS};
use tracing::{error, info, Level};
use tracker::config::{Config, Credentials, DEFAULT_CONFIG_PATH};
use tracker::sources::{CongressBills, CongressClient};
use tracker::{Fetcher, RunOptions, Tracker, TrackerError};

#[derive(Parser, Debug)]
#[command(name = "legtracker", version, about = "Track legislative and regulatory changes and send a daily digest")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll every enabled source, update state and build the digest.
    DailyCheck {
        /// Do not write the digest file.
        #[arg(long)]
        no_save_digest: bool,
        /// Email the digest to the configured recipients.
        #[arg(long)]
        send_email: bool,
        /// Look back this many days instead of the configured value.
        #[arg(long)]
        days_back: Option<i64>,
    },
    /// Show the tracking state.
    ShowState {
        /// List every tracked item.
        #[arg(short, long)]
        verbose: bool,
    },
    /// Delete the state file.
    ResetState {
        /// Confirm the reset.
        #[arg(long)]
        yes: bool,
    },
    /// Drop items not seen within the retention window.
    Cleanup {
        #[arg(long)]
        retention_days: Option<i64>,
    },
    /// Run the legislation search and print matches without touching state.
    FindBills {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Full-text bill search on Congress.gov.
    Search {
        query: String,
        #[arg(long, default_value_t = 119)]
        congress: u32,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Check Congress.gov connectivity and the API key.
    TestApi {
        /// Also exercise the bill search endpoint.
        #[arg(long)]
        with_search: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> tracker::Result<()> {
    let config = Config::load(&cli.config)?;
    let credentials = Credentials::from_env();

    match cli.command {
        Command::DailyCheck {
            no_save_digest,
            send_email,
            days_back,
        } => daily_check(&config, &credentials, !no_save_digest, send_email, days_back).await,
        Command::ShowState { verbose } => show_state(&config, verbose),
        Command::ResetState { yes } => reset_state(&config, yes),
        Command::Cleanup { retention_days } => run_cleanup(&config, retention_days),
        Command::FindBills { limit } => find_bills(&config, &credentials, limit).await,
        Command::Search { query, congress, limit } => search(&config, &credentials, &query, congress, limit).await,
        Command::TestApi { with_search } => test_api(&config, &credentials, with_search).await,
    }
}

async fn daily_check(
    config: &Config,
    credentials: &Credentials,
    save_digest: bool,
    send_email: bool,
    days_back: Option<i64>,
) -> tracker::Result<()> {
    if let Some(days) = days_back {
        check_window("--days-back", days)?;
    }
    let tracker = Tracker::from_config(config, credentials)?;
    let report = tracker
        .run(RunOptions {
            save_digest,
            send_email,
            days_back,
            now: None,
        })
        .await?;

    info!(
        "Run complete: {} records, {} new, {} status changes, {} expired",
        report.records_fetched, report.digest.total_new, report.digest.total_status_changes, report.expired
    );
    for failure in &report.source_failures {
        error!("Source {} ({}) failed: {}", failure.source_name, failure.source_kind, failure.error);
    }
    if report.normalization_failures > 0 {
        info!("{} records skipped during normalization", report.normalization_failures);
    }
    if let Some(path) = &report.digest_path {
        println!("Digest saved to {}", path.display());
    }
    if let Some(e) = &report.digest_error {
        println!("Digest file not saved: {}", e);
    }
    if let Some(delivery) = &report.delivery {
        if delivery.digest.success {
            println!("Digest email sent ({} items marked notified)", delivery.marked_notified);
        } else {
            println!("Digest email failed: {}", delivery.digest.message);
        }
    }
    if !save_digest && report.delivery.is_none() {
        println!("{}", report.markdown);
    }
    Ok(())
}

fn show_state(config: &Config, verbose: bool) -> tracker::Result<()> {
    let store = StateStore::new(&config.state.path).load()?;

    println!("State file: {}", config.state.path.display());
    println!("Last check: {}", store.last_check.format("%Y-%m-%d %H:%M UTC"));
    println!("Tracked items: {}", store.len());
    for (source, count) in store.count_by_source() {
        println!("  {}: {}", source.label(), count);
    }

    if verbose {
        for record in store.items.values() {
            println!(
                "- [{}] {} `{}` status={} first_seen={} last_seen={}{}",
                record.source,
                record.title,
                record.item_id,
                record.last_status.as_deref().unwrap_or("-"),
                record.first_seen.format("%Y-%m-%d"),
                record.last_seen.format("%Y-%m-%d"),
                if record.notified { " notified" } else { "" }
            );
        }
    }
    Ok(())
}

fn reset_state(config: &Config, yes: bool) -> tracker::Result<()> {
    if !yes {
        return Err(TrackerError::Config("reset-state needs --yes to delete the state file".to_string()));
    }
    let existed = StateStore::new(&config.state.path).reset()?;
    if existed {
        println!("Removed {}", config.state.path.display());
    } else {
        println!("No state file at {}", config.state.path.display());
    }
    Ok(())
}

fn run_cleanup(config: &Config, retention_days: Option<i64>) -> tracker::Result<()> {
    let days = retention_days.unwrap_or(config.state.retention_days);
    let retention = check_window("--retention-days", days)?;
    let state = StateStore::new(&config.state.path);
    let mut store = state.load()?;
    let removed = cleanup(&mut store, retention, Utc::now());
    state.save(&store)?;
    println!("Removed {} items not seen in {} days", removed, days);
    Ok(())
}

fn check_window(name: &str, days: i64) -> tracker::Result<chrono::Duration> {
    window_days(days)
        .ok_or_else(|| TrackerError::Config(format!("{name} must be between 0 and {MAX_WINDOW_DAYS}, got {days}")))
}

fn congress_client(config: &Config, credentials: &Credentials) -> tracker::Result<CongressClient> {
    let Some(key) = &credentials.congress_api_key else {
        return Err(TrackerError::Config("CONGRESS_API_KEY is not set".to_string()));
    };
    let fetcher = Arc::new(Fetcher::new(config.fetch_config())?);
    Ok(CongressClient::new(fetcher, &config.congress.api_base, key.clone()))
}

fn normalize_bills(bills: Vec<serde_json::Value>) -> Vec<Item> {
    let now = Utc::now();
    bills
        .into_iter()
        .filter_map(|bill| match normalize(&RawRecord::new(SourceKind::Legislation, bill), now) {
            Ok(item) => Some(item),
            Err(e) => {
                error!("{}", e);
                None
            }
        })
        .collect()
}

async fn find_bills(config: &Config, credentials: &Credentials, limit: Option<usize>) -> tracker::Result<()> {
    let client = congress_client(config, credentials)?;
    let bills = CongressBills::new(client, config.congress.clone()).find_relevant_bills(None).await?;

    let rules = &config.congress.priority_keywords;
    let mut found = normalize_bills(bills);
    found.sort_by_key(|item| rules.priority_of(item));

    println!("Found {} relevant bills", found.len());
    for item in found.iter().take(limit.unwrap_or(usize::MAX)) {
        println!(
            "[{}] {} `{}` - {}",
            rules.priority_of(item).as_str(),
            item.title,
            item.item_id,
            item.status.as_deref().unwrap_or("no action recorded")
        );
        if let Some(url) = &item.url {
            println!("    {}", url);
        }
    }
    Ok(())
}

async fn search(config: &Config, credentials: &Credentials, text: &str, congress: u32, limit: usize) -> tracker::Result<()> {
    let client = congress_client(config, credentials)?;
    let found = normalize_bills(client.search_bills(text, Some(congress), limit).await?);
    let rules = &config.congress.priority_keywords;

    println!("Found {} bills matching \"{}\" in Congress {}", found.len(), text, congress);
    for item in &found {
        println!("[{}] {}", rules.priority_of(item).as_str(), item.item_id);
        println!("    Title: {}", item.title);
        if let Some(sponsor) = &item.summary {
            println!("    {}", sponsor);
        }
        println!("    Latest Action: {}", item.status.as_deref().unwrap_or("no action recorded"));
        if let Some(url) = &item.url {
            println!("    {}", url);
        }
    }
    Ok(())
}

async fn test_api(config: &Config, credentials: &Credentials, with_search: bool) -> tracker::Result<()> {
    let client = congress_client(config, credentials)?;
    let congress = config.congress.current_congress;

    println!("1. Listing recent bills of Congress {}", congress);
    let bills = client.recent_bills(congress, 3, None).await?;
    for item in normalize_bills(bills) {
        println!("   {} - {}", item.item_id, item.title);
    }

    println!("2. Fetching bill details for H.R. 1");
    match client.bill_details(u64::from(congress), "hr", "1").await? {
        Some(bill) => println!(
            "   {}",
            bill.get("title").and_then(serde_json::Value::as_str).unwrap_or("(untitled)")
        ),
        None => println!("   No bill object in the response"),
    }

    println!("3. Fetching subjects for H.R. 1");
    let subjects = client.bill_subjects(u64::from(congress), "hr", "1").await?;
    let policy_area = subjects
        .pointer("/policyArea/name")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("none");
    let count = subjects
        .get("legislativeSubjects")
        .and_then(serde_json::Value::as_array)
        .map_or(0, Vec::len);
    println!("   Policy area: {}, {} legislative subjects", policy_area, count);

    if with_search {
        println!("4. Searching for \"flood\"");
        match client.search_bills("flood", Some(congress), 3).await {
            Ok(found) => println!("   {} results", found.len()),
            Err(e) => println!("   Search failed: {}", e),
        }
    }

    println!("Congress.gov API is reachable");
    Ok(())
}
