//! wp-admin: Waypoint storage administration.
//!
//! Read-only views (user overview, per-user history) plus the repair
//! pass that reconciles transitions interrupted by a crash.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use shared_types::Uid;
use wp_record_store::{
    Dependencies, FilesystemBackend, HistoryApi, RecordStoreApi, StateTransitionApi, StoreConfig,
    SystemClock, WorkflowStore,
};

/// Waypoint admin tool.
#[derive(Parser, Debug)]
#[command(name = "wp-admin")]
#[command(about = "User overview, history dumps and storage repair for a Waypoint store")]
struct Args {
    /// Storage root directory
    #[arg(short, long, env = "WAYPOINT_STORE")]
    store: PathBuf,

    /// Installation salt (prefer setting the environment variable)
    #[arg(long, env = "WAYPOINT_SALT", hide_env_values = true)]
    salt: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every user with e-mail, current state and state timestamp
    Users,
    /// Dump one user's state history and form submission trail
    History {
        /// The user's uid (64 hex characters)
        uid: String,
    },
    /// Reconcile interrupted transitions for one user, or for all
    Repair {
        /// Limit the pass to one uid
        uid: Option<String>,
    },
}

type Store = WorkflowStore<FilesystemBackend, SystemClock>;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let deps = Dependencies {
        backend: FilesystemBackend::open(&args.store)
            .with_context(|| format!("opening storage root {}", args.store.display()))?,
        time_source: SystemClock,
    };
    let mut store = WorkflowStore::new(deps, StoreConfig::new(args.salt.as_str()))
        .context("initializing the workflow store")?;

    match args.command {
        Command::Users => users(&store),
        Command::History { uid } => history(&store, &parse_uid(&uid)?),
        Command::Repair { uid } => repair(&mut store, uid.as_deref()),
    }
}

fn parse_uid(raw: &str) -> Result<Uid> {
    Uid::new(raw).with_context(|| format!("'{raw}' is not a valid uid"))
}

fn users(store: &Store) -> Result<()> {
    let mut rows = store.users_with_state()?;
    rows.sort_by(|a, b| a.email.as_str().cmp(b.email.as_str()));
    for row in &rows {
        println!(
            "{}  {:<32}  {:<16}  since {}",
            row.uid,
            row.email,
            row.state,
            row.timestamp.pretty()
        );
    }
    println!("{} user(s)", rows.len());
    Ok(())
}

fn history(store: &Store, uid: &Uid) -> Result<()> {
    let email = store.retrieve_email(uid)?;
    let current = store.current_origin(uid)?;
    println!("{uid}  {email}");
    println!(
        "current: '{}' since {} (from '{}' at {})",
        current.state,
        current.timestamp.pretty(),
        current.origin.state(),
        current.origin.timestamp().pretty()
    );

    println!("state history:");
    for (timestamp, record) in store.state_history(uid)? {
        let form = record
            .form_dated_tuple
            .map(|name| format!("  [form: {}]", name.kind))
            .unwrap_or_default();
        println!("  {}  {}{}", timestamp.pretty(), record.state, form);
    }

    let index = store.form_index(uid)?;
    if !index.is_empty() {
        println!("form submissions:");
        for (timestamp, kind) in index {
            println!("  {}  {}", timestamp.pretty(), kind);
        }
    }
    Ok(())
}

fn repair(store: &mut Store, uid: Option<&str>) -> Result<()> {
    let uids = match uid {
        Some(raw) => vec![parse_uid(raw)?],
        None => store.list_uids()?,
    };

    let mut dirty = 0usize;
    for uid in &uids {
        let report = store.repair_user(uid)?;
        if report.is_clean() {
            continue;
        }
        dirty += 1;
        println!("{uid}:");
        for name in &report.completed_pointers {
            println!("  completed form pointer {name}");
        }
        for kind in &report.normalized_pointers {
            println!("  normalized pointer '{kind}'");
        }
        for name in &report.orphans {
            println!("  orphan {name} (left in place)");
        }
    }
    println!("checked {} user(s), {} needed attention", uids.len(), dirty);
    Ok(())
}
