use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dockcount_core::report::{discrepancy_table, to_table, write_csv};
use dockcount_core::{
    ConferenceError, ConferenceFilter, ConferenceGateway, ConferenceId, CountLine, ManifestRules,
    PersistedLine, Session, StatusCounts,
};
use dockcount_store::DuckStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod capture;
mod display;

use capture::{DuplicateFilter, Entry, parse_entry};

/// Reconcile a shipment manifest against physical counts at the dock.
#[derive(Parser, Debug)]
#[command(name = "dockcount", version)]
struct Cli {
    /// DuckDB database file holding conferences
    #[arg(long, global = true, env = "DOCKCOUNT_DB", default_value = "dockcount.duckdb")]
    db: PathBuf,

    /// TOML file overriding the manifest layout rules
    #[arg(long, global = true, env = "DOCKCOUNT_RULES")]
    rules: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open or resume the live conference for a manifest
    Load { manifest: PathBuf },

    /// Record one count event
    Count {
        manifest: PathBuf,
        code: String,
        #[arg(long, default_value_t = 1)]
        qty: i64,
    },

    /// Read counts from stdin, one `<code> [qty]` per line
    Session {
        manifest: PathBuf,
        /// Ignore a repeat of the same code within this many milliseconds
        #[arg(long, default_value_t = 0)]
        dedupe_ms: u64,
    },

    /// Show the current working set for a manifest
    Report {
        manifest: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Snapshot the working set into a new conference
    Finalize { manifest: PathBuf },

    /// List stored conferences, newest first
    History {
        #[arg(long)]
        store: Option<String>,
        #[arg(long)]
        trip: Option<String>,
        /// Earliest creation day (YYYY-MM-DD), inclusive
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Latest creation day (YYYY-MM-DD), inclusive
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        json: bool,
    },

    /// Show the lines of a stored conference
    Show {
        id: ConferenceId,
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(clap::Args, Debug)]
struct OutputArgs {
    /// Only lines that are not MATCHED
    #[arg(long)]
    discrepancies: bool,
    /// Also write the table as CSV
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let rules = load_rules(cli.rules.as_deref())?;
    let store = DuckStore::open_persistent(&cli.db)
        .with_context(|| format!("failed to open database {}", cli.db.display()))?;

    match cli.command {
        Command::Load { manifest } => cmd_load(store, rules, &manifest),
        Command::Count {
            manifest,
            code,
            qty,
        } => cmd_count(store, rules, &manifest, &code, qty),
        Command::Session {
            manifest,
            dedupe_ms,
        } => cmd_session(store, rules, &manifest, Duration::from_millis(dedupe_ms)),
        Command::Report { manifest, output } => cmd_report(store, rules, &manifest, &output),
        Command::Finalize { manifest } => cmd_finalize(store, rules, &manifest),
        Command::History {
            store: store_id,
            trip,
            from,
            to,
            json,
        } => cmd_history(
            store,
            ConferenceFilter {
                store_id,
                trip_id: trip,
                created_from: from,
                created_to: to,
            },
            json,
        ),
        Command::Show { id, output } => cmd_show(store, id, &output),
    }
}

fn load_rules(path: Option<&Path>) -> Result<ManifestRules> {
    let Some(path) = path else {
        return Ok(ManifestRules::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read rules {}", path.display()))?;
    let rules = ManifestRules::from_toml_str(&text)
        .with_context(|| format!("failed to parse rules {}", path.display()))?;
    info!(path = %path.display(), "loaded manifest rules");
    Ok(rules)
}

fn open_session(
    store: DuckStore,
    rules: ManifestRules,
    manifest: &Path,
) -> Result<Session<DuckStore>> {
    let file = File::open(manifest)
        .with_context(|| format!("failed to open manifest {}", manifest.display()))?;
    let source_file = manifest.file_name().map(|n| n.to_string_lossy().into_owned());
    let mut session = Session::new(store, rules);
    session
        .upload_manifest(file, source_file.as_deref())
        .with_context(|| format!("failed to load manifest {}", manifest.display()))?;
    Ok(session)
}

// ── Commands ──

fn cmd_load(store: DuckStore, rules: ManifestRules, manifest: &Path) -> Result<()> {
    let session = open_session(store, rules, manifest)?;
    print_card(&session);
    Ok(())
}

fn cmd_count(
    store: DuckStore,
    rules: ManifestRules,
    manifest: &Path,
    code: &str,
    qty: i64,
) -> Result<()> {
    let mut session = open_session(store, rules, manifest)?;
    let applied = session.submit_count(code, qty)?;
    display::print_applied(&applied);
    Ok(())
}

fn cmd_session(
    store: DuckStore,
    rules: ManifestRules,
    manifest: &Path,
    dedupe: Duration,
) -> Result<()> {
    let mut session = open_session(store, rules, manifest)?;
    print_card(&session);
    println!("Enter `<code> [qty]`, or :report :progress :finalize :resync :quit");

    let mut filter = DuplicateFilter::new(dedupe);
    let stdin = io::stdin();
    let mut out = io::stdout();
    loop {
        print!("> ");
        out.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let entry = match parse_entry(&line) {
            Ok(entry) => entry,
            Err(err) => {
                eprintln!("error: {err:#}");
                continue;
            }
        };
        match entry {
            Entry::Blank => {}
            Entry::Quit => break,
            Entry::Count { code, qty } => {
                if !filter.admit(&code, Instant::now()) {
                    info!(code = %code, "repeat read ignored");
                    continue;
                }
                match session.submit_count(&code, qty) {
                    Ok(applied) => display::print_applied(&applied),
                    Err(ConferenceError::Unsynced { applied, source }) => {
                        display::print_applied(&applied);
                        eprintln!("warning: not saved ({source}); run :resync once the database is back");
                    }
                    Err(err) => eprintln!("error: {err}"),
                }
            }
            Entry::Report => {
                if let Some(engine) = session.engine() {
                    display::print_table(&to_table(&engine.snapshot())?)?;
                }
            }
            Entry::Progress => {
                if let Some(engine) = session.engine() {
                    display::print_progress(&engine.progress(), &engine.status_counts());
                }
            }
            Entry::Finalize => match session.finalize() {
                Ok(id) => println!("finalized as conference {id}"),
                Err(err) => eprintln!("error: {err}"),
            },
            Entry::Resync => match session.resync() {
                Ok(()) => println!("working set reloaded from the database"),
                Err(err) => eprintln!("error: {err}"),
            },
        }
    }
    Ok(())
}

fn cmd_report(
    store: DuckStore,
    rules: ManifestRules,
    manifest: &Path,
    output: &OutputArgs,
) -> Result<()> {
    let session = open_session(store, rules, manifest)?;
    let Some(engine) = session.engine() else {
        bail!("no manifest loaded");
    };
    let conference_id = engine.conference_id().unwrap_or_default();
    render_lines(conference_id, &engine.snapshot(), output)
}

fn cmd_finalize(store: DuckStore, rules: ManifestRules, manifest: &Path) -> Result<()> {
    let mut session = open_session(store, rules, manifest)?;
    let id = session.finalize()?;
    println!("finalized as conference {id}");
    Ok(())
}

fn cmd_history(mut store: DuckStore, filter: ConferenceFilter, json: bool) -> Result<()> {
    if let (Some(from), Some(to)) = (filter.created_from, filter.created_to)
        && from > to
    {
        bail!("--from {from} is after --to {to}");
    }
    let headers = store.list_conferences(&filter)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&headers)?);
    } else {
        display::print_history(&headers);
    }
    Ok(())
}

fn cmd_show(mut store: DuckStore, id: ConferenceId, output: &OutputArgs) -> Result<()> {
    let Some(header) = store.conference(id)? else {
        bail!("conference {id} not found");
    };
    let persisted = store.fetch_lines(id)?;
    let lines: Vec<CountLine> = persisted.iter().map(CountLine::from).collect();
    if !output.json {
        display::print_header(&header);
        display::print_status_counts(&StatusCounts::from_persisted(&persisted));
    }
    render_lines(id, &lines, output)
}

// ── Output ──

fn print_card(session: &Session<DuckStore>) {
    if let (Some(metadata), Some(engine)) = (session.metadata(), session.engine()) {
        display::print_trip_card(
            metadata,
            engine.conference_id(),
            &engine.progress(),
            &engine.status_counts(),
        );
    }
}

fn render_lines(conference_id: ConferenceId, lines: &[CountLine], output: &OutputArgs) -> Result<()> {
    let batch = if output.discrepancies {
        discrepancy_table(lines)?
    } else {
        to_table(lines)?
    };

    if let Some(path) = &output.csv {
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        write_csv(&batch, file)?;
        info!(path = %path.display(), rows = batch.num_rows(), "wrote csv report");
    }

    if output.json {
        let rows: Vec<PersistedLine> = lines
            .iter()
            .filter(|l| !output.discrepancies || l.status().is_discrepancy())
            .map(|l| PersistedLine::from_count_line(conference_id, l))
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        display::print_table(&batch)?;
    }
    Ok(())
}
