//! Read-only queries against a monitoring store: the same surface a
//! dashboard uses to populate its selectors and plots.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use spectre_monitor::config::{DEFAULT_DBROOT, ENV_DBROOT};
use spectre_monitor::store::{Collection, Document, Query, Store};
use spectre_monitor::value::coerce;
use tracing_subscriber::EnvFilter;

/// mon-query - inspect a monitoring store
#[derive(Parser, Debug)]
#[command(name = "mon-query")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Store root directory
    #[arg(long, env = ENV_DBROOT, default_value = DEFAULT_DBROOT)]
    dbroot: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List databases (ensembles)
    Databases,
    /// List collections (members) in a database
    Collections {
        /// Database name
        database: String,
    },
    /// List document files in a collection
    Documents {
        /// Database name
        database: String,
        /// Collection name
        collection: String,
    },
    /// Print matching documents as newline-delimited JSON
    Find {
        /// Database name
        database: String,
        /// Collection name
        collection: String,
        /// Exact-match conditions, `field=value`
        conditions: Vec<String>,
    },
    /// Print the most recently scraped matching document(s)
    Latest {
        /// Database name
        database: String,
        /// Collection name
        collection: String,
        /// Exact-match conditions, `field=value`
        conditions: Vec<String>,
        /// Print every document sharing the latest timestamp
        #[arg(long)]
        set: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    if !args.dbroot.is_dir() {
        bail!("store root {} does not exist", args.dbroot.display());
    }
    let store = Store::open(&args.dbroot)?;
    let mut out = io::stdout().lock();

    match args.command {
        Command::Databases => print_names(&mut out, &store.list_databases()?),
        Command::Collections { database } => {
            print_names(&mut out, &store.database(&database)?.list_collections()?)
        }
        Command::Documents {
            database,
            collection,
        } => print_names(&mut out, &open(&store, &database, &collection)?.list_documents()?),
        Command::Find {
            database,
            collection,
            conditions,
        } => {
            let query = parse_query(&conditions)?;
            print_documents(&mut out, &open(&store, &database, &collection)?.find_all(&query)?)
        }
        Command::Latest {
            database,
            collection,
            conditions,
            set,
        } => {
            let query = parse_query(&conditions)?;
            let coll = open(&store, &database, &collection)?;
            let docs = if set {
                coll.find_most_recent_matching_set(&query)?
            } else {
                coll.find_most_recent_matching(&query)?.into_iter().collect()
            };
            print_documents(&mut out, &docs)
        }
    }
}

fn open(store: &Store, database: &str, collection: &str) -> anyhow::Result<Collection> {
    Ok(store.database(database)?.collection(collection)?)
}

/// Parse `field=value` pairs; values are coerced like log values.
fn parse_query(conditions: &[String]) -> anyhow::Result<Query> {
    conditions
        .iter()
        .map(|c| {
            c.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), coerce(v)))
                .with_context(|| format!("condition {c:?} is not field=value"))
        })
        .collect()
}

fn print_names(out: &mut impl Write, names: &[String]) -> anyhow::Result<()> {
    serde_json::to_writer(&mut *out, names)?;
    writeln!(out)?;
    Ok(())
}

fn print_documents(out: &mut impl Write, docs: &[Document]) -> anyhow::Result<()> {
    for doc in docs {
        serde_json::to_writer(&mut *out, doc)?;
        writeln!(out)?;
    }
    Ok(())
}
