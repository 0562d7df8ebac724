//! Command-line caller for the thing store.
//!
//! # Responsibility
//! - Resolve configuration, open the store once, and run one command.
//! - Print query results as JSON on stdout.
//!
//! # Invariants
//! - The store handle lives for the whole command and is dropped on exit.
//! - Only public `ThingService` operations are used.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::PathBuf;
use thingtree_core::{
    core_version, NewThing, SqliteThingRepository, StoreConfig, Thing, ThingPath, ThingService,
};
use uuid::Uuid;

/// Sample organization tree: `(path, owner, color)`.
const SEED_TREE: &[(&str, &str, &str)] = &[
    ("A", "A", "orange"),
    ("A.AA", "AA", "yellow"),
    ("A.AA.AAA", "AAA", "red"),
    ("A.AA.AAA.AAAA", "AAAA", "teal"),
    ("A.AA.AAA.AAAB", "AAAB", "teal"),
    ("A.AB", "AB", "yellow"),
    ("A.AB.ABA", "ABA", "yellow"),
    ("A.AB.ABB", "ABB", "yellow"),
    ("A.AB.ABC", "ABC", "yellow"),
    ("A.AB.ABC.ABCA", "ABCA", "yellow"),
    ("A.AB.ABC.ABCB", "ABCB", "yellow"),
    ("A.AB.ABC.ABCC", "ABCC", "yellow"),
    ("A.AC", "AC", "yellow"),
];

/// thingtree - query things by ownership lineage
#[derive(Parser, Debug)]
#[command(name = "thingtree")]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite store file; overrides config and THINGTREE_DB_PATH
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert the sample organization tree (existing paths are skipped)
    Seed,
    /// Print the thing at PATH and everything below it
    Descendants { path: ThingPath },
    /// Print every stored thing from the root down to PATH
    Ancestors { path: ThingPath },
    /// Print things exactly one level below PATH
    Children { path: ThingPath },
    /// Create one thing
    Create {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        color: String,
        /// Delimited path, e.g. A.AB.ABC
        #[arg(long)]
        path: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        code: Option<String>,
    },
    /// Set Name, Color or Code on one thing
    Update {
        id: Uuid,
        field: String,
        value: String,
        /// Identity recorded as the field's last modifier
        #[arg(long = "by")]
        modified_by: String,
    },
    /// Tombstone one thing
    Delete { id: Uuid },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = StoreConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.db_path = Some(db);
    }
    config.init_logging().context("failed to initialize logging")?;
    info!(
        "event=cli_start module=cli status=ok core_version={} store={}",
        core_version(),
        if config.db_path.is_some() { "file" } else { "memory" }
    );

    if config.db_path.is_none() {
        warn!("event=cli_store module=cli status=warn reason=in_memory_store");
        eprintln!("note: no --db given; using a throwaway in-memory store");
    }
    let conn = config.open_store().context("failed to open store")?;
    let service = ThingService::new(SqliteThingRepository::try_new(&conn)?);

    match cli.command {
        Command::Seed => {
            let mut created = Vec::new();
            for (path, owner, color) in SEED_TREE {
                if service.find_by_path(&ThingPath::parse(path)?)?.is_some() {
                    continue;
                }
                created.push(service.create(&NewThing::at(*owner, *color, path))?);
            }
            print_things(&created)?;
        }
        Command::Descendants { path } => print_things(&service.find_descendants(&path)?)?,
        Command::Ancestors { path } => print_things(&service.find_ancestors(&path)?)?,
        Command::Children { path } => print_things(&service.find_children(&path)?)?,
        Command::Create {
            owner,
            color,
            path,
            name,
            code,
        } => {
            let mut request = NewThing::at(owner, color, &path);
            request.name = name;
            request.code = code;
            print_thing(&service.create(&request)?)?;
        }
        Command::Update {
            id,
            field,
            value,
            modified_by,
        } => print_thing(&service.update_field(id, &field, value, modified_by)?)?,
        Command::Delete { id } => service.soft_delete(id)?,
    }

    Ok(())
}

fn print_things(things: &[Thing]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(things)?);
    Ok(())
}

fn print_thing(thing: &Thing) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(thing)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, SEED_TREE};
    use clap::Parser;
    use thingtree_core::ThingPath;

    #[test]
    fn seed_tree_paths_are_valid_and_parent_first() {
        let mut seen = Vec::<ThingPath>::new();
        for (text, _, _) in SEED_TREE {
            let path = ThingPath::parse(text).unwrap();
            if let Some(parent) = path.parent() {
                assert!(seen.contains(&parent), "{text} listed before its parent");
            }
            seen.push(path);
        }
    }

    #[test]
    fn descendants_argument_is_parsed_as_path() {
        let cli = Cli::try_parse_from(["thingtree", "--db", "/tmp/t.db", "descendants", "A.AB"])
            .unwrap();
        match cli.command {
            Command::Descendants { path } => assert_eq!(path.to_string(), "A.AB"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn invalid_path_argument_is_rejected() {
        assert!(Cli::try_parse_from(["thingtree", "ancestors", "A..B"]).is_err());
    }
}
