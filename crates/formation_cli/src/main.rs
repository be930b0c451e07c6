//! `formation` command-line entry point.
//!
//! # Responsibility
//! - Drive the core registration workflow from files or stdin.
//! - Keep output machine-readable (JSON on stdout, logs elsewhere).

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use formation_core::db::open_db;
use formation_core::{
    handle_register_learner, init_logging, CoreConfig, LogDestination, RegistrationService,
    SqliteDocumentStore,
};
use log::info;
use serde_json::json;
use std::io::Read;
use std::path::PathBuf;

/// Learner registration tooling.
#[derive(Debug, Parser)]
#[command(name = "formation")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// SQLite database file.
    #[arg(long, global = true, env = "FORMATION_DB_PATH")]
    db: Option<PathBuf>,

    /// Log level (trace|debug|info|warn|error).
    #[arg(long, global = true, env = "FORMATION_LOG_LEVEL")]
    log_level: Option<String>,

    /// Absolute directory for rolling log files; stderr when omitted.
    #[arg(long, global = true, env = "FORMATION_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Register a learner from a JSON request body.
    Register {
        /// Request file; stdin when omitted.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// List learners attached to an organization.
    Learners {
        /// Organization registration number.
        #[arg(long)]
        siret: String,
        /// Maximum learners to print (default 50, max 200).
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Print the core version.
    Version,
}

impl Cli {
    /// Layers command-line flags over the environment configuration.
    fn config(&self) -> CoreConfig {
        let mut config = CoreConfig::from_env();
        if let Some(db) = &self.db {
            config.db_path = db.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(dir) = &self.log_dir {
            config.logging.destination = LogDestination::Directory(dir.clone());
        }
        config
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("{}", formation_core::core_version());
        return Ok(());
    }

    let config = cli.config();
    init_logging(&config.logging).map_err(anyhow::Error::msg)?;
    let conn = open_db(&config.db_path)
        .with_context(|| format!("failed to open database `{}`", config.db_path.display()))?;
    let service = RegistrationService::new(SqliteDocumentStore::new(&conn));

    match cli.command {
        Commands::Register { file } => {
            let body = read_body(file.as_ref())?;
            let response = handle_register_learner(&service, &body);
            println!("{}", serde_json::to_string_pretty(&response.body)?);
            if !response.is_success() {
                bail!("registration failed with status {}", response.status);
            }
        }
        Commands::Learners { siret, limit } => {
            let Some(organization) = service.find_organization(&siret)? else {
                bail!("no organization with registration number `{siret}`");
            };
            let learners = service.learners_of_organization(organization.id, limit)?;
            info!(
                "event=list_learners module=cli status=ok organization_id={} count={}",
                organization.id,
                learners.len()
            );
            let items = learners
                .iter()
                .map(|record| {
                    json!({
                        "id": record.id,
                        "nom": record.data.last_name,
                        "prenom": record.data.first_name,
                        "email": record.data.email,
                        "statut": record.data.status,
                        "progression": record.data.progress_percent,
                    })
                })
                .collect::<Vec<_>>();
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "structureId": organization.id,
                    "apprenants": items,
                }))?
            );
        }
        Commands::Version => {}
    }

    Ok(())
}

fn read_body(file: Option<&PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read request file `{}`", path.display())),
        None => {
            let mut body = String::new();
            std::io::stdin()
                .read_to_string(&mut body)
                .context("failed to read request from stdin")?;
            Ok(body)
        }
    }
}
