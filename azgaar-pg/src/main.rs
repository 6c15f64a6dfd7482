//! Point d'entrée CLI pour azgaar-pg

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// Charger .env au démarrage
fn load_env() {
    // Chercher .env dans le répertoire courant ou parent
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod clean;
mod config;
mod ledger;
mod watcher;

use config::{DatabaseConfig, Settings};
use ledger::{ArchiveRecord, Ledger};
use watcher::Watcher;

/// Surveiller les exports de cartes Openheim et les charger dans PostGIS
#[derive(Parser)]
#[command(name = "azgaar-pg")]
#[command(author, version)]
#[command(about = "Surveiller les archives d'export de cartes et les charger dans PostGIS")]
#[command(
    long_about = "Watcher d'ingestion pour les exports Azgaar du projet Openheim.\n\nPar défaut, scrute le répertoire d'arrivée et déroule le pipeline complet. Utilisez 'clean' pour rejouer seulement l'étape d'extraction et de nettoyage."
)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Répertoire surveillé pour l'archive entrante
    #[arg(default_value = "/var/www/html/azgaar")]
    watch_dir: PathBuf,

    /// Insérer un enregistrement `uploaded` initial dans le ledger
    #[arg(long)]
    seed_uploaded: bool,

    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Sous-commande (défaut: boucle de surveillance)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Rejouer l'étape d'extraction et de nettoyage sur un répertoire de données
    Clean {
        /// Répertoire de données contenant les fichiers extraits
        #[arg(default_value = "/srv/data-loader/data")]
        data: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    // Configurer le logging
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Some(Commands::Clean { data }) => {
            let settings = Settings::new(None);
            settings.validate()?;
            info!(data = %data.display(), "Running clean step");
            clean::run(&data, &settings)?;
        }
        None => {
            let settings = Settings::new(Some(cli.watch_dir));
            settings.validate()?;

            let db = DatabaseConfig::from_env()?;
            let ledger = Ledger::connect(&db).await?;

            if cli.seed_uploaded {
                let record = ArchiveRecord {
                    name: settings.inbound_name.clone(),
                    base_name: settings.base_name().to_string(),
                    path: settings
                        .watch_dir
                        .join(&settings.inbound_name)
                        .display()
                        .to_string(),
                    version: None,
                };
                ledger.seed_uploaded(&record).await?;
            }

            Watcher::new(settings, db, ledger).run().await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
