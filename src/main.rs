use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use ecoscan::engine::{Engine, InputKind};
use ecoscan::evaluate::evaluate;
use ecoscan::settings::{Settings, StoreSettings};
use ecoscan::store::{FactStore, MemoryFactStore, SqliteFactStore};
use ecoscan::{EcoscanError, server};

#[derive(Parser)]
#[command(name = "ecoscan")]
#[command(version)]
#[command(about = "Finds food additive codes in label text and classifies their risk")]
struct Cli {
    /// Configuration file (json, toml or yaml); defaults to ./ecoscan.*
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the registered codes found in some text
    Extract {
        #[command(flatten)]
        input: Input,
    },
    /// Extract and classify every code found in some text
    Analyze {
        #[command(flatten)]
        input: Input,
        /// The text is an OCR transcript of a label photo
        #[arg(long)]
        image_transcript: bool,
    },
    /// Compare the rule book with the expert labels in the registry
    Evaluate {
        /// Write the mismatching rows to this CSV file
        #[arg(long)]
        errors: Option<PathBuf>,
    },
    /// Copy the registry into a SQLite fact store
    Import {
        /// Database file; defaults to store.path from the configuration
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Serve the engine over HTTP
    Serve {
        /// Overrides server.bind
        #[arg(long)]
        bind: Option<String>,
    },
}

#[derive(clap::Args)]
struct Input {
    /// Text to scan; read from --file or stdin when omitted
    text: Option<String>,
    #[arg(long, short)]
    file: Option<PathBuf>,
}

impl Input {
    fn read(self) -> std::io::Result<String> {
        match (self.text, self.file) {
            (Some(text), _) => Ok(text),
            (None, Some(path)) => std::fs::read_to_string(path),
            (None, None) => {
                let mut text = String::new();
                std::io::stdin().read_to_string(&mut text)?;
                Ok(text)
            }
        }
    }
}

fn open_store(settings: &Settings, engine: &Engine) -> Result<Arc<dyn FactStore>, EcoscanError> {
    match &settings.store {
        StoreSettings::Memory => Ok(Arc::new(MemoryFactStore::from_registry(engine.registry()))),
        StoreSettings::Sqlite { path } => {
            let store = SqliteFactStore::open(path)?;
            if store.count()? == 0 {
                warn!(path = %path.display(), "fact store is empty; run `ecoscan import` first");
            }
            Ok(Arc::new(store))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let engine = Engine::from_settings(&settings)?;
    match cli.command {
        Command::Extract { input } => {
            let codes = engine.extract_codes(&input.read()?);
            println!("{}", serde_json::to_string_pretty(&codes)?);
        }
        Command::Analyze { input, image_transcript } => {
            let store = open_store(&settings, &engine)?;
            let kind = if image_transcript { InputKind::ImageTranscript } else { InputKind::Text };
            let result = engine.analyze(&input.read()?, kind, store.as_ref())?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Evaluate { errors } => {
            let report = evaluate(engine.registry(), engine.rules());
            print!("{report}");
            if let Some(path) = errors {
                report.write_mismatches(&path)?;
            }
        }
        Command::Import { db } => {
            let path = match (db, &settings.store) {
                (Some(path), _) => path,
                (None, StoreSettings::Sqlite { path }) => path.clone(),
                (None, StoreSettings::Memory) => {
                    return Err(EcoscanError::Config("no --db given and store.kind is memory".into()).into());
                }
            };
            let store = SqliteFactStore::open(&path)?;
            let rows = store.import_registry(engine.registry())?;
            println!("imported {rows} additives into {}", path.display());
        }
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| settings.server.bind.clone());
            let store = open_store(&settings, &engine)?;
            let app = server::router(Arc::new(engine), store);
            let listener = tokio::net::TcpListener::bind(&bind).await?;
            info!(%bind, "listening");
            axum::serve(listener, app).await?;
        }
    }
    Ok(())
}
