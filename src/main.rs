mod backend;
mod config;
mod hero;
mod message;
mod mock_heroes;
mod protocol;
mod server;
mod service;
mod store;

use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use backend::HttpBackend;
use config::{Config, LogConfig};
use hero::{Hero, HeroId, NewHero};
use message::MessageService;
use server::Server;
use service::HeroService;
use store::HeroStore;

/// Hero data service and its mock web API
#[derive(Parser, Debug)]
#[command(name = "heroes", version)]
struct Cli {
  /// Path to a TOML config file
  #[arg(short, long)]
  config: Option<String>,

  /// Override the server address from the config
  #[arg(long)]
  server_addr: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Serve the in-memory hero collection over HTTP
  Serve {
    /// Simulated round-trip delay in milliseconds
    #[arg(long)]
    latency_ms: Option<u64>,
  },
  /// Fetch every hero
  List,
  /// Fetch one hero by id
  Get { id: HeroId },
  /// Fetch one hero by id without a 404 on a miss
  #[command(name = "get-no404")]
  GetNo404 { id: HeroId },
  /// Add a hero; the server assigns its id
  Add { name: String },
  /// Rename an existing hero
  Update { id: HeroId, name: String },
  /// Delete a hero by id
  Delete { id: HeroId },
  /// Search heroes by name
  Search { term: String },
}

fn init_logging(log: &LogConfig) -> anyhow::Result<()> {
  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log.level.as_str()));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(true)
    .with_thread_ids(true);

  match &log.file {
    Some(path) => {
      let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file '{}'", path))?;
      builder.with_ansi(false).with_writer(Mutex::new(file)).init();
    }
    None => builder.init(),
  }
  Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

async fn run_client(config: &Config, command: Command) -> anyhow::Result<()> {
  let backend = Arc::new(HttpBackend::new(
    config.server_addr.clone(),
    config.base_path.clone(),
  ));
  let messages = Arc::new(MessageService::new());
  let service = HeroService::new(backend, messages.clone());

  match command {
    Command::Serve { .. } => anyhow::bail!("serve is not a client command"),
    Command::List => print_json(&service.get_heroes().await)?,
    Command::Get { id } => print_json(&service.get_hero(id).await)?,
    Command::GetNo404 { id } => print_json(&service.get_hero_no_404(id).await)?,
    Command::Add { name } => print_json(&service.add_hero(NewHero::new(name)).await)?,
    Command::Update { id, name } => {
      let updated = service.update_hero(&Hero::new(id, name)).await.is_some();
      print_json(&updated)?
    }
    Command::Delete { id } => print_json(&service.delete_hero(id).await)?,
    Command::Search { term } => print_json(&service.search_heroes(&term).await)?,
  }

  if !messages.is_empty() {
    println!("Messages ({}):", messages.len());
    for message in messages.messages() {
      println!("  {}", message);
    }
  }
  Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();

  let mut config = match &cli.config {
    Some(path) => Config::from_file(path)?,
    None => Config::default(),
  };
  if let Some(addr) = cli.server_addr {
    config.server_addr = addr;
  }

  init_logging(&config.log)?;

  match cli.command {
    Command::Serve { latency_ms } => {
      if let Some(latency_ms) = latency_ms {
        config.latency_ms = latency_ms;
      }
      config.validate()?;

      info!("Starting hero web API");
      info!("Version: {}", env!("CARGO_PKG_VERSION"));

      let store = Arc::new(HeroStore::new());
      info!("Seeded {} heroes", store.len());
      let server = Arc::new(Server::bind(&config, store).await?);
      info!("Server listening on: {}", server.local_addr());

      server.run().await;
      Ok(())
    }
    command => run_client(&config, command).await,
  }
}
