//! CipherSwarm operator CLI.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use std::sync::Arc;
use std::time::Duration;

use cipherswarm::adapters::memory::InProcessLockStore;
use cipherswarm::adapters::object_store::{HttpObjectStore, LocalObjectStore};
use cipherswarm::adapters::redis::RedisLockStore;
use cipherswarm::adapters::sqlite::{
    initialize_database, SqliteAttackRepository, SqliteCampaignRepository, SqliteTaskRepository,
};
use cipherswarm::domain::models::Config;
use cipherswarm::domain::ports::{
    AttackRepository, CampaignRepository, LockStore, ObjectStore, TaskRepository,
};
use cipherswarm::infrastructure::{ConfigLoader, Logger};
use cipherswarm::services::HealthService;

#[derive(Parser)]
#[command(name = "cipherswarm", version, about = "Distributed password-cracking orchestrator")]
struct Cli {
    /// Path to a configuration file (defaults to .cipherswarm/config.yaml)
    #[arg(long, env = "CIPHERSWARM_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create and migrate the database
    Init,
    /// Probe external dependencies and print the health snapshot
    Health,
    /// List campaigns with attack and task counts
    Campaigns,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    let _logger = Logger::init(&config.logging)?;

    match cli.command {
        Command::Init => init(&config).await,
        Command::Health => health(&config).await,
        Command::Campaigns => campaigns(&config).await,
    }
}

async fn init(config: &Config) -> Result<()> {
    let url = format!("sqlite:{}", config.database.path);
    initialize_database(&url)
        .await
        .context("Failed to initialize database")?;
    println!("database ready at {}", config.database.path);
    Ok(())
}

async fn health(config: &Config) -> Result<()> {
    let url = format!("sqlite:{}", config.database.path);
    let pool = initialize_database(&url).await?;

    let lock_store: Arc<dyn LockStore> = if config.memory_store.redis_url.is_empty() {
        Arc::new(InProcessLockStore::new())
    } else {
        Arc::new(RedisLockStore::connect(&config.memory_store.redis_url).await?)
    };

    let probe_timeout = Duration::from_secs(config.object_storage.probe_timeout_secs);
    let object_store: Arc<dyn ObjectStore> = if config.object_storage.endpoint.is_empty() {
        Arc::new(LocalObjectStore::new(
            &config.object_storage.local_path,
            &config.base_url,
        ))
    } else {
        Arc::new(HttpObjectStore::new(
            &config.object_storage.endpoint,
            probe_timeout,
        )?)
    };

    let service = HealthService::new(pool, lock_store, object_store).with_timing(
        probe_timeout,
        Duration::from_secs(config.scheduler.health_lock_ttl_secs),
        Duration::from_secs(config.scheduler.health_cache_secs),
    );

    let snapshot = service.snapshot().await;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

async fn campaigns(config: &Config) -> Result<()> {
    let url = format!("sqlite:{}", config.database.path);
    let pool = initialize_database(&url).await?;

    let campaigns = SqliteCampaignRepository::new(pool.clone());
    let attacks = SqliteAttackRepository::new(pool.clone());
    let tasks = SqliteTaskRepository::new(pool);

    let mut table = Table::new();
    table.set_header(vec!["Campaign", "Priority", "Paused", "Attacks", "Tasks"]);

    for campaign in campaigns.list().await? {
        let campaign_attacks = attacks.list_by_campaign(campaign.id).await?;
        let mut task_count = 0usize;
        for attack in &campaign_attacks {
            task_count += tasks.list_by_attack(attack.id).await?.len();
        }

        table.add_row(vec![
            campaign.name.clone(),
            campaign.priority.as_str().to_string(),
            if campaign.paused { "yes" } else { "no" }.to_string(),
            campaign_attacks.len().to_string(),
            task_count.to_string(),
        ]);
    }

    println!("{table}");
    Ok(())
}
