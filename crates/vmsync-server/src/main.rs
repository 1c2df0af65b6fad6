use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use vmsync_cloud::azure::AzureConnector;
use vmsync_cloud::FetchContext;
use vmsync_storage::SyncStore;

use vmsync_server::config::SyncConfig;
use vmsync_server::seed::{self, AccountsSeedFile};
use vmsync_server::{
    AccountSyncOrchestrator, CatalogSyncService, DnsLabelService, SyncEnv,
};

/// 单条命令的整体上限；各次抓取另有各自的超时
const COMMAND_TIMEOUT: Duration = Duration::from_secs(3600);

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  vmsync-server seed-accounts <config.toml> <seed.json>                          Import accounts from seed file");
    eprintln!("  vmsync-server sync <config.toml> <user_id> <account_id>...                     Sync subscriptions and VMs of accounts");
    eprintln!("  vmsync-server sync-regions <config.toml> <user_id> <account_id> <subscription_id>");
    eprintln!("  vmsync-server sync-sizes <config.toml> <user_id> <account_id> <subscription_id> <location>");
    eprintln!("  vmsync-server sync-images <config.toml> <user_id> <account_id> <subscription_id> <location>");
    eprintln!("  vmsync-server set-dns-label <config.toml> <user_id> <account_id> <subscription_id> <resource_group> <public_ip> <label>");
}

fn arg<'a>(args: &'a [String], index: usize, command: &str, name: &str) -> Result<&'a str> {
    args.get(index).map(String::as_str).ok_or_else(|| {
        print_usage();
        anyhow::anyhow!("{command} requires <{name}> argument")
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    vmsync_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("vmsync=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("seed-accounts") => {
            let config_path = arg(&args, 2, "seed-accounts", "config.toml")?;
            let seed_path = arg(&args, 3, "seed-accounts", "seed.json")?;
            run_seed_accounts(config_path, seed_path).await
        }
        Some("sync") => {
            let config_path = arg(&args, 2, "sync", "config.toml")?;
            let user_id = arg(&args, 3, "sync", "user_id")?;
            let account_ids: Vec<String> = args.iter().skip(4).cloned().collect();
            run_sync(config_path, user_id, &account_ids).await
        }
        Some(cmd @ ("sync-regions" | "sync-sizes" | "sync-images")) => {
            let config_path = arg(&args, 2, cmd, "config.toml")?;
            let user_id = arg(&args, 3, cmd, "user_id")?;
            let account_id = arg(&args, 4, cmd, "account_id")?;
            let subscription_id = arg(&args, 5, cmd, "subscription_id")?;
            let location = args.get(6).map(String::as_str).unwrap_or_default();
            run_catalog_sync(cmd, config_path, user_id, account_id, subscription_id, location).await
        }
        Some("set-dns-label") => {
            let config_path = arg(&args, 2, "set-dns-label", "config.toml")?;
            let user_id = arg(&args, 3, "set-dns-label", "user_id")?;
            let account_id = arg(&args, 4, "set-dns-label", "account_id")?;
            let subscription_id = arg(&args, 5, "set-dns-label", "subscription_id")?;
            let resource_group = arg(&args, 6, "set-dns-label", "resource_group")?;
            let public_ip = arg(&args, 7, "set-dns-label", "public_ip")?;
            let label = arg(&args, 8, "set-dns-label", "label")?;
            let env = build_env(config_path).await?;
            let ctx = FetchContext::with_timeout(env.settings.catalog_fetch_timeout());
            let fqdn = DnsLabelService::new(env)
                .set_dns_label(
                    &ctx,
                    user_id,
                    account_id,
                    subscription_id,
                    resource_group,
                    public_ip,
                    label,
                )
                .await?;
            print_json(&serde_json::json!({ "fqdn": fqdn }))
        }
        Some("--help" | "-h") | None => {
            print_usage();
            Ok(())
        }
        Some(other) => {
            print_usage();
            anyhow::bail!("unknown command: {other}")
        }
    }
}

async fn build_env(config_path: &str) -> Result<SyncEnv> {
    let config = SyncConfig::load(config_path)
        .with_context(|| format!("Failed to load config '{config_path}'"))?;
    let store = open_store(&config).await?;
    let connector = AzureConnector::new(config.azure.settings())?;
    Ok(SyncEnv::new(
        Arc::new(store),
        Arc::new(connector),
        config.sync.clone(),
    ))
}

async fn open_store(config: &SyncConfig) -> Result<SyncStore> {
    let db_url = config.database.connection_url();
    let store = SyncStore::new(&db_url, Path::new(&config.database.data_dir))
        .await
        .with_context(|| format!("Failed to open store at '{db_url}'"))?;
    Ok(store.with_chunk_size(config.sync.reconcile_chunk_size))
}

async fn run_seed_accounts(config_path: &str, seed_path: &str) -> Result<()> {
    let config = SyncConfig::load(config_path)
        .with_context(|| format!("Failed to load config '{config_path}'"))?;
    let store = open_store(&config).await?;
    let seed = AccountsSeedFile::load(seed_path)?;
    let synced = seed::seed_accounts(&store, &seed).await?;
    tracing::info!(synced, "Seed accounts complete");
    Ok(())
}

async fn run_sync(config_path: &str, user_id: &str, account_ids: &[String]) -> Result<()> {
    let env = build_env(config_path).await?;
    let ctx = FetchContext::with_timeout(COMMAND_TIMEOUT);
    let report = AccountSyncOrchestrator::new(env)
        .sync_many(&ctx, user_id, account_ids)
        .await?;
    print_json(&report)
}

async fn run_catalog_sync(
    cmd: &str,
    config_path: &str,
    user_id: &str,
    account_id: &str,
    subscription_id: &str,
    location: &str,
) -> Result<()> {
    let env = build_env(config_path).await?;
    let ctx = FetchContext::with_timeout(COMMAND_TIMEOUT);
    let service = CatalogSyncService::new(env);
    let summary = match cmd {
        "sync-regions" => {
            service
                .sync_regions(&ctx, user_id, account_id, subscription_id)
                .await?
        }
        "sync-sizes" => {
            service
                .sync_sizes(&ctx, user_id, account_id, subscription_id, location)
                .await?
        }
        _ => {
            service
                .sync_images(&ctx, user_id, account_id, subscription_id, location)
                .await?
        }
    };
    print_json(&summary)
}

#[allow(clippy::print_stdout)]
fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
