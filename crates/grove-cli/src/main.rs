// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `grove`: console walkthroughs against a Gremlin endpoint.
//! Query results go to stdout; logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use grove_app_core::GroveSettings;
use grove_cli::{cases, run_cases, setup};
use grove_client::{ensure_collection, GraphClient, PartitionCatalog};
use grove_cosmos::{CosmosRestProvisioner, GremlinEndpoint, GremlinWsService, MasterKey};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Partition-aware Gremlin walkthroughs")]
struct Args {
    /// Directory holding appsettings.json (defaults to the working directory, then the user config dir)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
    /// Gremlin host name
    #[arg(long, global = true, env = "GROVE_GREMLIN_ENDPOINT")]
    endpoint: Option<String>,
    /// Gremlin port
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Account key
    #[arg(long, global = true, env = "GROVE_AUTH_KEY", hide_env_values = true)]
    auth_key: Option<String>,
    /// Management endpoint used to create the database and collection
    #[arg(long, global = true, env = "GROVE_DOCUMENT_ENDPOINT")]
    document_endpoint: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Basic graph operations on an unpartitioned collection
    GetStarted,
    /// Partition-aware graph operations on a collection partitioned by firstName
    Partitioned,
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        config_dir,
        endpoint,
        port,
        auth_key,
        document_endpoint,
        command,
    } = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let overrides = setup::Overrides {
        endpoint,
        port,
        auth_key,
        document_endpoint,
    };
    let store = setup::settings_store(config_dir.as_deref())?;
    info!(dir = %store.base().display(), "reading settings");

    let (settings, walkthrough) = match command {
        Command::GetStarted => {
            let settings = setup::load_settings(store, &overrides, setup::get_started_settings)?;
            (settings, cases::get_started())
        }
        Command::Partitioned => {
            let settings = setup::load_settings(store, &overrides, setup::partitioned_settings)?;
            if settings.collection.document_endpoint.trim().is_empty() {
                bail!("the partitioned walkthrough needs --document-endpoint to provision its collection");
            }
            let key = settings
                .collection
                .partition_key
                .clone()
                .unwrap_or_else(|| cases::DEMO_PARTITION_KEY.to_string());
            let walkthrough = cases::partitioned(&key, &setup::seed_partitions(&settings));
            (settings, walkthrough)
        }
    };

    if !settings.collection.document_endpoint.trim().is_empty() {
        provision(&settings).await?;
    }

    let catalog = Arc::new(PartitionCatalog::new(setup::seed_partitions(&settings)));
    let service = GremlinWsService::new(GremlinEndpoint {
        url: settings.gremlin.url(),
        username: settings.collection.resource_link(),
        password: settings.gremlin.auth_key.clone(),
        connect_timeout: settings.engine.request_timeout(),
    });
    let client = GraphClient::new(
        service,
        settings.collection.partition_key_descriptor(),
        catalog,
        setup::engine_config(&settings.engine),
    )
    .with_dedupe(settings.engine.dedupe);

    let mut out = std::io::stdout();
    run_cases(&client, &walkthrough, &mut out).await?;
    info!("walkthrough complete");
    Ok(())
}

async fn provision(settings: &GroveSettings) -> Result<()> {
    let key = MasterKey::from_base64(&settings.gremlin.auth_key).context("decoding account key")?;
    let provisioner = CosmosRestProvisioner::new(
        &settings.collection.document_endpoint,
        key,
        Duration::from_secs(30),
    )
    .context("building management client")?;
    let spec = setup::collection_spec(settings);
    let collection = ensure_collection(&provisioner, &spec)
        .await
        .with_context(|| format!("provisioning {}", settings.collection.resource_link()))?;
    info!(
        database = %collection.database,
        collection = %collection.collection,
        partition_key = ?collection.partition_key_path,
        "collection ready"
    );
    Ok(())
}
