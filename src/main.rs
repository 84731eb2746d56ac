//! # envlayer
//!
//! Command-line driver for a single managed env secret layer.
//!
//! The resource definition lives in a YAML file and the last published state in
//! a JSON file next to it. Each command loads both, runs one lifecycle
//! operation and writes the resulting state back.
//!
//! ## Usage
//!
//! ```bash
//! # Show what apply would do
//! envlayer plan --resource layer.yaml
//!
//! # Publish the layer (create or update)
//! envlayer apply --resource layer.yaml --state envlayer.state.json
//!
//! # Check the published layer for secret drift
//! envlayer refresh --resource layer.yaml
//!
//! # Delete every published version
//! envlayer destroy --resource layer.yaml
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use env_secret_layer::constants::{DEFAULT_LOG_FILTER, DEFAULT_STATE_FILE};
use env_secret_layer::provider::aws::{load_sdk_config, AwsLambdaLayers, AwsSecretsManager};
use env_secret_layer::{
    AwsConfig, FieldPlan, LayerSpec, ManagedResourceState, Reconciler, UpdateOutcome,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Manage an AWS Lambda layer holding environment variables and secrets
#[derive(Parser)]
#[command(name = "envlayer", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// AWS region (defaults to the SDK provider chain)
    #[arg(long, global = true, env = "AWS_REGION")]
    region: Option<String>,

    /// AWS shared config profile
    #[arg(long, global = true, env = "AWS_PROFILE")]
    profile: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Preview changes without publishing anything
    Plan(Paths),
    /// Create or update the layer and save the new state
    Apply(Paths),
    /// Detect secret drift and save the flagged state
    Refresh(Paths),
    /// Delete every version of the layer and remove the state file
    Destroy(Paths),
}

#[derive(Args)]
struct Paths {
    /// Layer resource definition (YAML)
    #[arg(long, short)]
    resource: PathBuf,

    /// State file
    #[arg(long, short, default_value = DEFAULT_STATE_FILE)]
    state: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let cli = Cli::parse();

    let aws = AwsConfig {
        region: cli.region,
        profile: cli.profile,
    };
    let sdk_config = load_sdk_config(&aws).await;
    let reconciler = Reconciler::new(
        Arc::new(AwsSecretsManager::new(&sdk_config)),
        Arc::new(AwsLambdaLayers::new(&sdk_config)),
    );

    match cli.command {
        Commands::Plan(paths) => plan_command(&reconciler, &paths).await,
        Commands::Apply(paths) => apply_command(&reconciler, &paths).await,
        Commands::Refresh(paths) => refresh_command(&reconciler, &paths).await,
        Commands::Destroy(paths) => destroy_command(&reconciler, &paths).await,
    }
}

async fn load(paths: &Paths) -> Result<(LayerSpec, Option<ManagedResourceState>)> {
    let spec = LayerSpec::load(&paths.resource).await?;
    let state = ManagedResourceState::load(&paths.state).await?;
    Ok((spec, state))
}

async fn plan_command(reconciler: &Reconciler, paths: &Paths) -> Result<()> {
    let (spec, state) = load(paths).await?;

    let Some(state) = state else {
        println!("+ layer {} will be created", spec.layer_name);
        return Ok(());
    };

    let preview = reconciler
        .diff_preview(&state, &spec)
        .await
        .context("Failed to compute plan")?;

    if !preview.has_changes() {
        println!("No changes. Layer {} is up to date.", spec.layer_name);
        return Ok(());
    }

    let action = if spec.skip_destroy {
        "published as a new version"
    } else {
        "replaced"
    };
    println!("~ layer {} will be {}", spec.layer_name, action);
    for field in &preview.changed_fields {
        println!("    ~ {field}");
    }
    if preview.secrets_drifted {
        println!("    ~ secrets changed in the secret store");
    }
    if state.needs_update {
        println!("    ~ flagged for update by a previous refresh");
    }
    println!("    stored_fingerprint: {}", preview.stored_fingerprint);
    println!("    layer_version_arn:  {}", preview.layer_version_arn);
    if preview.stored_fingerprint == FieldPlan::Unchanged {
        println!("    (fingerprint {})", state.stored_fingerprint);
    }
    Ok(())
}

async fn apply_command(reconciler: &Reconciler, paths: &Paths) -> Result<()> {
    let (spec, state) = load(paths).await?;

    let new_state = match state {
        None => reconciler
            .create(&spec)
            .await
            .context(format!("Failed to create layer {}", spec.layer_name))?,
        Some(state) => match reconciler
            .update(&state, &spec)
            .await
            .context(format!("Failed to update layer {}", spec.layer_name))?
        {
            UpdateOutcome::Unchanged => {
                println!("No changes. Layer {} is up to date.", spec.layer_name);
                return Ok(());
            }
            UpdateOutcome::Republished {
                state,
                deleted_versions,
            } => {
                info!("Deleted {} previous versions", deleted_versions);
                *state
            }
        },
    };

    new_state.save(&paths.state).await?;
    println!("✅ Published {}", new_state.layer_version_arn);
    Ok(())
}

async fn refresh_command(reconciler: &Reconciler, paths: &Paths) -> Result<()> {
    let (spec, state) = load(paths).await?;

    let Some(mut state) = state else {
        println!("Layer {} has not been created", spec.layer_name);
        return Ok(());
    };

    let drifted = reconciler
        .read(&mut state)
        .await
        .context(format!("Failed to refresh layer {}", spec.layer_name))?;

    state.save(&paths.state).await?;
    if drifted {
        println!(
            "⚠️  Secrets for layer {} changed; run apply to publish a new version",
            spec.layer_name
        );
    } else {
        println!("Layer {} matches its secrets", spec.layer_name);
    }
    Ok(())
}

async fn destroy_command(reconciler: &Reconciler, paths: &Paths) -> Result<()> {
    let (spec, state) = load(paths).await?;

    let Some(state) = state else {
        println!("Layer {} has not been created", spec.layer_name);
        return Ok(());
    };

    let outcome = reconciler
        .delete(&state)
        .await
        .context(format!("Failed to destroy layer {}", spec.layer_name))?;

    ManagedResourceState::remove(&paths.state).await?;
    println!(
        "🗑️  Deleted {} versions of layer {}",
        outcome.deleted.len(),
        outcome.layer_name
    );
    Ok(())
}
