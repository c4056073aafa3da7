//! Dataset preparation binary
//!
//! Merges annotation files into a wide manifest, verifies every image exists,
//! and publishes the manifest next to a log of missing images.

use dataset_manifest::collector::MalformedPolicy;
use dataset_manifest::config::ComponentFactory;
use dataset_manifest::pipeline::{Pipeline, RunOutcome};
use dataset_manifest::telemetry::{LogFormat, Telemetry};
use dataset_manifest::PipelineConfig;

use clap::Parser;
use std::path::PathBuf;
use tracing::info;

/// Build and validate a dataset manifest
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cloud provider (memory, aws, local)
    #[arg(long, env = "CLOUD_PROVIDER")]
    cloud_provider: Option<String>,

    /// Provider bucket
    #[arg(long, env = "STORAGE_BUCKET")]
    bucket: Option<String>,

    /// Root directory for the local provider
    #[arg(long, env = "STORAGE_LOCAL_ROOT")]
    local_root: Option<PathBuf>,

    /// Prefix holding annotation JSON objects
    #[arg(long, env = "ANNOTATIONS_PREFIX", default_value = "dataset_annotations/")]
    annotations_prefix: String,

    /// Prefix holding image objects, keyed by item id
    #[arg(long, env = "IMAGES_PREFIX", default_value = "data_items/")]
    images_prefix: String,

    /// Prefix the manifest and logs are uploaded under
    #[arg(long, env = "DESTINATION_PREFIX", default_value = "datasets/v1/")]
    destination_prefix: String,

    /// Local directory for the written artifacts
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Local directory receiving downloaded annotation copies
    #[arg(long, default_value = "temp_annotations")]
    staging_dir: PathBuf,

    /// Do not keep local copies of downloaded annotations
    #[arg(long)]
    no_staging: bool,

    /// What to do with unparsable annotation objects (fail, skip)
    #[arg(long, default_value = "fail")]
    on_malformed: MalformedPolicy,

    /// Existence probes in flight
    #[arg(long, default_value = "8")]
    probe_concurrency: usize,

    /// Retries for probes failing with anything but "not found"
    #[arg(long, default_value = "1")]
    probe_retries: u32,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log format (json, pretty)
    #[arg(long, default_value = "pretty")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let telemetry =
        Telemetry::init_for_component("prepare-dataset", &args.log_level, args.log_format)?;

    let storage = ComponentFactory::resolve_storage_config(
        args.cloud_provider.as_deref(),
        args.bucket.as_deref(),
        args.local_root.as_deref(),
    )?;
    let object_store = ComponentFactory::create_object_store_for(&storage).await?;

    let config = PipelineConfig {
        storage,
        annotations_prefix: args.annotations_prefix,
        images_prefix: args.images_prefix,
        destination_prefix: args.destination_prefix,
        output_dir: args.output_dir,
        staging_dir: (!args.no_staging).then_some(args.staging_dir),
        malformed_policy: args.on_malformed,
        probe_concurrency: args.probe_concurrency,
        probe_retries: args.probe_retries,
    };

    info!(
        service = telemetry.service_name(),
        run_id = telemetry.run_id().unwrap_or("none"),
        provider = config.storage.provider.as_str(),
        bucket = %config.storage.bucket,
        "Setup complete. Ready to process."
    );

    let pipeline = Pipeline::new(config, object_store)?;
    match pipeline.run().await? {
        RunOutcome::NoLabels => {
            println!("No labels found. Exiting.");
        }
        RunOutcome::Published(summary) => {
            let bucket = &pipeline.config().storage.bucket;
            println!("Process complete");
            if let Some(run_id) = telemetry.run_id() {
                println!("Run id: {}", run_id);
            }
            println!(
                "Final manifest saved to {}/{}",
                bucket, summary.publish.manifest_key
            );
            if let Some(key) = &summary.publish.missing_key {
                println!(
                    "Missing images: {} (logged to {}/{})",
                    summary.publish.missing_count, bucket, key
                );
            }
            if let Some(key) = &summary.publish.unresolved_key {
                println!(
                    "Unverified images: {} (logged to {}/{})",
                    summary.publish.unresolved_count, bucket, key
                );
            }
            println!(
                "Total images in final dataset: {}",
                summary.publish.manifest_rows
            );
        }
    }

    Ok(())
}
