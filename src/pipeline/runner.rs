//! Per-profile orchestration and batch execution.
//!
//! One profile moves through generate → build → run → cleanup. The first
//! stage failure is recorded and short-circuits the rest: later stages are
//! never run against resources that were not produced. The batch runner
//! isolates profile failures from each other and reports results in input
//! order.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::Profile;
use crate::dockerfile::ProjectMarkers;
use crate::engine::EngineClient;
use crate::naming::ResourceNamer;
use crate::pipeline::reaper::Reaper;
use crate::pipeline::result::PipelineResult;
use crate::pipeline::stages;

/// Options shared by every profile run in a batch.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Verification command; `None` uses the diagnostic echo.
    pub command: Option<String>,
    /// Remove descriptor, image and container after the run.
    pub clean: bool,
    /// Directory the descriptor is written to; also the build context.
    pub descriptor_dir: PathBuf,
    /// Deadline for the container wait. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            command: None,
            clean: false,
            descriptor_dir: PathBuf::from("."),
            timeout: None,
        }
    }
}

/// Drives one profile through the stage state machine.
///
/// Always returns a result; failures are recorded into it, never propagated.
/// Whatever fields were populated before a failure stay populated.
pub async fn run_one(
    client: &EngineClient,
    profile: &Profile,
    namer: &mut ResourceNamer,
    opts: &RunOptions,
) -> PipelineResult {
    let mut result = PipelineResult::new(&profile.tag);
    let image_tag = namer.image_tag_for(&profile.tag, &profile.base_image);
    let mut container_name = None;

    run_stages(
        client,
        profile,
        &image_tag,
        namer,
        opts,
        &mut result,
        &mut container_name,
    )
    .await;

    if let Some(error) = &result.error {
        warn!(profile = %profile.tag, %error, "pipeline failed");
    }

    if opts.clean {
        cleanup(client, &result, &image_tag, container_name.as_deref()).await;
    }

    result
}

async fn run_stages(
    client: &EngineClient,
    profile: &Profile,
    image_tag: &str,
    namer: &mut ResourceNamer,
    opts: &RunOptions,
    result: &mut PipelineResult,
    container_name: &mut Option<String>,
) {
    let markers = ProjectMarkers::detect(&opts.descriptor_dir);
    let descriptor = match stages::generate(
        &profile.base_image,
        &profile.setup_commands,
        markers,
        image_tag,
        &opts.descriptor_dir,
    )
    .await
    {
        Ok(descriptor) => descriptor,
        Err(e) => {
            result.error = Some(e);
            return;
        }
    };
    let descriptor_name = crate::dockerfile::descriptor_name(image_tag);
    result.descriptor = Some(descriptor);

    match stages::build(client, &opts.descriptor_dir, &descriptor_name, image_tag).await {
        Ok(image) => result.image = Some(image),
        Err(e) => {
            result.error = Some(e);
            return;
        }
    }

    // The name is issued here so a failed wait still leaves a handle for
    // the reaper.
    let name = namer.container_name_for(image_tag);
    *container_name = Some(name.clone());

    match stages::run(
        client,
        image_tag,
        opts.command.as_deref(),
        &name,
        opts.timeout,
    )
    .await
    {
        Ok(container) => result.container = Some(container),
        Err(e) => result.error = Some(e),
    }
}

/// Reaps whatever the run left behind, in descriptor → container → image →
/// dangling order. Never alters the recorded result.
async fn cleanup(
    client: &EngineClient,
    result: &PipelineResult,
    image_tag: &str,
    container_name: Option<&str>,
) {
    let reaper = Reaper::new(client);

    if let Some(descriptor) = &result.descriptor {
        reaper
            .remove_descriptor(std::path::Path::new(&descriptor.path))
            .await;
    }
    if let Some(name) = container_name {
        reaper.remove_container(name).await;
    }
    if result.image.is_some() {
        reaper.remove_image(image_tag).await;
    }
    reaper.prune_dangling_images().await;
}

/// Runs every profile in order and returns one result per profile.
///
/// Per-profile failures are isolated; the batch always completes with
/// exactly `profiles.len()` results. The engine connection is acquired by
/// the caller before this is invoked, so a dead daemon aborts the batch
/// before any profile is attempted.
pub async fn run_batch(
    client: &EngineClient,
    profiles: &[Profile],
    opts: &RunOptions,
) -> Vec<PipelineResult> {
    let mut namer = ResourceNamer::new();
    let mut results = Vec::with_capacity(profiles.len());

    info!(count = profiles.len(), "starting container matrix");

    for (index, profile) in profiles.iter().enumerate() {
        info!(
            test = index + 1,
            total = profiles.len(),
            profile = %profile.tag,
            base = %profile.base_image,
            "running profile"
        );

        let result = run_one(client, profile, &mut namer, opts).await;

        if opts.clean {
            // Batch cleanup also drops the pulled base image.
            Reaper::new(client).remove_image(&profile.base_image).await;
        }

        results.push(result);
    }

    results
}
