//! displace
//!
//! Renders one displacement job from configuration: loads the base image and
//! displacement map (or generates a broken-tile map), renders, and writes the
//! frame and map preview as PNG.

use std::path::Path;
use std::sync::Arc;
use anyhow::{bail, Context};
use tracing::{error, info};

use displacement_engine::config::Settings;
use displacement_engine::engine::{
    Canvas, DecodeOutcome, DisplacementEngine, EngineOptions, PreviewSurface, SetOutcome,
};
use displacement_engine::loader::{DecodeError, ReferenceLoader};

fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("displacement_engine=info".parse()?)
        .add_directive("displace=info".parse()?);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

/// Wait for a background decode when the set-call did not adopt immediately
async fn settle(outcome: SetOutcome, what: &str) -> anyhow::Result<()> {
    match outcome {
        SetOutcome::Adopted => Ok(()),
        SetOutcome::Pending(pending) => match pending.wait().await {
            DecodeOutcome::Applied => Ok(()),
            DecodeOutcome::Superseded => bail!("{} decode was superseded", what),
            DecodeOutcome::Failed(e) => Err(e).with_context(|| format!("Failed to load {}", what)),
        },
    }
}

async fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let settings = Settings::load().context("Failed to load configuration")?;
    init_tracing(settings.log.json)?;

    info!(
        "Starting displace v{} ({}x{})",
        env!("CARGO_PKG_VERSION"),
        settings.engine.width,
        settings.engine.height
    );

    let (width, height) = (settings.engine.width, settings.engine.height);
    let canvas = Arc::new(Canvas::new(width, height));
    let preview = Arc::new(PreviewSurface::new((width / 4).max(1), (height / 4).max(1)));
    let loader = ReferenceLoader::new(&settings.loader).context("Failed to create HTTP client")?;

    let options = EngineOptions::from_settings(&settings.engine, &settings.render)
        .with_preview(preview.clone())
        .with_error_reporter(Arc::new(|e: &DecodeError| {
            error!(error = %e, "Asset decode failed");
        }));
    let engine = DisplacementEngine::new(canvas.clone(), options, Arc::new(loader))?;
    let mut notices = engine.subscribe()?;

    let base = settings
        .job
        .base
        .clone()
        .context("No base image configured (set job.base or DISPLACE_JOB__BASE)")?;
    settle(engine.set_base_image(base)?, "base image").await?;

    match settings.job.map.clone() {
        Some(reference) => {
            settle(engine.set_displacement_map(reference)?, "displacement map").await?;
        }
        None => {
            let pattern = settings.pattern.to_broken_map();
            info!(
                density = pattern.noise_density(),
                direction = ?pattern.direction(),
                block_size = pattern.block_size(),
                seed = settings.pattern.seed,
                "No map configured, generating broken map"
            );
            let map = pattern.generate(width, height, settings.pattern.seed)?;
            settle(engine.set_displacement_map(map)?, "displacement map").await?;
        }
    }

    let outcome = engine.render()?;
    if !outcome.produced_frame() {
        bail!("Nothing was rendered");
    }

    let mut frames = 0;
    while notices.try_recv().is_ok() {
        frames += 1;
    }
    info!(frames = frames, outcome = ?outcome, "Render complete");

    if let Some(path) = settings.job.output.as_deref() {
        ensure_parent(path).await?;
        canvas
            .save_png(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "Wrote frame");
    }

    if let Some(path) = settings.job.preview.as_deref() {
        ensure_parent(path).await?;
        preview
            .save_png(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "Wrote map preview");
    }

    engine.close();
    Ok(())
}
