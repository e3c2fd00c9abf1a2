use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing for a process embedding the pipeline.
pub fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "papermill=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;
    Ok(())
}
