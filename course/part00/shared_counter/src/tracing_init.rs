use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
    Registry,
};

/// Workers log from pool threads, so lines carry the thread name alongside the
/// `run`/`worker` spans. stdout is reserved for the result, logs go to stderr.
pub fn init() -> Result<(), TryInitError> {
    Registry::default()
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_names(true)
                .with_writer(std::io::stderr),
        )
        .try_init()?;

    Ok(())
}
