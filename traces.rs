use tracing_subscriber::{
    filter::LevelFilter, fmt::time::ChronoUtc, layer::SubscriberExt, util::SubscriberInitExt,
    EnvFilter, Layer,
};

fn pretty_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy()
        .add_directive("globset=info".parse().expect("valid directive"))
}

/// Initializes log printing to stderr so stdout stays reserved for the summary
pub fn init_tracing_subscriber() {
    let shell_layer = tracing_subscriber::fmt::layer()
        .with_timer(ChronoUtc::new("%k:%M:%S".to_owned()))
        .with_writer(std::io::stderr)
        .with_filter(pretty_filter());

    // ignore a subscriber that is already set, e.g. by an embedding build script
    let _ = tracing_subscriber::registry().with(shell_layer).try_init();
}
