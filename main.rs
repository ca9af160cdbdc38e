use anyhow::Result;
use prest_precache::{init_tracing_subscriber, run, GenerateConfig, PrecacheGenerator};

static CACHE_ID: &str = "keck-mb-parts-exchange-manager";
static GLOB_DIRECTORY: &str = "./dist/";
static GLOB_PATTERNS: [&str; 1] = ["**/*.{html,js,css}"];

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing_subscriber();

    let dist_dir = std::env::current_dir()?.join("dist");
    let sw_dest = dist_dir.join("sw.js");

    let config = GenerateConfig::new(CACHE_ID, sw_dest, GLOB_DIRECTORY)
        .glob_patterns(GLOB_PATTERNS)
        .runtime_caching(vec![]);

    let (mut out, mut err) = (std::io::stdout(), std::io::stderr());
    run(&PrecacheGenerator, &config, &mut out, &mut err).await?;
    Ok(())
}
