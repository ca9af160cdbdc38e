use crate::*;

use std::io::Write;

/// Line printed after a successful generation
pub fn summary(result: &GenerateResult) -> String {
    format!(
        "Generated {}, which will precache {} files, totaling {} bytes.",
        result.file_path.display(),
        result.count,
        result.size
    )
}

/// Writes every warning to `err` one per line in the order received, then the summary to `out`
pub fn report(result: &GenerateResult, out: &mut impl Write, err: &mut impl Write) -> std::io::Result<()> {
    for warning in &result.warnings {
        writeln!(err, "{warning}")?;
    }
    writeln!(out, "{}", summary(result))
}

/// Awaits a single generation and reports it, failures are returned untouched
pub async fn run<G: Generator + ?Sized>(
    generator: &G,
    config: &GenerateConfig,
    out: &mut impl Write,
    err: &mut impl Write,
) -> Result<GenerateResult> {
    info!("generating service worker at {}", config.sw_dest.display());
    let mut result = generator.generate_sw(config).await?;
    // report the destination the caller configured
    result.file_path = config.sw_dest.clone();
    report(&result, out, err)?;
    Ok(result)
}
