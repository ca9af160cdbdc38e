use crate::*;

use std::{path::PathBuf, time::Instant};

/// Outcome of a successful generation
#[derive(Debug, Clone, Default)]
pub struct GenerateResult {
    pub warnings: Vec<String>,
    /// Number of precached files
    pub count: usize,
    /// Total size of precached files in bytes
    pub size: u64,
    pub file_path: PathBuf,
    pub manifest: Vec<ManifestEntry>,
}

/// Anything that can turn a [`GenerateConfig`] into a service worker on disk
#[async_trait]
pub trait Generator {
    async fn generate_sw(&self, config: &GenerateConfig) -> Result<GenerateResult>;
}

/// Default [`Generator`] which precaches files from the glob directory
#[derive(Debug, Clone, Copy, Default)]
pub struct PrecacheGenerator;

#[async_trait]
impl Generator for PrecacheGenerator {
    async fn generate_sw(&self, config: &GenerateConfig) -> Result<GenerateResult> {
        let start = Instant::now();
        config.validate()?;
        if !config.glob_directory.is_dir() {
            return Err(Error::MissingGlobDirectory(config.glob_directory.clone()));
        }

        let owned = config.clone();
        let manifest = tokio::task::spawn_blocking(move || build_manifest(&owned)).await??;
        let sw = crate::sw::render(config, &manifest)?;

        if let Some(parent) = config.sw_dest.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&config.sw_dest, sw).await?;

        debug!(
            "generated {} with {} entries in {}ms",
            config.sw_dest.display(),
            manifest.count(),
            start.elapsed().as_millis()
        );

        Ok(GenerateResult {
            count: manifest.count(),
            size: manifest.size(),
            file_path: config.sw_dest.clone(),
            warnings: manifest.warnings,
            manifest: manifest.entries,
        })
    }
}

/// Shorthand for [`PrecacheGenerator::generate_sw`]
pub async fn generate_sw(config: &GenerateConfig) -> Result<GenerateResult> {
    PrecacheGenerator.generate_sw(config).await
}
