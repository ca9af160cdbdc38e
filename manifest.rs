use crate::*;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use regex::Regex;
use serde::Serialize;
use sha2::Digest;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Single precached asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub url: String,
    /// SHA-256 of the contents, `None` when the url itself is content-hashed
    pub revision: Option<String>,
    #[serde(skip)]
    pub size: u64,
}

/// Precache entries sorted by url, along with everything worth telling the user about
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
    pub warnings: Vec<String>,
}

impl Manifest {
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn size(&self) -> u64 {
        self.entries.iter().map(|entry| entry.size).sum()
    }
}

/// File that matched the globs, before any transforms
struct Candidate {
    rel_path: String,
    full_path: PathBuf,
    size: u64,
}

fn compile(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        // `*` must not cross directories
        builder.add(GlobBuilder::new(pattern).literal_separator(true).build()?);
    }
    Ok(builder.build()?)
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn path_to_str<P: AsRef<Path>>(p: P) -> String {
    let path = p.as_ref().to_string_lossy().into_owned();
    if std::path::MAIN_SEPARATOR == '\\' {
        path.replace('\\', "/")
    } else {
        path
    }
}

/// Walks the glob directory and returns every file matched by the includes and not by the excludes,
/// along with the indices of include patterns that matched nothing
fn find_candidates(config: &GenerateConfig) -> Result<(Vec<Candidate>, Vec<usize>)> {
    let includes = compile(&config.glob_patterns)?;
    let excludes = compile(&config.glob_ignores)?;
    let sw_dest = fs::canonicalize(&config.sw_dest).ok();

    let mut matched = vec![false; config.glob_patterns.len()];
    let mut candidates = vec![];

    let walker = walkdir::WalkDir::new(&config.glob_directory)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        // dotfiles and dot directories are never precached
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel_path) = entry.path().strip_prefix(&config.glob_directory) else {
            continue;
        };
        let rel_path = path_to_str(rel_path);

        if excludes.is_match(&rel_path) {
            continue;
        }
        let hits = includes.matches(&rel_path);
        if hits.is_empty() {
            continue;
        }

        let full_path = fs::canonicalize(entry.path())?;
        // the worker never precaches itself
        if sw_dest.as_ref() == Some(&full_path) {
            continue;
        }
        for idx in hits {
            matched[idx] = true;
        }

        let size = entry.metadata()?.len();
        candidates.push(Candidate {
            rel_path,
            full_path,
            size,
        });
    }

    let unmatched = matched
        .iter()
        .enumerate()
        .filter_map(|(idx, hit)| (!hit).then_some(idx))
        .collect();

    Ok((candidates, unmatched))
}

fn sha256_hex(path: &Path) -> Result<String> {
    let data = fs::read(path)?;
    let mut hasher = sha2::Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

fn modify_prefix(url: String, config: &GenerateConfig) -> String {
    for (from, to) in &config.modify_url_prefix {
        if let Some(rest) = url.strip_prefix(from.as_str()) {
            return format!("{to}{rest}");
        }
    }
    url
}

fn unmatched_warning(config: &GenerateConfig, pattern: &str) -> Result<String> {
    let details = serde_json::json!({
        "globDirectory": path_to_str(&config.glob_directory),
        "globPattern": pattern,
        "globIgnores": config.glob_ignores,
    });
    Ok(format!(
        "One of the glob patterns doesn't match any files. Please remove or fix the following: {}",
        serde_json::to_string(&details)?
    ))
}

/// Builds the precache manifest for the given config, blocking on filesystem access
pub fn build_manifest(config: &GenerateConfig) -> Result<Manifest> {
    let (candidates, unmatched) = find_candidates(config)?;
    let dont_bust = config
        .dont_cache_bust_urls_matching
        .as_deref()
        .map(Regex::new)
        .transpose()?;

    let mut manifest = Manifest::default();
    for idx in unmatched {
        let pattern = &config.glob_patterns[idx];
        warn!("glob pattern {pattern} matched no files");
        manifest.warnings.push(unmatched_warning(config, pattern)?);
    }

    for Candidate {
        rel_path,
        full_path,
        size,
    } in candidates
    {
        if size > config.maximum_file_size_to_cache_in_bytes {
            manifest.warnings.push(format!(
                "{rel_path} is {size} B, and won't be precached. Configure maximumFileSizeToCacheInBytes to change this limit."
            ));
            continue;
        }

        let url = modify_prefix(rel_path, config);
        let revision = match &dont_bust {
            Some(regex) if regex.is_match(&url) => None,
            _ => Some(sha256_hex(&full_path)?),
        };
        trace!("precaching {url} ({size} B)");
        manifest.entries.push(ManifestEntry {
            url,
            revision,
            size,
        });
    }

    manifest.entries.sort_by(|a, b| a.url.cmp(&b.url));
    manifest.entries.dedup_by(|a, b| a.url == b.url);
    Ok(manifest)
}
