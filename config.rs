use crate::*;

use globset::Glob;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

/// Default upper bound for a single precached file, 2 MiB
pub const DEFAULT_MAXIMUM_FILE_SIZE: u64 = 2 * 1024 * 1024;
pub static DEFAULT_GLOB_IGNORES: [&str; 1] = ["**/node_modules/**/*"];
pub static DEFAULT_IGNORED_URL_PARAMS: [&str; 2] = ["^utm_", "^fbclid$"];
pub static DEFAULT_DIRECTORY_INDEX: &str = "index.html";

/// Describes what to precache and where to write the generated service worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct GenerateConfig {
    /// Prefix of every cache name used by the worker
    pub cache_id: String,
    /// Destination of the generated worker script
    pub sw_dest: PathBuf,
    /// Directory the glob patterns are resolved against
    pub glob_directory: PathBuf,
    pub glob_patterns: Vec<String>,
    pub glob_ignores: Vec<String>,
    pub runtime_caching: Vec<RuntimeCaching>,
    pub maximum_file_size_to_cache_in_bytes: u64,
    /// URLs matching this regex are already content-hashed and get no revision
    pub dont_cache_bust_urls_matching: Option<String>,
    pub modify_url_prefix: BTreeMap<String, String>,
    pub navigate_fallback: Option<String>,
    pub navigate_fallback_denylist: Vec<String>,
    pub ignore_url_parameters_matching: Vec<String>,
    pub directory_index: Option<String>,
    pub skip_waiting: bool,
    pub clients_claim: bool,
    pub cleanup_outdated_caches: bool,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            cache_id: "prest".to_owned(),
            sw_dest: PathBuf::from("dist/sw.js"),
            glob_directory: PathBuf::from("dist"),
            glob_patterns: vec!["**/*.{html,js,css}".to_owned()],
            glob_ignores: DEFAULT_GLOB_IGNORES.map(str::to_owned).to_vec(),
            runtime_caching: vec![],
            maximum_file_size_to_cache_in_bytes: DEFAULT_MAXIMUM_FILE_SIZE,
            dont_cache_bust_urls_matching: None,
            modify_url_prefix: BTreeMap::new(),
            navigate_fallback: None,
            navigate_fallback_denylist: vec![],
            ignore_url_parameters_matching: DEFAULT_IGNORED_URL_PARAMS.map(str::to_owned).to_vec(),
            directory_index: Some(DEFAULT_DIRECTORY_INDEX.to_owned()),
            skip_waiting: false,
            clients_claim: false,
            cleanup_outdated_caches: false,
        }
    }
}

impl GenerateConfig {
    pub fn new(
        cache_id: impl Into<String>,
        sw_dest: impl Into<PathBuf>,
        glob_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            cache_id: cache_id.into(),
            sw_dest: sw_dest.into(),
            glob_directory: glob_directory.into(),
            ..Default::default()
        }
    }

    pub fn glob_patterns<S: Into<String>>(mut self, patterns: impl IntoIterator<Item = S>) -> Self {
        self.glob_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn glob_ignores<S: Into<String>>(mut self, patterns: impl IntoIterator<Item = S>) -> Self {
        self.glob_ignores = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn runtime_caching(mut self, rules: Vec<RuntimeCaching>) -> Self {
        self.runtime_caching = rules;
        self
    }

    pub fn maximum_file_size(mut self, bytes: u64) -> Self {
        self.maximum_file_size_to_cache_in_bytes = bytes;
        self
    }

    pub fn dont_cache_bust(mut self, regex: impl Into<String>) -> Self {
        self.dont_cache_bust_urls_matching = Some(regex.into());
        self
    }

    pub fn modify_prefix(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.modify_url_prefix.insert(from.into(), to.into());
        self
    }

    pub fn navigate_fallback(mut self, url: impl Into<String>) -> Self {
        self.navigate_fallback = Some(url.into());
        self
    }

    pub fn skip_waiting(mut self, value: bool) -> Self {
        self.skip_waiting = value;
        self
    }

    pub fn clients_claim(mut self, value: bool) -> Self {
        self.clients_claim = value;
        self
    }

    pub fn cleanup_outdated_caches(mut self, value: bool) -> Self {
        self.cleanup_outdated_caches = value;
        self
    }

    /// Parses a TOML document, missing keys take their defaults
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("loading precache config from {}", path.display());
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Checks everything that can be checked without touching the glob directory
    pub fn validate(&self) -> Result {
        if self.cache_id.is_empty() {
            return Err(invalid!("cache-id must not be empty"));
        }
        if let Some(c) = self
            .cache_id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(invalid!("cache-id contains unsupported character {c:?}"));
        }
        if self.sw_dest.extension().and_then(|ext| ext.to_str()) != Some("js") {
            return Err(invalid!(
                "sw-dest must end with .js, got {}",
                self.sw_dest.display()
            ));
        }
        if self.glob_patterns.is_empty() {
            return Err(invalid!("at least one glob pattern is required"));
        }
        for pattern in self.glob_patterns.iter().chain(&self.glob_ignores) {
            Glob::new(pattern)?;
        }
        // evaluated by the generator itself
        if let Some(regex) = &self.dont_cache_bust_urls_matching {
            Regex::new(regex)?;
        }
        // evaluated by the browser as `new RegExp(..)`
        let browser_regexes = self
            .navigate_fallback_denylist
            .iter()
            .chain(&self.ignore_url_parameters_matching)
            .chain(self.runtime_caching.iter().map(|rule| &rule.url_pattern));
        for regex in browser_regexes {
            check_browser_regex(regex)?;
        }
        for rule in &self.runtime_caching {
            rule.validate()?;
        }
        Ok(())
    }

    pub(crate) fn precache_name(&self) -> String {
        format!("{}-precache-v2", self.cache_id)
    }

    pub(crate) fn runtime_name(&self) -> String {
        format!("{}-runtime", self.cache_id)
    }
}

/// Rejects constructs that either `regex` or JS `RegExp` would treat differently or not at all:
/// inline flag groups, Rust-only escapes and unbalanced groups
fn check_browser_regex(pattern: &str) -> Result {
    let mut chars = pattern.chars().peekable();
    let mut depth = 0usize;
    let mut in_class = false;
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escape @ ('A' | 'z' | 'Z' | 'p' | 'P')) => {
                    return Err(invalid!(
                        "pattern {pattern:?} uses \\{escape} which browsers don't support"
                    ));
                }
                Some(_) => {}
                None => return Err(invalid!("pattern {pattern:?} ends with a dangling escape")),
            },
            '[' if !in_class => in_class = true,
            ']' if in_class => in_class = false,
            '(' if !in_class => {
                depth += 1;
                if chars.peek() == Some(&'?') {
                    chars.next();
                    let group = chars.next();
                    let supported = match group {
                        Some(':' | '=' | '!') => true,
                        // lookbehind or named group, `(?P<` is rejected below
                        Some('<') => true,
                        _ => false,
                    };
                    if !supported {
                        return Err(invalid!(
                            "pattern {pattern:?} uses an inline flag or group syntax browsers don't support"
                        ));
                    }
                }
            }
            ')' if !in_class => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| invalid!("pattern {pattern:?} has an unmatched ')'"))?;
            }
            _ => {}
        }
    }
    if depth != 0 || in_class {
        return Err(invalid!("pattern {pattern:?} has an unclosed group or class"));
    }
    Ok(())
}

/// Caching strategy applied by a runtime rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    CacheFirst,
    CacheOnly,
    NetworkFirst,
    NetworkOnly,
    StaleWhileRevalidate,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::CacheFirst => "CacheFirst",
            Strategy::CacheOnly => "CacheOnly",
            Strategy::NetworkFirst => "NetworkFirst",
            Strategy::NetworkOnly => "NetworkOnly",
            Strategy::StaleWhileRevalidate => "StaleWhileRevalidate",
        }
    }

    fn supports_timeout(&self) -> bool {
        matches!(self, Strategy::NetworkFirst | Strategy::NetworkOnly)
    }
}

/// Rule for requests that are not precached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RuntimeCaching {
    /// Regex tested against the full request URL
    pub url_pattern: String,
    pub handler: Strategy,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub options: RuntimeOptions,
}

fn default_method() -> String {
    "GET".to_owned()
}

impl RuntimeCaching {
    pub fn new(url_pattern: impl Into<String>, handler: Strategy) -> Self {
        Self {
            url_pattern: url_pattern.into(),
            handler,
            method: default_method(),
            options: RuntimeOptions::default(),
        }
    }

    pub fn cache_name(mut self, name: impl Into<String>) -> Self {
        self.options.cache_name = Some(name.into());
        self
    }

    pub fn network_timeout(mut self, seconds: u32) -> Self {
        self.options.network_timeout_seconds = Some(seconds);
        self
    }

    pub fn expiration(mut self, max_entries: Option<u32>, max_age_seconds: Option<u64>) -> Self {
        self.options.expiration = Some(Expiration {
            max_entries,
            max_age_seconds,
        });
        self
    }

    fn validate(&self) -> Result {
        if self.options.network_timeout_seconds.is_some() && !self.handler.supports_timeout() {
            return Err(invalid!(
                "network-timeout-seconds is only supported by NetworkFirst and NetworkOnly, not {}",
                self.handler.as_str()
            ));
        }
        if self.method.is_empty() {
            return Err(invalid!("runtime caching method must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RuntimeOptions {
    pub cache_name: Option<String>,
    pub network_timeout_seconds: Option<u32>,
    pub expiration: Option<Expiration>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Expiration {
    pub max_entries: Option<u32>,
    pub max_age_seconds: Option<u64>,
}
