use crate::*;

use serde::Serialize;

static HEADER: &str = "// Generated by prest-precache. Do not edit, rerun the build step instead.\n";
static LISTENER_TEMPLATE: &str = "self.addEventListener('NAME', event => LISTENER);\n";

/// Install populates the precache, activate drops stale entries, fetch routes requests
static LISTENERS: [(&str, &str); 3] = [
    ("install", "event.waitUntil(precache())"),
    ("activate", "event.waitUntil(activate())"),
    ("fetch", "respond(event)"),
];
static SKIP_WAITING_LISTENER: (&str, &str) = (
    "message",
    "event.data && event.data.type === 'SKIP_WAITING' && self.skipWaiting()",
);

static RUNTIME: &str = r#"
const precacheKey = entry => {
  const url = new URL(entry.url, self.location);
  if (entry.revision) url.searchParams.set('__WB_REVISION__', entry.revision);
  return url.href;
};
const PRECACHED = new Map(
  PRECACHE_MANIFEST.map(entry => [new URL(entry.url, self.location).href, precacheKey(entry)])
);

function lookupPrecache(href) {
  const url = new URL(href);
  url.hash = '';
  if (PRECACHED.has(url.href)) return PRECACHED.get(url.href);
  for (const key of [...url.searchParams.keys()]) {
    if (IGNORE_URL_PARAMETERS_MATCHING.some(re => re.test(key))) url.searchParams.delete(key);
  }
  if (PRECACHED.has(url.href)) return PRECACHED.get(url.href);
  if (DIRECTORY_INDEX && url.pathname.endsWith('/')) {
    url.pathname += DIRECTORY_INDEX;
    if (PRECACHED.has(url.href)) return PRECACHED.get(url.href);
  }
  return null;
}

async function precache() {
  const cache = await caches.open(PRECACHE_NAME);
  const present = new Set((await cache.keys()).map(request => request.url));
  await Promise.all(PRECACHE_MANIFEST.map(async entry => {
    const key = precacheKey(entry);
    if (present.has(key)) return;
    const response = await fetch(new URL(entry.url, self.location).href, { credentials: 'same-origin', cache: 'reload' });
    if (!response.ok) throw new Error(`precaching ${entry.url} failed with status ${response.status}`);
    await cache.put(key, response);
  }));
  if (SKIP_WAITING) await self.skipWaiting();
}

async function activate() {
  const cache = await caches.open(PRECACHE_NAME);
  const expected = new Set(PRECACHED.values());
  for (const request of await cache.keys()) {
    if (!expected.has(request.url)) await cache.delete(request);
  }
  if (CLEANUP_OUTDATED_CACHES) {
    for (const name of await caches.keys()) {
      if (name.includes('-precache-') && name.endsWith(SCOPE) && name !== PRECACHE_NAME) await caches.delete(name);
    }
  }
  if (CLIENTS_CLAIM) await self.clients.claim();
}

async function fromPrecache(key, request) {
  const cache = await caches.open(PRECACHE_NAME);
  return (await cache.match(key)) || fetch(request);
}

function withTimeout(promise, seconds) {
  if (!seconds) return promise;
  const timeout = new Promise((_, reject) =>
    setTimeout(() => reject(new Error(`no network response in ${seconds}s`)), seconds * 1000)
  );
  return Promise.race([promise, timeout]);
}

async function trim(cache, maxEntries) {
  const keys = await cache.keys();
  for (const key of keys.slice(0, Math.max(0, keys.length - maxEntries))) await cache.delete(key);
}

async function fromCache(rule, request) {
  const cache = await caches.open(rule.cacheName);
  const response = await cache.match(request);
  if (response && rule.maxAgeSeconds) {
    const date = Date.parse(response.headers.get('date') || '');
    if (!Number.isNaN(date) && Date.now() - date > rule.maxAgeSeconds * 1000) {
      await cache.delete(request);
      return undefined;
    }
  }
  return response;
}

async function fromNetwork(rule, request) {
  const response = await withTimeout(fetch(request), rule.networkTimeoutSeconds);
  if (response.ok || response.type === 'opaque') {
    const cache = await caches.open(rule.cacheName);
    await cache.put(request, response.clone());
    if (rule.maxEntries) await trim(cache, rule.maxEntries);
  }
  return response;
}

const STRATEGIES = {
  CacheFirst: async (rule, request) => (await fromCache(rule, request)) || fromNetwork(rule, request),
  CacheOnly: async (rule, request) => {
    const cached = await fromCache(rule, request);
    if (!cached) throw new Error(`${request.url} is not cached`);
    return cached;
  },
  NetworkFirst: async (rule, request) => {
    try {
      return await fromNetwork(rule, request);
    } catch (err) {
      const cached = await fromCache(rule, request);
      if (cached) return cached;
      throw err;
    }
  },
  NetworkOnly: (rule, request) => withTimeout(fetch(request), rule.networkTimeoutSeconds),
  StaleWhileRevalidate: async (rule, request) => {
    const network = fromNetwork(rule, request);
    const cached = await fromCache(rule, request);
    if (!cached) return network;
    network.catch(() => {});
    return cached;
  },
};

function respond(event) {
  const { request } = event;
  const key = request.method === 'GET' ? lookupPrecache(request.url) : null;
  if (key) return event.respondWith(fromPrecache(key, request));
  if (request.mode === 'navigate' && NAVIGATE_FALLBACK) {
    const path = new URL(request.url).pathname;
    const fallback = lookupPrecache(new URL(NAVIGATE_FALLBACK, self.location).href);
    if (fallback && !NAVIGATE_FALLBACK_DENYLIST.some(re => re.test(path))) {
      return event.respondWith(fromPrecache(fallback, request));
    }
  }
  const rule = RUNTIME_CACHING.find(rule => rule.method === request.method && rule.pattern.test(request.url));
  if (rule) event.respondWith(STRATEGIES[rule.handler](rule, request));
}
"#;

fn js<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn js_regexes(patterns: &[String]) -> Result<String> {
    let regexes = patterns
        .iter()
        .map(|pattern| Ok(format!("new RegExp({})", js(pattern)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("[{}]", regexes.join(", ")))
}

fn js_rule(rule: &RuntimeCaching) -> Result<String> {
    let options = &rule.options;
    let cache_name = match &options.cache_name {
        Some(name) => js(name)?,
        None => "RUNTIME_NAME".to_owned(),
    };
    let expiration = options.expiration.clone().unwrap_or_default();
    Ok(format!(
        "  {{ method: {}, pattern: new RegExp({}), handler: {}, cacheName: {cache_name}, networkTimeoutSeconds: {}, maxEntries: {}, maxAgeSeconds: {} }},\n",
        js(&rule.method.to_uppercase())?,
        js(&rule.url_pattern)?,
        js(rule.handler.as_str())?,
        js(&options.network_timeout_seconds)?,
        js(&expiration.max_entries)?,
        js(&expiration.max_age_seconds)?,
    ))
}

/// Renders a self-contained service worker that precaches the manifest and applies runtime rules.
/// Output depends only on the arguments so identical builds produce identical workers.
pub fn render(config: &GenerateConfig, manifest: &Manifest) -> Result<String> {
    let mut sw = format!(
        "{HEADER}\
const SCOPE = self.registration.scope;
const PRECACHE_NAME = {precache_name} + '-' + SCOPE;
const RUNTIME_NAME = {runtime_name} + '-' + SCOPE;
const SKIP_WAITING = {skip_waiting};
const CLIENTS_CLAIM = {clients_claim};
const CLEANUP_OUTDATED_CACHES = {cleanup};
const DIRECTORY_INDEX = {directory_index};
const NAVIGATE_FALLBACK = {navigate_fallback};
const NAVIGATE_FALLBACK_DENYLIST = {denylist};
const IGNORE_URL_PARAMETERS_MATCHING = {ignored_params};
const PRECACHE_MANIFEST = {entries};
",
        precache_name = js(&config.precache_name())?,
        runtime_name = js(&config.runtime_name())?,
        skip_waiting = config.skip_waiting,
        clients_claim = config.clients_claim,
        cleanup = config.cleanup_outdated_caches,
        directory_index = js(&config.directory_index)?,
        navigate_fallback = js(&config.navigate_fallback)?,
        denylist = js_regexes(&config.navigate_fallback_denylist)?,
        ignored_params = js_regexes(&config.ignore_url_parameters_matching)?,
        entries = serde_json::to_string_pretty(&manifest.entries)?,
    );

    sw += "const RUNTIME_CACHING = [\n";
    for rule in &config.runtime_caching {
        sw += &js_rule(rule)?;
    }
    sw += "];\n";

    sw += RUNTIME;
    sw += "\n";

    let mut listeners = LISTENERS.to_vec();
    if !config.skip_waiting {
        listeners.push(SKIP_WAITING_LISTENER);
    }
    for (name, listener) in listeners {
        sw += LISTENER_TEMPLATE
            .replace("NAME", name)
            .replace("LISTENER", listener)
            .as_str();
    }
    Ok(sw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> Manifest {
        Manifest {
            entries: vec![
                ManifestEntry {
                    url: "app.js".to_owned(),
                    revision: Some("abc123".to_owned()),
                    size: 10,
                },
                ManifestEntry {
                    url: "app.3f9a.css".to_owned(),
                    revision: None,
                    size: 5,
                },
            ],
            warnings: vec![],
        }
    }

    #[test]
    fn embeds_manifest_and_cache_names() {
        let config = GenerateConfig::new("keck", "dist/sw.js", "dist");
        let sw = render(&config, &manifest()).unwrap();
        assert!(sw.starts_with(HEADER));
        assert!(sw.contains("const PRECACHE_NAME = \"keck-precache-v2\" + '-' + SCOPE;"));
        assert!(sw.contains("const RUNTIME_NAME = \"keck-runtime\" + '-' + SCOPE;"));
        assert!(sw.contains("\"url\": \"app.js\""));
        assert!(sw.contains("\"revision\": \"abc123\""));
        assert!(sw.contains("\"revision\": null"));
        assert!(!sw.contains("\"size\""));
        assert!(sw.contains("const RUNTIME_CACHING = [\n];\n"));
    }

    #[test]
    fn lifecycle_flags() {
        let config = GenerateConfig::new("keck", "dist/sw.js", "dist");
        let sw = render(&config, &manifest()).unwrap();
        assert!(sw.contains("const SKIP_WAITING = false;"));
        assert!(sw.contains("self.addEventListener('message', event => event.data && event.data.type === 'SKIP_WAITING' && self.skipWaiting());"));
        assert!(sw.contains("self.addEventListener('install', event => event.waitUntil(precache()));"));
        assert!(sw.contains("self.addEventListener('fetch', event => respond(event));"));

        let config = config.skip_waiting(true).clients_claim(true).cleanup_outdated_caches(true);
        let sw = render(&config, &manifest()).unwrap();
        assert!(sw.contains("const SKIP_WAITING = true;"));
        assert!(sw.contains("const CLIENTS_CLAIM = true;"));
        assert!(sw.contains("const CLEANUP_OUTDATED_CACHES = true;"));
        assert!(!sw.contains("addEventListener('message'"));
    }

    #[test]
    fn renders_runtime_rules() {
        let rules = vec![
            RuntimeCaching::new("^https://api\\.example\\.com/", Strategy::NetworkFirst).network_timeout(3),
            RuntimeCaching::new("\\.png$", Strategy::CacheFirst)
                .cache_name("images")
                .expiration(Some(50), Some(86400)),
        ];
        let config = GenerateConfig::new("keck", "dist/sw.js", "dist")
            .runtime_caching(rules)
            .navigate_fallback("index.html");
        let sw = render(&config, &manifest()).unwrap();
        assert!(sw.contains(
            "{ method: \"GET\", pattern: new RegExp(\"^https://api\\\\.example\\\\.com/\"), handler: \"NetworkFirst\", cacheName: RUNTIME_NAME, networkTimeoutSeconds: 3, maxEntries: null, maxAgeSeconds: null },"
        ));
        assert!(sw.contains(
            "{ method: \"GET\", pattern: new RegExp(\"\\\\.png$\"), handler: \"CacheFirst\", cacheName: \"images\", networkTimeoutSeconds: null, maxEntries: 50, maxAgeSeconds: 86400 },"
        ));
        assert!(sw.contains("const NAVIGATE_FALLBACK = \"index.html\";"));
        assert!(sw.contains("const IGNORE_URL_PARAMETERS_MATCHING = [new RegExp(\"^utm_\"), new RegExp(\"^fbclid$\")];"));
    }

    #[test]
    fn constants_precede_runtime() {
        let config = GenerateConfig::new("keck", "dist/sw.js", "dist");
        let sw = render(&config, &Manifest::default()).unwrap();
        let expected = format!(
            "{HEADER}const SCOPE = self.registration.scope;
const PRECACHE_NAME = \"keck-precache-v2\" + '-' + SCOPE;
const RUNTIME_NAME = \"keck-runtime\" + '-' + SCOPE;
const SKIP_WAITING = false;
const CLIENTS_CLAIM = false;
const CLEANUP_OUTDATED_CACHES = false;
const DIRECTORY_INDEX = \"index.html\";
const NAVIGATE_FALLBACK = null;
const NAVIGATE_FALLBACK_DENYLIST = [];
const IGNORE_URL_PARAMETERS_MATCHING = [new RegExp(\"^utm_\"), new RegExp(\"^fbclid$\")];
const PRECACHE_MANIFEST = [];
const RUNTIME_CACHING = [
];
"
        );
        assert!(sw.starts_with(&expected));
    }

    #[test]
    fn output_is_stable() {
        let config = GenerateConfig::new("keck", "dist/sw.js", "dist");
        assert_eq!(render(&config, &manifest()).unwrap(), render(&config, &manifest()).unwrap());
    }
}
