//! Generates precaching service workers for static site builds.
//!
//! Files under a build output directory are matched against glob patterns, hashed into a precache
//! manifest and embedded into a self-contained `sw.js` which installs them into the cache and
//! serves them offline. Requests outside of the manifest can be handled with runtime caching rules.
//!
//! ```no_run
//! # async fn build() -> prest_precache::Result {
//! use prest_precache::*;
//!
//! let config = GenerateConfig::new("my-app", "dist/sw.js", "dist")
//!     .glob_patterns(["**/*.{html,js,css}"]);
//! let result = generate_sw(&config).await?;
//! println!("{}", summary(&result));
//! # Ok(())
//! # }
//! ```

mod config;
mod generate;
mod manifest;
mod report;
mod result;
mod sw;
mod traces;

pub use config::*;
pub use generate::*;
pub use manifest::*;
pub use report::*;
pub use result::*;
pub use sw::render as render_sw;
pub use traces::init_tracing_subscriber;

pub use async_trait::async_trait;
pub use tracing::{debug, error, info, trace, warn};
