//! fetchpipe core - fetch, transform and cache remote resources
//!
//! The engine takes a source URL and an ordered chain of named steps,
//! fetches the source, applies each step and leaves every intermediate
//! result at a deterministic path under the cache root. A repeat request,
//! or one sharing a prefix of steps, finds its artifacts already on disk.
//!
//! # Example
//!
//! ```rust,ignore
//! use fetchpipe_core::{PipelineConfig, PipelineRunner};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::new().with_cache_root("/srv/cache");
//! let runner = PipelineRunner::from_config(config)?;
//!
//! let artifact = runner
//!     .process_str("http://example.com/a.jpg..bw.jpg")
//!     .await?;
//! println!("{} ({})", artifact.path.display(), artifact.mime_type);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod fetch;
pub mod registry;
pub mod request;
pub mod runner;
pub mod steps;

pub use config::{ContentionPolicy, PipelineConfig};
pub use error::{FetchError, PipelineError, PipelineResult};
pub use fetch::{BodyStream, FetchResponse, Fetcher, HttpFetcher};
pub use registry::{ResolvedStep, StepArgument, StepRegistry, StepToken, Transformation};
pub use request::ProcessRequest;
pub use runner::{PipelineRunner, ProcessedArtifact};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for embedding the engine
    pub use crate::{
        ContentionPolicy, Fetcher, PipelineConfig, PipelineError, PipelineRunner,
        ProcessRequest, ProcessedArtifact, StepRegistry, StepToken, Transformation,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
