//! Testing utilities for the fetchpipe workspace
//!
//! An in-memory [`FakeFetcher`] that counts its calls, image fixtures
//! encoded on the fly, and a pass-through step that counts how often it
//! actually runs.

#![allow(missing_docs)]

use async_trait::async_trait;
use dashmap::DashMap;
use fetchpipe_core::{
    FetchError, FetchResponse, Fetcher, PipelineConfig, PipelineError, PipelineRunner,
    StepArgument, StepRegistry, StepToken, Transformation,
};
use futures::StreamExt;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use parking_lot::Mutex;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[derive(Debug, Clone)]
struct Resource {
    status: u16,
    body: Vec<u8>,
    /// Fail the download after the body's chunks
    broken: bool,
}

/// Origin serving canned bodies from memory
///
/// Unknown URLs answer 404. `sniff` accepts any 2xx status, leaving the
/// stricter check on the full download to the runner.
#[derive(Debug, Default)]
pub struct FakeFetcher {
    resources: DashMap<String, Resource>,
    sniffs: AtomicUsize,
    fetches: AtomicUsize,
    fetched: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with status 200 at `url`
    #[must_use]
    pub fn with_resource(self, url: &str, body: Vec<u8>) -> Self {
        self.insert(url, 200, body);
        self
    }

    /// Serve `body` with `status` at `url`
    #[must_use]
    pub fn with_status(self, url: &str, status: u16, body: Vec<u8>) -> Self {
        self.insert(url, status, body);
        self
    }

    /// Serve `body` with status 200 at `url`, then drop the connection
    /// before the download completes
    #[must_use]
    pub fn with_broken_body(self, url: &str, body: Vec<u8>) -> Self {
        self.resources.insert(
            url.to_owned(),
            Resource {
                status: 200,
                body,
                broken: true,
            },
        );
        self
    }

    /// Sleep this long inside every call
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn insert(&self, url: &str, status: u16, body: Vec<u8>) {
        self.resources.insert(
            url.to_owned(),
            Resource {
                status,
                body,
                broken: false,
            },
        );
    }

    pub fn sniff_calls(&self) -> usize {
        self.sniffs.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// URLs passed to `fetch`, in call order
    pub fn fetched_urls(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn lookup(&self, url: &str) -> Resource {
        self.resources
            .get(url)
            .map_or_else(
                || Resource {
                    status: 404,
                    body: Vec::new(),
                    broken: false,
                },
                |r| r.clone(),
            )
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn sniff(&self, url: &str, limit: usize) -> Result<Vec<u8>, FetchError> {
        self.sniffs.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let resource = self.lookup(url);
        if !(200..300).contains(&resource.status) {
            return Err(FetchError::Status {
                url: url.to_owned(),
                status: resource.status,
            });
        }
        Ok(resource.body.into_iter().take(limit).collect())
    }

    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.fetched.lock().push(url.to_owned());
        self.pause().await;
        let resource = self.lookup(url);
        let mut chunks: Vec<Result<Vec<u8>, FetchError>> = resource
            .body
            .chunks(512)
            .map(|chunk| Ok(chunk.to_vec()))
            .collect();
        if resource.broken {
            chunks.push(Err(FetchError::transport(url, "connection reset")));
        }
        Ok(FetchResponse {
            status: resource.status,
            body: futures::stream::iter(chunks).boxed(),
        })
    }
}

/// Step that copies its input unchanged and counts its runs
#[derive(Debug, Clone)]
pub struct CountingStep {
    name: String,
    runs: Arc<AtomicUsize>,
}

impl CountingStep {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared run counter; stays valid after the step is registered
    pub fn runs(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.runs)
    }
}

impl Transformation for CountingStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn accepted_mime_types(&self) -> &[&str] {
        &["image/jpeg", "image/png"]
    }

    fn decode(&self, _token: &StepToken) -> Result<StepArgument, PipelineError> {
        Ok(StepArgument::None)
    }

    fn apply(
        &self,
        _argument: StepArgument,
        source: &Path,
        destination: &Path,
        _mime_type: &str,
    ) -> Result<(), PipelineError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        std::fs::copy(source, destination).map_err(|e| PipelineError::io_error(destination, e))?;
        Ok(())
    }
}

fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        let r = u8::try_from(x % 256).unwrap_or(0);
        let g = u8::try_from(y % 256).unwrap_or(0);
        Rgb([r, g, 128])
    }))
}

fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), format)
        .expect("encode fixture");
    buf
}

/// JPEG fixture of the given size
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(&gradient(width, height), ImageFormat::Jpeg)
}

/// PNG fixture of the given size
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(&gradient(width, height), ImageFormat::Png)
}

/// Empty directory to use as a cache root
pub fn cache_dir() -> TempDir {
    tempfile::tempdir().expect("create cache dir")
}

/// Number of entries in the cache directory of `http://example.com`
pub fn example_host_entries(root: &Path) -> usize {
    std::fs::read_dir(root.join("http:/example.com"))
        .map(Iterator::count)
        .unwrap_or(0)
}

/// Runner with the built-in steps over `fetcher`
pub fn runner(root: &Path, fetcher: &Arc<FakeFetcher>) -> PipelineRunner {
    runner_with(
        PipelineConfig::new().with_cache_root(root),
        StepRegistry::with_builtins(),
        fetcher,
    )
}

/// Runner over explicit config and registry
pub fn runner_with(
    config: PipelineConfig,
    registry: StepRegistry,
    fetcher: &Arc<FakeFetcher>,
) -> PipelineRunner {
    let fetcher: Arc<dyn Fetcher> = Arc::clone(fetcher) as Arc<dyn Fetcher>;
    PipelineRunner::new(config, registry, fetcher)
}
