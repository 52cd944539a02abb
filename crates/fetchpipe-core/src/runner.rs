//! Pipeline runner
//!
//! Drives one request through a fixed prologue (sniff the mimetype, fetch
//! the source) and then the caller's steps in order, each reading the
//! artifact named before its step and writing the one named after. The
//! result record carries the final URL, mimetype and artifact path.
//!
//! Any failure aborts the rest of the chain. Artifacts written by earlier
//! steps stay in place as cache entries for shorter prefixes.

use crate::config::{ContentionPolicy, PipelineConfig};
use crate::error::{FetchError, PipelineError, PipelineResult};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::registry::{ResolvedStep, StepRegistry};
use crate::request::ProcessRequest;
use fetchpipe_artifact::{mime, Bundle, PathNamer};
use fetchpipe_lock::{Acquisition, ClaimGuard, LockCoordinator, Signature};
use futures::StreamExt;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tracing::Instrument;

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedArtifact {
    /// Normalized source URL
    pub url: String,
    /// Mimetype of the final artifact
    pub mime_type: String,
    /// Absolute path of the final artifact
    pub path: PathBuf,
}

/// Executes requests against a cache root
///
/// Cheap to clone; clones share the registry, the fetcher and the claim
/// table.
#[derive(Debug, Clone)]
pub struct PipelineRunner {
    config: PipelineConfig,
    namer: PathNamer,
    registry: Arc<StepRegistry>,
    fetcher: Arc<dyn Fetcher>,
    locks: LockCoordinator,
}

impl PipelineRunner {
    /// Create a runner over explicit collaborators
    #[must_use]
    pub fn new(config: PipelineConfig, registry: StepRegistry, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            namer: PathNamer::new(&config.cache_root),
            locks: LockCoordinator::new(config.lock_ttl()),
            registry: Arc::new(registry),
            fetcher,
            config,
        }
    }

    /// Create a runner with the built-in steps and an HTTP fetcher
    ///
    /// # Errors
    /// `PipelineError::Fetch` if the HTTP client cannot be built
    pub fn from_config(config: PipelineConfig) -> PipelineResult<Self> {
        let fetcher = HttpFetcher::new(&config)?;
        Ok(Self::new(config, StepRegistry::with_builtins(), Arc::new(fetcher)))
    }

    /// Engine configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Path namer over the cache root
    #[inline]
    #[must_use]
    pub fn namer(&self) -> &PathNamer {
        &self.namer
    }

    /// Registered steps
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    /// Claim table shared by every clone of this runner
    #[inline]
    #[must_use]
    pub fn locks(&self) -> &LockCoordinator {
        &self.locks
    }

    /// Parse a compact pipeline string and process it
    ///
    /// # Errors
    /// See [`PipelineRunner::process`]
    pub async fn process_str(&self, pipeline: &str) -> PipelineResult<ProcessedArtifact> {
        let request = ProcessRequest::parse(pipeline)?;
        self.process(&request).await
    }

    /// Process one request end to end.
    ///
    /// Every step is resolved before anything touches the network, so an
    /// unknown step or bad argument fails fast.
    ///
    /// # Errors
    /// The first error raised by the prologue or any step
    pub async fn process(&self, request: &ProcessRequest) -> PipelineResult<ProcessedArtifact> {
        let steps = request
            .steps
            .iter()
            .map(|token| self.registry.resolve(token))
            .collect::<PipelineResult<Vec<_>>>()?;

        let bundle = request.bundle();
        let signature = Signature::new(bundle.source_url(), bundle.chain());
        let span = tracing::info_span!(
            "process",
            url = %bundle.source_url(),
            %signature
        );

        async move {
            let start = Instant::now();
            tracing::info!(steps = steps.len(), "processing request");

            let _claim = self.claim(signature).await;
            match self.execute(bundle, &steps).await {
                Ok(artifact) => {
                    tracing::info!(
                        path = %artifact.path.display(),
                        mime_type = %artifact.mime_type,
                        elapsed = ?start.elapsed(),
                        "request complete"
                    );
                    Ok(artifact)
                }
                Err(e) => {
                    tracing::error!(error = %e, "request aborted");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Claim `signature` for this run.
    ///
    /// `None` means another run holds it and the contention policy said to
    /// go ahead regardless. Claims left behind by vanished holders are
    /// swept first so the table does not grow with them.
    async fn claim(&self, signature: Signature) -> Option<ClaimGuard> {
        let purged = self.locks.purge_expired();
        if purged > 0 {
            tracing::debug!(purged, remaining = self.locks.len(), "dropped expired claims");
        }
        loop {
            match self.locks.acquire(signature) {
                Acquisition::Claimed(guard) => return Some(guard),
                Acquisition::Held { holder } => match self.config.contention {
                    ContentionPolicy::Duplicate => {
                        tracing::warn!(%holder, "identical request in flight, running anyway");
                        return None;
                    }
                    ContentionPolicy::Wait => {
                        tracing::debug!(%holder, "waiting for identical request");
                        self.locks
                            .wait_until_free(&signature, self.config.wait_poll())
                            .await;
                    }
                },
            }
        }
    }

    async fn execute(
        &self,
        mut bundle: Bundle,
        steps: &[ResolvedStep],
    ) -> PipelineResult<ProcessedArtifact> {
        self.sniff(&mut bundle).await?;
        self.fetch_source(&bundle).await?;
        for step in steps {
            self.apply_step(&mut bundle, step).await?;
        }
        self.serialize(&bundle).await
    }

    /// Set the bundle's mimetype from the leading bytes of the source.
    async fn sniff(&self, bundle: &mut Bundle) -> PipelineResult<()> {
        let head = self
            .fetcher
            .sniff(bundle.source_url(), self.config.sniff_bytes)
            .await?;
        let mime_type = mime::sniff(&head);
        tracing::debug!(mime_type, bytes = head.len(), "sniffed source");
        bundle.set_mime_type(mime_type);
        Ok(())
    }

    /// Download the source unless its artifact already exists.
    async fn fetch_source(&self, bundle: &Bundle) -> PipelineResult<()> {
        let destination = self.namer.resolve(bundle).await?;
        if exists(&destination).await? {
            tracing::debug!(path = %destination.display(), "source already cached");
            return Ok(());
        }

        let url = bundle.source_url();
        let response = self.fetcher.fetch(url).await?;
        if !response.is_ok() {
            return Err(FetchError::Status {
                url: url.to_owned(),
                status: response.status,
            }
            .into());
        }

        let dir = parent_dir(&destination)?;
        let (file, staged) = tempfile::Builder::new()
            .prefix(".fetch-")
            .tempfile_in(dir)
            .map_err(|e| PipelineError::io_error(dir, e))?
            .into_parts();
        let mut file = tokio::fs::File::from_std(file);

        let mut body = response.body;
        let mut written = 0usize;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|e| PipelineError::io_error(&*staged, e))?;
            written += chunk.len();
        }
        if written == 0 {
            return Err(FetchError::EmptyBody(url.to_owned()).into());
        }
        file.flush()
            .await
            .map_err(|e| PipelineError::io_error(&*staged, e))?;
        drop(file);

        staged
            .persist(&destination)
            .map_err(|e| PipelineError::io_error(&destination, e.error))?;
        tracing::debug!(path = %destination.display(), bytes = written, "source fetched");
        Ok(())
    }

    /// Run one step: input named before advancing, output after.
    async fn apply_step(&self, bundle: &mut Bundle, step: &ResolvedStep) -> PipelineResult<()> {
        step.transformation.check_mime_type(bundle.mime_type())?;

        let source = self.namer.resolve(bundle).await?;
        bundle.advance();
        let destination = self.namer.resolve(bundle).await?;

        if exists(&destination).await? {
            tracing::debug!(
                step = %step.token,
                path = %destination.display(),
                "reusing step output"
            );
            return Ok(());
        }

        tracing::debug!(
            step = %step.token,
            source = %source.display(),
            destination = %destination.display(),
            "applying step"
        );
        let transformation = Arc::clone(&step.transformation);
        let argument = step.argument;
        let mime_type = bundle.mime_type().to_owned();
        tokio::task::spawn_blocking(move || {
            let dir = parent_dir(&destination)?;
            let staged = tempfile::Builder::new()
                .prefix(".step-")
                .tempfile_in(dir)
                .map_err(|e| PipelineError::io_error(dir, e))?;
            transformation.apply(argument, &source, staged.path(), &mime_type)?;
            staged
                .persist(&destination)
                .map_err(|e| PipelineError::io_error(&destination, e.error))?;
            Ok::<_, PipelineError>(())
        })
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))?
    }

    /// Read the final state of the bundle into the result record.
    async fn serialize(&self, bundle: &Bundle) -> PipelineResult<ProcessedArtifact> {
        Ok(ProcessedArtifact {
            url: bundle.source_url().to_owned(),
            mime_type: bundle.mime_type().to_owned(),
            path: self.namer.resolve(bundle).await?,
        })
    }
}

async fn exists(path: &Path) -> PipelineResult<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| PipelineError::io_error(path, e))
}

fn parent_dir(path: &Path) -> PipelineResult<&Path> {
    path.parent().ok_or_else(|| {
        PipelineError::io_error(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "artifact has no parent"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{StepArgument, StepToken, Transformation};

    #[derive(Debug)]
    struct NoFetch;

    #[async_trait::async_trait]
    impl Fetcher for NoFetch {
        async fn sniff(&self, url: &str, _limit: usize) -> Result<Vec<u8>, FetchError> {
            Err(FetchError::transport(url, "offline"))
        }

        async fn fetch(&self, url: &str) -> Result<crate::fetch::FetchResponse, FetchError> {
            Err(FetchError::transport(url, "offline"))
        }
    }

    fn runner(root: &Path) -> PipelineRunner {
        PipelineRunner::new(
            PipelineConfig::new().with_cache_root(root),
            StepRegistry::with_builtins(),
            Arc::new(NoFetch),
        )
    }

    #[tokio::test]
    async fn unknown_step_fails_before_fetching() {
        let dir = tempfile::tempdir().unwrap();
        let err = runner(dir.path())
            .process_str("http://example.com/a.jpg..sepia.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownStep(ref name) if name == "sepia"));
    }

    #[tokio::test]
    async fn fetch_errors_release_the_claim() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path());
        let err = runner
            .process_str("http://example.com/a.jpg..bw.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Fetch(FetchError::Transport { .. })));
        assert!(runner.locks().is_empty());
    }

    #[tokio::test]
    async fn expired_claims_are_swept_on_the_next_request() {
        let dir = tempfile::tempdir().unwrap();
        let runner = PipelineRunner::new(
            PipelineConfig::new()
                .with_cache_root(dir.path())
                .with_lock_ttl(std::time::Duration::ZERO),
            StepRegistry::with_builtins(),
            Arc::new(NoFetch),
        );
        let other = Signature::new("http://example.com/other.jpg", &["bw"]);
        if let Acquisition::Claimed(guard) = runner.locks().acquire(other) {
            // A holder that vanished without releasing.
            std::mem::forget(guard);
        }
        assert_eq!(runner.locks().len(), 1);

        let _ = runner.process_str("http://example.com/a.jpg..bw.jpg").await;
        assert!(runner.locks().is_empty());
    }

    #[tokio::test]
    async fn duplicate_policy_runs_past_a_held_claim() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path());
        let request = ProcessRequest::parse("http://example.com/a.jpg..bw.jpg").unwrap();
        let held = runner.locks().acquire(request.signature());
        assert!(held.is_claimed());

        assert!(runner.claim(request.signature()).await.is_none());
        drop(held);
        assert!(runner.claim(request.signature()).await.is_some());
    }

    #[tokio::test]
    async fn step_reuses_existing_output() {
        #[derive(Debug)]
        struct Explodes;

        impl Transformation for Explodes {
            fn name(&self) -> &str {
                "explode"
            }
            fn accepted_mime_types(&self) -> &[&str] {
                &["image/jpeg"]
            }
            fn decode(&self, _token: &StepToken) -> Result<StepArgument, PipelineError> {
                Ok(StepArgument::None)
            }
            fn apply(
                &self,
                _argument: StepArgument,
                _source: &Path,
                _destination: &Path,
                _mime_type: &str,
            ) -> Result<(), PipelineError> {
                Err(PipelineError::Task("should not run".into()))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let mut registry = StepRegistry::new();
        registry.register(Explodes);
        let runner = PipelineRunner::new(
            PipelineConfig::new().with_cache_root(dir.path()),
            registry,
            Arc::new(NoFetch),
        );

        let request = ProcessRequest::parse("http://example.com/a.jpg..explode.jpg").unwrap();
        let step = runner.registry().resolve(&request.steps[0]).unwrap();
        let mut bundle = request.bundle();
        bundle.set_mime_type("image/jpeg");

        let mut done = bundle.clone();
        done.advance();
        let output = runner.namer().resolve(&done).await.unwrap();
        std::fs::write(&output, b"cached").unwrap();

        runner.apply_step(&mut bundle, &step).await.unwrap();
        assert!(bundle.is_complete());
        assert_eq!(std::fs::read(&output).unwrap(), b"cached");
    }
}
