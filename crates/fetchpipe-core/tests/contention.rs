//! Identical requests racing each other

use fetchpipe_core::{ContentionPolicy, PipelineConfig, StepRegistry};
use fetchpipe_test_utils::{cache_dir, jpeg_bytes, runner, runner_with, CountingStep, FakeFetcher};
use image::GenericImageView;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

const URL: &str = "http://example.com/a.jpg";
const PIPELINE: &str = "http://example.com/a.jpg..copy.jpg";

fn slow_origin() -> Arc<FakeFetcher> {
    Arc::new(
        FakeFetcher::new()
            .with_resource(URL, jpeg_bytes(320, 240))
            .with_delay(Duration::from_millis(50)),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn duplicates_converge_on_one_valid_artifact() {
    let dir = cache_dir();
    let fetcher = slow_origin();
    let runner = runner(dir.path(), &fetcher);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let runner = runner.clone();
            tokio::spawn(async move { runner.process_str("http://example.com/a.jpg..bw.jpg").await })
        })
        .collect();

    let mut paths = Vec::new();
    for handle in handles {
        paths.push(handle.await.unwrap().unwrap().path);
    }

    paths.dedup();
    assert_eq!(paths.len(), 1);
    assert_eq!(image::open(&paths[0]).unwrap().dimensions(), (320, 240));
    assert!(runner.locks().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn waiters_reuse_the_holders_work() {
    let dir = cache_dir();
    let fetcher = slow_origin();
    let step = CountingStep::new("copy");
    let runs = step.runs();

    let mut registry = StepRegistry::new();
    registry.register(step);
    let config = PipelineConfig::new()
        .with_cache_root(dir.path())
        .with_contention(ContentionPolicy::Wait)
        .with_wait_poll(Duration::from_millis(5));
    let runner = runner_with(config, registry, &fetcher);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let runner = runner.clone();
            tokio::spawn(async move { runner.process_str(PIPELINE).await })
        })
        .collect();

    for handle in handles {
        let artifact = handle.await.unwrap().unwrap();
        assert!(artifact.path.ends_with("a.jpg..copy.jpg"));
    }

    assert_eq!(fetcher.fetch_calls(), 1);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(runner.locks().is_empty());
}

#[tokio::test]
async fn different_chains_do_not_contend() {
    let dir = cache_dir();
    let fetcher = slow_origin();
    let runner = runner(dir.path(), &fetcher);

    let (bw, thumb) = tokio::join!(
        runner.process_str("http://example.com/a.jpg..bw.jpg"),
        runner.process_str("http://example.com/a.jpg..thumb.jpg"),
    );

    assert!(bw.unwrap().path.ends_with("a.jpg..bw.jpg"));
    assert!(thumb.unwrap().path.ends_with("a.jpg..thumb.jpg"));
}
