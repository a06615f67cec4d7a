//! End-to-end pipeline behaviour against fake tools.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use cf_av::HttpFetcher;
use cf_core::{Error, Height, Job, OutputKind};
use common::{inputs, FakeEncoder, FakeFetcher, FakeProber, TestHarness, MIB};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(h: &TestHarness, w: u32, ht: u32) -> Arc<FakeFetcher> {
    Arc::new(FakeFetcher::new(h.workspace(), w, ht))
}

/// Scenario A: an unbounded loop of a 60s source is cut to 30s before planning.
#[tokio::test]
async fn test_long_loop_is_cut_to_max_length() {
    let h = TestHarness::new();
    let encoder = Arc::new(FakeEncoder::fixed(2 * MIB));
    let pipeline = h.pipeline(
        fetcher(&h, 640, 360),
        Arc::new(FakeProber::new(640, 360, 60, None)),
        encoder.clone(),
    );

    let job = Job::new("https://example.com/v/long", OutputKind::Loop)
        .with_clip(Some(Duration::ZERO), None)
        .with_output_name("loop_a");
    let output = pipeline.run(&job).await.unwrap();

    assert_eq!(output, h.config.work_dir.join("loop_a_processed.gif"));
    assert_eq!(encoder.labels(), vec!["palettegen", "paletteuse"]);
    for pass in encoder.passes.lock().unwrap().iter() {
        let args = pass.args.join(" ");
        assert!(args.starts_with("-ss 0.000 -t 30.000 -i "), "{args}");
    }
    // The job itself still records what was asked for.
    assert_eq!(job.requested.end, None);
    assert_eq!(h.files(), vec!["loop_a_processed.gif"]);
}

/// Scenario B: a wide loop request is clamped to 320px with automatic height.
#[tokio::test]
async fn test_wide_loop_is_clamped() {
    let h = TestHarness::new();
    let encoder = Arc::new(FakeEncoder::fixed(MIB));
    let pipeline = h.pipeline(
        fetcher(&h, 1920, 1080),
        Arc::new(FakeProber::new(1920, 1080, 12, None)),
        encoder.clone(),
    );

    let job = Job::new("https://example.com/v/wide", OutputKind::Loop)
        .with_size(Some(1000), None)
        .with_output_name("loop_b");
    pipeline.run(&job).await.unwrap();

    let graphs = encoder.graphs();
    assert_eq!(graphs[0].as_deref(), Some("fps=15,scale=320:-1,palettegen"));
    assert_eq!(
        graphs[1].as_deref(),
        Some("fps=15,scale=320:-1 [x]; [x][1:v] paletteuse")
    );
    assert_eq!(job.requested.width, Some(1000));
    assert_eq!(job.requested.height, None::<Height>);
}

/// Scenario C: 14MB against a 10MB limit shrinks by ~1.24 and re-encodes.
#[tokio::test]
async fn test_oversized_video_shrinks_and_converges() {
    let h = TestHarness::new();
    let encoder = Arc::new(FakeEncoder::sized(|width| match width {
        None => 14 * MIB,
        Some(_) => 6 * MIB,
    }));
    let prober = Arc::new(FakeProber::new(1920, 1080, 40, Some("aac")));
    let pipeline = h.pipeline(fetcher(&h, 1920, 1080), prober.clone(), encoder.clone());

    let job = Job::new("https://example.com/v/c", OutputKind::Video).with_output_name("vid_c");
    let output = pipeline.run(&job).await.unwrap();

    assert_eq!(encoder.labels(), vec!["video", "video"]);
    let graphs = encoder.graphs();
    assert_eq!(graphs[0], None);
    // 1920 / 1.241 = 1547 -> even 1546; 1080 / 1.241 = 870.
    assert_eq!(graphs[1].as_deref(), Some("scale=1546:870,setsar=1"));
    assert_eq!(std::fs::metadata(&output).unwrap().len(), 6 * MIB);
    assert_eq!(prober.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.files(), vec!["vid_c_processed.mp4"]);
}

#[tokio::test]
async fn test_output_too_large_leaves_nothing() {
    let h = TestHarness::new();
    let encoder = Arc::new(FakeEncoder::fixed(25 * MIB));
    let pipeline = h.pipeline(
        fetcher(&h, 1920, 1080),
        Arc::new(FakeProber::new(1920, 1080, 40, None)),
        encoder.clone(),
    );

    let job = Job::new("https://example.com/v/huge", OutputKind::Video);
    let err = pipeline.run(&job).await.unwrap_err();

    assert_matches!(
        err,
        Error::OutputTooLarge { attempts: 5, size_bytes, limit_bytes } if size_bytes == 25 * MIB && limit_bytes == 10 * MIB
    );
    assert_eq!(err.code(), Some(1002));
    assert_eq!(encoder.labels().len(), 5);
    assert!(h.files().is_empty(), "leftover files: {:?}", h.files());
}

#[tokio::test]
async fn test_oversized_audio_fails_without_retry() {
    let h = TestHarness::new();
    let encoder = Arc::new(FakeEncoder::fixed(12 * MIB));
    let pipeline = h.pipeline(
        fetcher(&h, 0, 0),
        Arc::new(FakeProber::new(0, 0, 3600, Some("opus"))),
        encoder.clone(),
    );

    let err = pipeline
        .run(&Job::new("https://example.com/podcast", OutputKind::Audio))
        .await
        .unwrap_err();

    assert_matches!(err, Error::OutputTooLarge { attempts: 1, .. });
    assert_eq!(encoder.labels(), vec!["audio"]);
    assert!(h.files().is_empty());
}

#[tokio::test]
async fn test_transcode_failure_cleans_up() {
    let h = TestHarness::new();
    let encoder = Arc::new(FakeEncoder::failing_on("paletteuse"));
    let pipeline = h.pipeline(
        fetcher(&h, 480, 270),
        Arc::new(FakeProber::new(480, 270, 5, None)),
        encoder.clone(),
    );

    let err = pipeline
        .run(&Job::new("https://example.com/v/bad", OutputKind::Loop))
        .await
        .unwrap_err();

    assert_matches!(err, Error::TranscodeFailure { ref pass, ref diagnostic } if pass == "paletteuse" && diagnostic == "Conversion failed!");
    assert_eq!(encoder.labels().len(), 2);
    assert!(h.files().is_empty(), "leftover files: {:?}", h.files());
}

#[tokio::test]
async fn test_cancelled_job_leaves_nothing() {
    let h = TestHarness::new();
    let encoder = Arc::new(FakeEncoder::stalling(Duration::from_secs(5)));
    let pipeline = h.pipeline(
        fetcher(&h, 640, 360),
        Arc::new(FakeProber::new(640, 360, 10, Some("aac"))),
        encoder.clone(),
    );
    let job = Job::new("https://example.com/v/slow", OutputKind::Video).with_output_name("t");

    let timed_out = tokio::time::timeout(Duration::from_millis(200), pipeline.run(&job)).await;

    assert!(timed_out.is_err());
    assert_eq!(encoder.labels(), vec!["video"]);
    assert!(h.files().is_empty(), "leftover files: {:?}", h.files());
}

#[tokio::test]
async fn test_empty_candidate_is_a_transcode_failure() {
    let h = TestHarness::new();
    let pipeline = h.pipeline(
        fetcher(&h, 640, 360),
        Arc::new(FakeProber::new(640, 360, 5, None)),
        Arc::new(FakeEncoder::fixed(0)),
    );

    let err = pipeline
        .run(&Job::new("https://example.com/v/empty", OutputKind::Video))
        .await
        .unwrap_err();

    assert_matches!(err, Error::TranscodeFailure { ref pass, .. } if pass == "video");
    assert!(h.files().is_empty());
}

/// Scenario D: a source over the byte ceiling is rejected with nothing left behind.
#[tokio::test]
async fn test_oversized_source_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 64 * 1024]))
        .mount(&server)
        .await;

    let mut h = TestHarness::new();
    h.config.limits.max_source_bytes = 16 * 1024;
    let fetcher = Arc::new(HttpFetcher::new(h.workspace(), h.config.limits.max_source_bytes).unwrap());
    let encoder = Arc::new(FakeEncoder::fixed(MIB));
    let pipeline = h.pipeline(fetcher, Arc::new(FakeProber::new(0, 0, 0, None)), encoder.clone());

    let err = pipeline
        .run(&Job::new(format!("{}/big.mp4", server.uri()), OutputKind::Video))
        .await
        .unwrap_err();

    assert_matches!(err, Error::SourceTooLarge { limit_bytes: 16384, .. });
    assert_eq!(err.user_message(), "Video attempting to download is too big (Error 1001)");
    assert!(encoder.labels().is_empty());
    assert!(h.files().is_empty());
}

#[tokio::test]
async fn test_http_source_runs_through_pipeline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![9u8; 4096], "audio/mpeg"))
        .mount(&server)
        .await;

    let h = TestHarness::new();
    let fetcher = Arc::new(HttpFetcher::new(h.workspace(), h.config.limits.max_source_bytes).unwrap());
    let encoder = Arc::new(FakeEncoder::fixed(MIB));
    let pipeline = h.pipeline(fetcher, Arc::new(FakeProber::new(0, 0, 200, Some("mp3"))), encoder.clone());

    let job = Job::new(format!("{}/episode", server.uri()), OutputKind::Audio).with_output_name("ep");
    let output = pipeline.run(&job).await.unwrap();

    let passes = encoder.passes.lock().unwrap();
    assert_eq!(inputs(&passes[0]), vec![h.config.work_dir.join("ep.mp3")]);
    assert!(passes[0].args.join(" ").contains("-vn -c:a copy"));
    assert_eq!(h.files(), vec!["ep_processed.mp3"]);
    assert!(output.exists());
}

#[tokio::test]
async fn test_distinct_jobs_produce_independent_outputs() {
    let h = TestHarness::new();
    let encoder = Arc::new(FakeEncoder::fixed(MIB));
    let pipeline = h.pipeline(
        fetcher(&h, 640, 360),
        Arc::new(FakeProber::new(640, 360, 5, None)),
        encoder.clone(),
    );

    let first = Job::new("https://example.com/v/same", OutputKind::Video);
    let second = Job::new("https://example.com/v/same", OutputKind::Video);
    let (a, b) = tokio::join!(pipeline.run(&first), pipeline.run(&second));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(a, b);
    assert!(a.exists() && b.exists());
    assert_eq!(h.files().len(), 2);
}
