//! Extraction pipeline tests.
//!
//! Uses the synthetic backend from `common` so the primary/fallback
//! decisions and ordering guarantees run without FFmpeg.

mod common;

use std::sync::{Arc, Mutex};

use bifgen::{
    BifError, BifReader, CancellationToken, ExtractOptions, ExtractionOutcome, ExtractionPath,
    ExtractionPipeline, FallbackReason, FrameSize, OperationType, Preset, ProgressCallback,
    ProgressInfo, Resolution, generate_bif, imaging,
};

use common::{ScriptedTool, SyntheticBackend, ToolScript, shade};

const SIZE: FrameSize = FrameSize { width: 32, height: 18 };

fn fallback_payloads(count: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|index| vec![0xFF, 0xD8, index as u8, 0xFF, 0xD9])
        .collect()
}

fn decoded_shade(jpeg: &[u8]) -> [u8; 3] {
    let image = imaging::decode_jpeg(jpeg).expect("Failed to decode extracted frame");
    image.get_pixel(SIZE.width / 2, SIZE.height / 2).0
}

fn assert_close(actual: [u8; 3], expected: [u8; 3]) {
    for (a, e) in actual.iter().zip(expected) {
        assert!(
            (i16::from(*a) - i16::from(e)).abs() <= 4,
            "Pixel {actual:?} is not close to {expected:?}"
        );
    }
}

// ── Primary path ───────────────────────────────────────────────────

#[test]
fn primary_results_are_ordered_by_timestamp() {
    let backend = SyntheticBackend::new(120);
    let pipeline = ExtractionPipeline::new(backend, ScriptedTool::new(ToolScript::Fails));
    let timestamps: Vec<u64> = (0..120).step_by(5).collect();
    let options = ExtractOptions::new().with_jobs(4).with_chunk_size(1);

    let extraction = pipeline
        .extract("in.mp4".as_ref(), &timestamps, SIZE, &options)
        .unwrap();

    assert_eq!(extraction.path, ExtractionPath::Primary);
    assert_eq!(extraction.frames.len(), timestamps.len());
    assert_eq!(extraction.dropped, 0);
    for (jpeg, &second) in extraction.frames.iter().zip(&timestamps) {
        assert_close(decoded_shade(jpeg), shade(second).0);
    }
    assert_eq!(pipeline.tool().unwrap().calls(), 0);
}

#[test]
fn outcome_reports_frames_with_timestamps() {
    let pipeline = ExtractionPipeline::new(
        SyntheticBackend::new(60),
        ScriptedTool::new(ToolScript::Fails),
    );
    let options = ExtractOptions::new().with_jobs(3);
    let outcome = pipeline
        .run_primary("in.mp4".as_ref(), &[50, 0, 30, 10], SIZE, &options)
        .unwrap();

    match outcome {
        ExtractionOutcome::Succeeded(frames) => {
            let seconds: Vec<u64> = frames.iter().map(|frame| frame.timestamp).collect();
            assert_eq!(seconds, vec![0, 10, 30, 50]);
        }
        other => panic!("Expected Succeeded, got: {other:?}"),
    }
}

#[test]
fn unreadable_frames_are_dropped_not_fatal() {
    let backend = SyntheticBackend::new(50).with_unreadable([10, 30]);
    let pipeline = ExtractionPipeline::new(backend, ScriptedTool::new(ToolScript::Fails));
    let timestamps = vec![0, 10, 20, 30, 40];

    let extraction = pipeline
        .extract("in.mp4".as_ref(), &timestamps, SIZE, &ExtractOptions::new())
        .unwrap();

    assert_eq!(extraction.path, ExtractionPath::Primary);
    assert_eq!(extraction.frames.len(), 3);
    assert_eq!(extraction.dropped, 2);
    for (jpeg, second) in extraction.frames.iter().zip([0, 20, 40]) {
        assert_close(decoded_shade(jpeg), shade(second).0);
    }
}

#[test]
fn timestamps_past_the_end_are_dropped() {
    let pipeline = ExtractionPipeline::new(
        SyntheticBackend::new(25),
        ScriptedTool::new(ToolScript::Fails),
    );
    let extraction = pipeline
        .extract("in.mp4".as_ref(), &[0, 10, 20, 30], SIZE, &ExtractOptions::new())
        .unwrap();
    assert_eq!(extraction.frames.len(), 3);
    assert_eq!(extraction.dropped, 1);
}

#[test]
fn each_worker_opens_its_own_reader() {
    let backend = SyntheticBackend::new(100);
    let opens = backend.opens.clone();
    let pipeline = ExtractionPipeline::new(backend, ScriptedTool::new(ToolScript::Fails));
    let timestamps: Vec<u64> = (0..100).step_by(10).collect();
    let options = ExtractOptions::new().with_jobs(2).with_chunk_size(1);

    pipeline
        .extract("in.mp4".as_ref(), &timestamps, SIZE, &options)
        .unwrap();

    // The probe open, then at most one reader per worker.
    let count = opens.load(std::sync::atomic::Ordering::SeqCst);
    assert!(count >= 2, "expected a probe open and a worker open, got {count}");
    assert!(count <= 2 + 1, "readers were reopened: {count} opens");
}

#[test]
fn readers_are_reused_across_many_chunks() {
    let backend = SyntheticBackend::new(600);
    let opens = backend.opens.clone();
    let pipeline = ExtractionPipeline::new(backend, ScriptedTool::new(ToolScript::Fails));
    let timestamps: Vec<u64> = (0..600).step_by(5).collect();

    for jobs in [1, 3, 4] {
        opens.store(0, std::sync::atomic::Ordering::SeqCst);
        let options = ExtractOptions::new().with_jobs(jobs).with_chunk_size(4);
        let extraction = pipeline
            .extract("in.mp4".as_ref(), &timestamps, SIZE, &options)
            .unwrap();
        assert_eq!(extraction.frames.len(), timestamps.len());

        let count = opens.load(std::sync::atomic::Ordering::SeqCst);
        assert!(count <= jobs + 1, "jobs={jobs}: {count} opens for {} timestamps", timestamps.len());
    }
}

// ── Fallback path ──────────────────────────────────────────────────

#[test]
fn open_failure_uses_the_fallback_exclusively() {
    let payloads = fallback_payloads(4);
    let tool = ScriptedTool::new(ToolScript::Frames(payloads.clone()));
    let pipeline = ExtractionPipeline::new(SyntheticBackend::failing(), tool);

    let outcome = pipeline
        .run_primary("in.mp4".as_ref(), &[0, 10, 20, 30], SIZE, &ExtractOptions::new())
        .unwrap();
    assert!(matches!(
        outcome,
        ExtractionOutcome::NeedsFallback(FallbackReason::OpenFailed(_))
    ));

    let extraction = pipeline
        .extract("in.mp4".as_ref(), &[0, 10, 20, 30], SIZE, &ExtractOptions::new())
        .unwrap();
    assert_eq!(extraction.path, ExtractionPath::Fallback);
    assert_eq!(extraction.frames, payloads, "frames must be read back in name order");
    assert_eq!(pipeline.tool().unwrap().calls(), 1);
}

#[test]
fn empty_primary_result_uses_the_fallback() {
    let backend = SyntheticBackend::new(30).with_unreadable([0, 10, 20]);
    let tool = ScriptedTool::new(ToolScript::Frames(fallback_payloads(3)));
    let pipeline = ExtractionPipeline::new(backend, tool);

    let outcome = pipeline
        .run_primary("in.mp4".as_ref(), &[0, 10, 20], SIZE, &ExtractOptions::new())
        .unwrap();
    assert_eq!(outcome, ExtractionOutcome::NeedsFallback(FallbackReason::NoFrames));

    let extraction = pipeline
        .extract("in.mp4".as_ref(), &[0, 10, 20], SIZE, &ExtractOptions::new())
        .unwrap();
    assert_eq!(extraction.path, ExtractionPath::Fallback);
    assert_eq!(extraction.frames.len(), 3);
}

#[test]
fn fallback_frames_past_the_last_sample_are_discarded() {
    let payloads = fallback_payloads(5);
    let tool = ScriptedTool::new(ToolScript::Frames(payloads.clone()));
    let pipeline = ExtractionPipeline::new(SyntheticBackend::failing(), tool);

    let extraction = pipeline
        .extract("in.mp4".as_ref(), &[0, 10, 20, 30], SIZE, &ExtractOptions::new())
        .unwrap();
    assert_eq!(extraction.frames, payloads[..4].to_vec());
    assert_eq!(extraction.dropped, 0);
}

#[test]
fn no_timestamps_at_all_falls_back() {
    let tool = ScriptedTool::new(ToolScript::Frames(fallback_payloads(1)));
    let pipeline = ExtractionPipeline::new(SyntheticBackend::new(0), tool);
    let extraction = pipeline
        .extract("in.mp4".as_ref(), &[], SIZE, &ExtractOptions::new())
        .unwrap();
    assert_eq!(extraction.path, ExtractionPath::Fallback);
}

#[test]
fn unavailable_fallback_is_no_frames_extracted() {
    let pipeline = ExtractionPipeline::new(
        SyntheticBackend::failing(),
        ScriptedTool::new(ToolScript::Unavailable),
    );
    let error = pipeline
        .extract("in.mp4".as_ref(), &[0, 10], SIZE, &ExtractOptions::new())
        .unwrap_err();
    assert!(matches!(error, BifError::NoFramesExtracted { .. }));
    assert_eq!(error.exit_code(), 4);
}

#[test]
fn failing_fallback_is_no_frames_extracted() {
    let pipeline = ExtractionPipeline::new(
        SyntheticBackend::failing(),
        ScriptedTool::new(ToolScript::Fails),
    );
    let error = pipeline
        .extract("in.mp4".as_ref(), &[0], SIZE, &ExtractOptions::new())
        .unwrap_err();
    assert!(matches!(error, BifError::NoFramesExtracted { .. }));
}

#[test]
fn fallback_with_no_output_is_no_frames_extracted() {
    let pipeline = ExtractionPipeline::new(
        SyntheticBackend::failing(),
        ScriptedTool::new(ToolScript::Frames(Vec::new())),
    );
    let error = pipeline
        .extract("in.mp4".as_ref(), &[0], SIZE, &ExtractOptions::new())
        .unwrap_err();
    assert!(matches!(error, BifError::NoFramesExtracted { .. }));
}

#[test]
fn pipeline_without_tool_cannot_fall_back() {
    let pipeline: ExtractionPipeline<SyntheticBackend, ScriptedTool> =
        ExtractionPipeline::without_fallback(SyntheticBackend::failing());
    let error = pipeline
        .extract("in.mp4".as_ref(), &[0], SIZE, &ExtractOptions::new())
        .unwrap_err();
    assert!(matches!(error, BifError::NoFramesExtracted { .. }));
}

// ── Cancellation & progress ────────────────────────────────────────

#[test]
fn cancelled_run_does_not_fall_back() {
    let token = CancellationToken::new();
    token.cancel();
    let tool = ScriptedTool::new(ToolScript::Frames(fallback_payloads(2)));
    let pipeline = ExtractionPipeline::new(SyntheticBackend::new(50), tool);
    let options = ExtractOptions::new().with_cancellation(token);

    let error = pipeline
        .extract("in.mp4".as_ref(), &[0, 10, 20], SIZE, &options)
        .unwrap_err();
    assert!(matches!(error, BifError::Cancelled));
    assert_eq!(pipeline.tool().unwrap().calls(), 0);
}

struct RecordingProgress {
    infos: Mutex<Vec<ProgressInfo>>,
}

impl ProgressCallback for RecordingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.infos.lock().unwrap().push(info.clone());
    }
}

#[test]
fn progress_reaches_the_sample_count() {
    let recorder = Arc::new(RecordingProgress {
        infos: Mutex::new(Vec::new()),
    });
    let pipeline = ExtractionPipeline::new(
        SyntheticBackend::new(100),
        ScriptedTool::new(ToolScript::Fails),
    );
    let options = ExtractOptions::new()
        .with_jobs(2)
        .with_progress(recorder.clone());
    let timestamps: Vec<u64> = (0..100).step_by(10).collect();

    pipeline
        .extract("in.mp4".as_ref(), &timestamps, SIZE, &options)
        .unwrap();

    let infos = recorder.infos.lock().unwrap();
    let last = infos.last().expect("no progress reported");
    assert_eq!(last.operation, OperationType::FrameExtraction);
    assert_eq!(last.current, 10);
    assert_eq!(last.total, Some(10));
    assert!(infos.windows(2).all(|pair| pair[0].current <= pair[1].current));
}

// ── Whole run ──────────────────────────────────────────────────────

#[test]
fn generate_writes_a_readable_bif() {
    let directory = tempfile::tempdir().unwrap();
    let output = directory.path().join("movie-SD.bif");
    let pipeline = ExtractionPipeline::new(
        SyntheticBackend::new(95),
        ScriptedTool::new(ToolScript::Fails),
    );
    let options = ExtractOptions::new()
        .with_resolution(Resolution::Sd)
        .with_preset(Preset::Fast)
        .with_jobs(3);

    let summary = generate_bif(&pipeline, "movie.mp4".as_ref(), &output, &options).unwrap();
    assert_eq!(summary.sampled, 10);
    assert_eq!(summary.frames, 10);
    assert_eq!(summary.path, ExtractionPath::Primary);
    assert_eq!(summary.probe.duration_seconds, 95);
    // 1920x1080 source keeps 16:9 at SD height.
    assert_eq!(summary.frame_size, FrameSize::new(241, 136));

    let mut reader = BifReader::open(&output).unwrap();
    assert_eq!(reader.len(), 10);
    assert_eq!(reader.interval_ms(), 10_000);
    assert_eq!(summary.bytes_written, std::fs::metadata(&output).unwrap().len());
    let last = imaging::decode_jpeg(&reader.image(9).unwrap()).unwrap();
    assert_eq!(last.dimensions(), (241, 136));
}

#[test]
fn generate_rejects_zero_interval() {
    let directory = tempfile::tempdir().unwrap();
    let pipeline = ExtractionPipeline::new(
        SyntheticBackend::new(95),
        ScriptedTool::new(ToolScript::Fails),
    );
    let options = ExtractOptions::new().with_interval(0);
    let result = generate_bif(
        &pipeline,
        "movie.mp4".as_ref(),
        &directory.path().join("x.bif"),
        &options,
    );
    assert!(matches!(result, Err(BifError::InvalidInterval)));
}

#[test]
fn generate_reports_unprobeable_source() {
    let directory = tempfile::tempdir().unwrap();
    let pipeline = ExtractionPipeline::new(
        SyntheticBackend::failing(),
        ScriptedTool::new(ToolScript::Unavailable),
    );
    let error = generate_bif(
        &pipeline,
        "missing.mp4".as_ref(),
        &directory.path().join("x.bif"),
        &ExtractOptions::new(),
    )
    .unwrap_err();
    assert!(matches!(error, BifError::InvalidSource { .. }));
    assert_eq!(error.exit_code(), 2);
}
