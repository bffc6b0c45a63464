//! End-to-end pipeline tests against the in-memory backend.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;

use lamaimage_backend::{BackendService, MemoryBackend};
use lamaimage_core::constants::{DEFAULT_IMAGES_BUCKET, IMAGES_TABLE};
use lamaimage_core::{AppError, Session, ToolKind, TransformOutput, TransformRequest};
use lamaimage_pipeline::{
    AssetPipeline, LocalCompressExecutor, PipelineState, TransformExecutor,
};
use lamaimage_transform::{TransformError, TransformErrorKind};

enum Step {
    Ready(Result<TransformOutput, TransformError>),
    Gated(oneshot::Receiver<Result<TransformOutput, TransformError>>),
}

/// Executor that replays a scripted sequence of outcomes. Gated steps let a
/// test hold a transform in flight while it drives the pipeline elsewhere.
struct ScriptedExecutor {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
}

impl ScriptedExecutor {
    fn new() -> Arc<Self> {
        Arc::new(ScriptedExecutor {
            steps: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        })
    }

    fn push_ok(&self, payload: &'static [u8]) {
        self.steps
            .lock()
            .unwrap()
            .push_back(Step::Ready(Ok(TransformOutput::new(payload, "image/png"))));
    }

    fn push_err(&self, err: TransformError) {
        self.steps.lock().unwrap().push_back(Step::Ready(Err(err)));
    }

    fn push_gate(&self) -> oneshot::Sender<Result<TransformOutput, TransformError>> {
        let (tx, rx) = oneshot::channel();
        self.steps.lock().unwrap().push_back(Step::Gated(rx));
        tx
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn wait_for_calls(&self, n: usize) {
        for _ in 0..200 {
            if self.calls() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("executor never reached {} calls", n);
    }
}

#[async_trait]
impl TransformExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        _request: &TransformRequest,
    ) -> Result<TransformOutput, TransformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .expect("executor script exhausted");
        match step {
            Step::Ready(outcome) => outcome,
            Step::Gated(rx) => rx.await.expect("gate sender dropped"),
        }
    }
}

fn pipeline_with(
    tool: ToolKind,
    executor: Arc<dyn TransformExecutor>,
) -> (Arc<AssetPipeline>, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let pipeline = Arc::new(AssetPipeline::new(
        tool,
        executor,
        backend.clone() as Arc<dyn BackendService>,
        DEFAULT_IMAGES_BUCKET,
    ));
    (pipeline, backend)
}

/// A PNG with per-pixel noise, so JPEG re-encoding reliably shrinks it.
fn noisy_png(width: u32, height: u32) -> Vec<u8> {
    let mut seed = 0x2545f491u32;
    let img = image::RgbImage::from_fn(width, height, |_, _| {
        seed ^= seed << 13;
        seed ^= seed >> 17;
        seed ^= seed << 5;
        image::Rgb([(seed & 0xff) as u8, (seed >> 8 & 0xff) as u8, (seed >> 16 & 0xff) as u8])
    });
    let mut out = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut out),
        image::ImageFormat::Png,
    )
    .unwrap();
    out
}

#[tokio::test]
async fn test_compress_end_to_end() {
    let (pipeline, backend) =
        pipeline_with(ToolKind::Compress, Arc::new(LocalCompressExecutor));
    backend.set_session(Some(Session::new("user-1", "a@example.com")));

    let source = noisy_png(128, 128);
    let original_len = source.len() as u64;
    pipeline.select(source, "image/png", "holiday photo.png");
    pipeline.set_param(70).unwrap();
    assert_eq!(pipeline.state(), PipelineState::Previewing { param: 70 });

    pipeline.process().await.unwrap();
    assert_eq!(pipeline.state(), PipelineState::Succeeded);

    let result = pipeline.result().unwrap();
    let metrics = result.metrics.unwrap();
    assert_eq!(metrics.original_size, original_len);
    assert_eq!(metrics.result_size, result.size());
    assert_eq!(result.content_type, "image/jpeg");

    pipeline.save_to_library().await.unwrap();
    assert_eq!(pipeline.state(), PipelineState::Saved);

    let rows = backend.records(IMAGES_TABLE);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["type"], "compressed");
    assert_eq!(rows[0]["user_id"], "user-1");
    assert_eq!(rows[0]["name"], "holiday photo.png");
    assert!(rows[0]["url"]
        .as_str()
        .unwrap()
        .contains("/images/user-1/"));
    let record = pipeline.saved_record().unwrap();
    assert!(record.id.is_some());
}

#[tokio::test]
async fn test_save_requires_session_and_touches_nothing() {
    let executor = ScriptedExecutor::new();
    executor.push_ok(b"result");
    let (pipeline, backend) = pipeline_with(ToolKind::Enhance, executor);

    pipeline.select(&b"src"[..], "image/png", "a.png");
    pipeline.process().await.unwrap();
    assert_eq!(pipeline.state(), PipelineState::Succeeded);

    let err = pipeline.save_to_library().await.unwrap_err();
    assert!(matches!(err, AppError::NotAuthenticated(_)));
    assert_eq!(backend.upload_count(), 0);
    assert_eq!(backend.insert_count(), 0);
    // Result is still available for a retry after signing in.
    assert_eq!(pipeline.state(), PipelineState::Succeeded);
}

#[tokio::test]
async fn test_save_is_idempotent() {
    let executor = ScriptedExecutor::new();
    executor.push_ok(b"result");
    let (pipeline, backend) = pipeline_with(ToolKind::RemoveBackground, executor);
    backend.set_session(Some(Session::new("user-1", "a@example.com")));

    pipeline.select(&b"src"[..], "image/png", "a.png");
    pipeline.process().await.unwrap();
    pipeline.save_to_library().await.unwrap();
    pipeline.save_to_library().await.unwrap();

    assert_eq!(backend.upload_count(), 1);
    assert_eq!(backend.insert_count(), 1);
    assert_eq!(backend.records(IMAGES_TABLE).len(), 1);
}

#[tokio::test]
async fn test_insert_failure_removes_uploaded_object() {
    let executor = ScriptedExecutor::new();
    executor.push_ok(b"result");
    let (pipeline, backend) = pipeline_with(ToolKind::Enhance, executor);
    backend.set_session(Some(Session::new("user-1", "a@example.com")));
    backend.set_fail_inserts(true);

    pipeline.select(&b"src"[..], "image/png", "a.png");
    pipeline.process().await.unwrap();

    let err = pipeline.save_to_library().await.unwrap_err();
    assert!(matches!(err, AppError::Record(_)));
    assert_eq!(backend.upload_count(), 1);
    assert_eq!(backend.object_count(), 0, "orphaned upload must be removed");
    assert_eq!(pipeline.state(), PipelineState::Succeeded);

    // The result survives the failure, so the user can just save again.
    backend.set_fail_inserts(false);
    pipeline.save_to_library().await.unwrap();
    assert_eq!(pipeline.state(), PipelineState::Saved);
    assert_eq!(backend.records(IMAGES_TABLE).len(), 1);
}

#[tokio::test]
async fn test_stale_completion_discarded_after_clear() {
    let executor = ScriptedExecutor::new();
    let gate = executor.push_gate();
    executor.push_ok(b"fresh");
    let (pipeline, _backend) = pipeline_with(ToolKind::Enhance, executor.clone());

    pipeline.select(&b"old"[..], "image/png", "old.png");
    let p = pipeline.clone();
    let slow = tokio::spawn(async move { p.process().await });
    executor.wait_for_calls(1).await;
    assert_eq!(pipeline.state(), PipelineState::Processing);

    // Abandon the slow run and start over with a new file.
    pipeline.clear();
    pipeline.select(&b"new"[..], "image/png", "new.png");
    pipeline.process().await.unwrap();
    assert_eq!(pipeline.state(), PipelineState::Succeeded);
    let fresh = pipeline.result().unwrap();

    // The slow run finally completes; its output must be discarded.
    gate.send(Ok(TransformOutput::new(&b"stale"[..], "image/png")))
        .unwrap();
    slow.await.unwrap().unwrap();

    assert_eq!(pipeline.state(), PipelineState::Succeeded);
    assert_eq!(pipeline.download().unwrap(), fresh.data);
    assert_eq!(&pipeline.download().unwrap()[..], &b"fresh"[..]);
}

#[tokio::test]
async fn test_second_trigger_while_processing_is_ignored() {
    let executor = ScriptedExecutor::new();
    let gate = executor.push_gate();
    let (pipeline, _backend) = pipeline_with(ToolKind::Enhance, executor.clone());

    pipeline.select(&b"src"[..], "image/png", "a.png");
    let p = pipeline.clone();
    let task = tokio::spawn(async move { p.process().await });
    executor.wait_for_calls(1).await;

    // Second trigger is a silent no-op, not a queued run.
    pipeline.process().await.unwrap();
    assert_eq!(executor.calls(), 1);

    gate.send(Ok(TransformOutput::new(&b"done"[..], "image/png")))
        .unwrap();
    task.await.unwrap().unwrap();
    assert_eq!(pipeline.state(), PipelineState::Succeeded);
    assert_eq!(executor.calls(), 1);
}

#[tokio::test]
async fn test_auth_failure_arms_one_retry() {
    let executor = ScriptedExecutor::new();
    executor.push_err(TransformError::auth_required("Invalid API key"));
    executor.push_ok(b"recovered");
    let (pipeline, _backend) = pipeline_with(ToolKind::Enhance, executor.clone());

    pipeline.select(&b"src"[..], "image/png", "a.png");
    pipeline.process().await.unwrap();
    assert_eq!(
        pipeline.state(),
        PipelineState::Failed(TransformErrorKind::AuthRequired)
    );
    assert!(pipeline
        .last_error()
        .unwrap()
        .message
        .contains("API key"));

    pipeline.retry_after_reauth().await.unwrap();
    assert_eq!(pipeline.state(), PipelineState::Succeeded);

    // No second automatic retry from a succeeded state.
    let err = pipeline.retry_after_reauth().await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_transient_failure_does_not_arm_retry() {
    let executor = ScriptedExecutor::new();
    executor.push_err(TransformError::transient("model overloaded"));
    let (pipeline, _backend) = pipeline_with(ToolKind::RemoveBackground, executor);

    pipeline.select(&b"src"[..], "image/png", "a.png");
    pipeline.process().await.unwrap();
    assert_eq!(
        pipeline.state(),
        PipelineState::Failed(TransformErrorKind::Transient)
    );
    assert!(matches!(
        pipeline.retry_after_reauth().await.unwrap_err(),
        AppError::InvalidState(_)
    ));
}

#[tokio::test]
async fn test_param_change_invalidates_result() {
    let executor = ScriptedExecutor::new();
    executor.push_ok(b"first");
    let (pipeline, _backend) = pipeline_with(ToolKind::Compress, executor);

    pipeline.select(&b"src"[..], "image/png", "a.png");
    pipeline.process().await.unwrap();
    let old_preview = pipeline.result().unwrap().preview;

    pipeline.set_param(60).unwrap();
    assert_eq!(pipeline.state(), PipelineState::Previewing { param: 60 });
    assert!(pipeline.result().is_none());
    assert!(old_preview.is_released());
}

#[tokio::test]
async fn test_select_resets_and_releases_previews() {
    let executor = ScriptedExecutor::new();
    executor.push_ok(b"first");
    let (pipeline, backend) = pipeline_with(ToolKind::Enhance, executor);
    backend.set_session(Some(Session::new("user-1", "a@example.com")));

    pipeline.select(&b"one"[..], "image/png", "one.png");
    pipeline.process().await.unwrap();
    pipeline.save_to_library().await.unwrap();
    let old_preview = pipeline.result().unwrap().preview;

    pipeline.select(&b"two"[..], "image/png", "two.png");
    assert_eq!(pipeline.state(), PipelineState::Selected);
    assert!(pipeline.result().is_none());
    assert!(pipeline.saved_record().is_none());
    assert!(old_preview.is_released());
}

#[tokio::test]
async fn test_clear_releases_previews_and_resets() {
    let executor = ScriptedExecutor::new();
    executor.push_ok(b"result");
    let (pipeline, _backend) = pipeline_with(ToolKind::Enhance, executor);

    pipeline.select(&b"src"[..], "image/png", "a.png");
    pipeline.process().await.unwrap();
    let source_preview = pipeline.source_preview().unwrap();
    let result_preview = pipeline.result().unwrap().preview;

    pipeline.clear();
    assert_eq!(pipeline.state(), PipelineState::Empty);
    assert!(pipeline.result().is_none());
    assert!(pipeline.source_preview().is_none());
    assert!(pipeline.saved_record().is_none());
    assert!(pipeline.last_error().is_none());
    assert!(source_preview.is_released());
    assert!(result_preview.is_released());
}

#[tokio::test]
async fn test_param_bounds_per_tool() {
    let executor = ScriptedExecutor::new();
    let (enhance, _backend) = pipeline_with(ToolKind::Enhance, executor.clone());
    enhance.select(&b"src"[..], "image/png", "a.png");
    assert!(matches!(
        enhance.set_param(101).unwrap_err(),
        AppError::Validation(_)
    ));
    enhance.set_param(100).unwrap();
    assert_eq!(enhance.state(), PipelineState::Previewing { param: 100 });

    let (remove_bg, _backend) = pipeline_with(ToolKind::RemoveBackground, executor);
    remove_bg.select(&b"src"[..], "image/png", "a.png");
    assert!(matches!(
        remove_bg.set_param(50).unwrap_err(),
        AppError::Validation(_)
    ));
}

#[tokio::test]
async fn test_invalid_state_transitions() {
    let executor = ScriptedExecutor::new();
    let (pipeline, _backend) = pipeline_with(ToolKind::Enhance, executor);

    // Nothing selected yet.
    assert!(matches!(
        pipeline.process().await.unwrap_err(),
        AppError::InvalidState(_)
    ));
    assert!(matches!(
        pipeline.set_param(50).unwrap_err(),
        AppError::InvalidState(_)
    ));
    assert!(matches!(
        pipeline.save_to_library().await.unwrap_err(),
        AppError::InvalidState(_)
    ));

    pipeline.clear();
    assert_eq!(pipeline.state(), PipelineState::Empty);
}
