//! The asset pipeline state machine.
//!
//! Owns exactly one in-flight image at a time. Transform and backend awaits
//! happen outside the state lock; every completion re-validates the instance
//! token before committing, so a clear or re-select during a slow call can
//! never resurrect a stale result.

use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use chrono::Utc;

use lamaimage_backend::{keys, BackendService};
use lamaimage_core::constants::format_size;
use lamaimage_core::{
    AppError, PreviewRef, SavedImage, Session, SourceAsset, ToolKind, TransformOutput,
    TransformRequest,
};
use lamaimage_transform::{TransformError, TransformErrorKind};

use crate::executor::TransformExecutor;
use crate::state::PipelineState;

struct Inner {
    state: PipelineState,
    source: Option<SourceAsset>,
    result: Option<TransformOutput>,
    param: Option<u8>,
    /// Instance token; bumped on select, clear, and each processing start.
    /// Completions carrying an older token are discarded.
    token: u64,
    /// One automatic retry is permitted after an AuthRequired failure.
    retry_armed: bool,
    save_in_flight: bool,
    saved_record: Option<SavedImage>,
    last_error: Option<TransformError>,
}

impl Inner {
    fn release_result(&mut self) {
        if let Some(result) = self.result.take() {
            result.preview.release();
        }
    }

    fn release_source(&mut self) {
        if let Some(source) = self.source.take() {
            source.preview.release();
        }
    }
}

/// One tool instance's pipeline.
pub struct AssetPipeline {
    tool: ToolKind,
    executor: Arc<dyn TransformExecutor>,
    backend: Arc<dyn BackendService>,
    bucket: String,
    inner: Mutex<Inner>,
}

impl AssetPipeline {
    pub fn new(
        tool: ToolKind,
        executor: Arc<dyn TransformExecutor>,
        backend: Arc<dyn BackendService>,
        bucket: impl Into<String>,
    ) -> Self {
        AssetPipeline {
            tool,
            executor,
            backend,
            bucket: bucket.into(),
            inner: Mutex::new(Inner {
                state: PipelineState::Empty,
                source: None,
                result: None,
                param: None,
                token: 0,
                retry_armed: false,
                save_in_flight: false,
                saved_record: None,
                last_error: None,
            }),
        }
    }

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PipelineState {
        self.lock().state
    }

    /// Current result artifact, if the last run succeeded.
    pub fn result(&self) -> Option<TransformOutput> {
        self.lock().result.clone()
    }

    /// Result bytes for download.
    pub fn download(&self) -> Option<Bytes> {
        self.lock().result.as_ref().map(|r| r.data.clone())
    }

    /// Preview reference for the selected source, if any.
    pub fn source_preview(&self) -> Option<PreviewRef> {
        self.lock().source.as_ref().map(|s| s.preview.clone())
    }

    /// The record created by a successful save.
    pub fn saved_record(&self) -> Option<SavedImage> {
        self.lock().saved_record.clone()
    }

    /// The last transform failure, if any.
    pub fn last_error(&self) -> Option<TransformError> {
        self.lock().last_error.clone()
    }

    /// Select a new source file. Resets any previous result and saved flag;
    /// releases prior preview references; suppresses in-flight completions.
    pub fn select(
        &self,
        data: impl Into<Bytes>,
        content_type: impl Into<String>,
        filename: impl Into<String>,
    ) {
        let mut inner = self.lock();
        inner.release_result();
        inner.release_source();
        inner.token += 1;
        inner.source = Some(SourceAsset::new(data, content_type, filename));
        inner.param = None;
        inner.retry_armed = false;
        inner.saved_record = None;
        inner.last_error = None;
        inner.state = PipelineState::Selected;
    }

    /// Parameter change (quality/intensity slider). Never calls an engine;
    /// only invalidates prior results so stale output is never shown
    /// against a new parameter value.
    ///
    /// Compression quality is clamped later by the engine; enhancement
    /// intensity is validated here (0-100). Background removal takes no
    /// parameter.
    pub fn set_param(&self, param: u8) -> Result<(), AppError> {
        match self.tool {
            ToolKind::Enhance if param > 100 => {
                return Err(AppError::Validation(
                    "Intensity must be between 0 and 100".to_string(),
                ));
            }
            ToolKind::RemoveBackground => {
                return Err(AppError::Validation(
                    "Background removal has no adjustable parameter".to_string(),
                ));
            }
            _ => {}
        }
        let mut inner = self.lock();
        if !inner.state.can_set_param() {
            return Err(AppError::InvalidState(format!(
                "Cannot change parameters in state {:?}",
                inner.state
            )));
        }
        inner.release_result();
        inner.param = Some(param);
        inner.state = PipelineState::Previewing { param };
        Ok(())
    }

    /// Explicit process trigger.
    ///
    /// A trigger while Processing is already in flight is ignored. Failures
    /// are converted into `Failed` state data, never returned as errors;
    /// only triggering from an impossible state (no source) errors.
    pub async fn process(&self) -> Result<(), AppError> {
        let (request, token) = {
            let mut inner = self.lock();
            if inner.state == PipelineState::Processing {
                tracing::debug!(tool = %self.tool, "process trigger ignored: already processing");
                return Ok(());
            }
            if !inner.state.can_process() {
                return Err(AppError::InvalidState(
                    "Select an image before processing".to_string(),
                ));
            }
            self.begin_processing(&mut inner)?
        };
        self.run(request, token).await;
        Ok(())
    }

    /// One automatic retry after a recovery action for an AuthRequired
    /// failure. Rejected unless armed by the failure that preceded it.
    pub async fn retry_after_reauth(&self) -> Result<(), AppError> {
        let (request, token) = {
            let mut inner = self.lock();
            if inner.state != PipelineState::Failed(TransformErrorKind::AuthRequired) {
                return Err(AppError::InvalidState(
                    "No authentication failure to retry".to_string(),
                ));
            }
            if !inner.retry_armed {
                return Err(AppError::InvalidState(
                    "Automatic retry already used; run the transform again manually".to_string(),
                ));
            }
            inner.retry_armed = false;
            self.begin_processing(&mut inner)?
        };
        self.run(request, token).await;
        Ok(())
    }

    /// Transition to Processing and build the run's request and token.
    /// Caller must hold the lock and have validated the current state.
    fn begin_processing(&self, inner: &mut Inner) -> Result<(TransformRequest, u64), AppError> {
        let source = inner.source.as_ref().ok_or_else(|| {
            AppError::InvalidState("Select an image before processing".to_string())
        })?;
        let request = TransformRequest {
            tool: self.tool,
            data: source.data.clone(),
            content_type: source.content_type.clone(),
            param: inner.param,
        };
        inner.release_result();
        inner.token += 1;
        inner.saved_record = None;
        inner.last_error = None;
        inner.state = PipelineState::Processing;
        Ok((request, inner.token))
    }

    /// Execute one transform and commit the outcome if still current.
    async fn run(&self, request: TransformRequest, token: u64) {
        let outcome = self.executor.execute(&request).await;

        let mut inner = self.lock();
        if inner.token != token {
            tracing::debug!(tool = %self.tool, token, "stale transform completion discarded");
            if let Ok(output) = outcome {
                output.preview.release();
            }
            return;
        }
        match outcome {
            Ok(output) => {
                inner.result = Some(output);
                inner.state = PipelineState::Succeeded;
            }
            Err(err) => {
                tracing::warn!(tool = %self.tool, kind = %err.kind, error = %err.message, "transform failed");
                inner.retry_armed = err.kind == TransformErrorKind::AuthRequired;
                inner.state = PipelineState::Failed(err.kind);
                inner.last_error = Some(err);
            }
        }
    }

    /// Persist the current Succeeded result: upload the artifact, derive
    /// its public URL, insert the library row.
    ///
    /// Requires a session; the check happens before any network call.
    /// Idempotent once Saved. An insert failure after a successful upload
    /// triggers a best-effort removal of the just-uploaded object.
    pub async fn save_to_library(&self) -> Result<(), AppError> {
        let (result, filename, token) = {
            let mut inner = self.lock();
            match inner.state {
                PipelineState::Saved => return Ok(()),
                PipelineState::Succeeded => {}
                _ => {
                    return Err(AppError::InvalidState(
                        "No completed result to save".to_string(),
                    ))
                }
            }
            if inner.save_in_flight {
                return Ok(());
            }
            let result = inner
                .result
                .clone()
                .ok_or_else(|| AppError::InvalidState("No completed result to save".to_string()))?;
            let filename = inner
                .source
                .as_ref()
                .map(|s| s.filename.clone())
                .unwrap_or_else(|| "image".to_string());
            inner.save_in_flight = true;
            (result, filename, inner.token)
        };

        let saved = self.do_save(&result, &filename).await;

        let mut inner = self.lock();
        inner.save_in_flight = false;
        match saved {
            Ok(record) => {
                if inner.token == token && inner.state == PipelineState::Succeeded {
                    inner.saved_record = Some(record);
                    inner.state = PipelineState::Saved;
                }
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn do_save(
        &self,
        result: &TransformOutput,
        filename: &str,
    ) -> Result<SavedImage, AppError> {
        let session: Session = self
            .backend
            .get_session()
            .await?
            .ok_or_else(|| {
                AppError::NotAuthenticated("You must be logged in to save images".to_string())
            })?;

        let path = keys::object_path(
            &session.user_id,
            self.tool.tag(),
            filename,
            Utc::now().timestamp_millis(),
        );

        self.backend
            .upload(&self.bucket, &path, result.data.clone(), &result.content_type)
            .await?;
        let url = self.backend.public_url(&self.bucket, &path);

        let record = SavedImage {
            id: None,
            user_id: session.user_id.clone(),
            name: filename.to_string(),
            url,
            kind: self.tool.tag().to_string(),
            date: Utc::now().to_rfc3339(),
            size: Some(format_size(result.size())),
        };

        let row = record.to_row()?;
        let stored = match self
            .backend
            .insert(lamaimage_core::constants::IMAGES_TABLE, row)
            .await
        {
            Ok(stored) => stored,
            Err(err) => {
                // Compensating cleanup: prefer a clean database over a
                // leaked-but-referenced file.
                if let Err(cleanup) = self.backend.remove(&self.bucket, &path).await {
                    tracing::warn!(path, error = %cleanup, "cleanup of orphaned upload failed");
                }
                return Err(err.into());
            }
        };

        tracing::info!(tool = %self.tool, path, "saved result to library");
        SavedImage::from_row(stored)
    }

    /// Explicit clear. Releases every preview reference, drops the source
    /// and result, and suppresses any in-flight completion.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.release_result();
        inner.release_source();
        inner.token += 1;
        inner.param = None;
        inner.retry_armed = false;
        inner.saved_record = None;
        inner.last_error = None;
        inner.state = PipelineState::Empty;
    }
}
