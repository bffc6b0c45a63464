//! Transform execution seam.
//!
//! The pipeline dispatches to one executor per tool instance: the offline
//! compressor for the compress tool, a remote client plus tool profile for
//! the generative tools. Tests substitute a scriptable executor here.

use std::sync::Arc;

use async_trait::async_trait;

use lamaimage_core::{ToolKind, TransformOutput, TransformRequest};
use lamaimage_transform::{
    CompressEngine, RemoteTransform, ToolProfile, TransformError,
};

/// Default compression quality when the user never touched the slider.
pub const DEFAULT_COMPRESS_QUALITY: u8 = 80;

#[async_trait]
pub trait TransformExecutor: Send + Sync {
    async fn execute(&self, request: &TransformRequest) -> Result<TransformOutput, TransformError>;
}

/// Offline executor backed by [`CompressEngine`].
pub struct LocalCompressExecutor;

#[async_trait]
impl TransformExecutor for LocalCompressExecutor {
    async fn execute(&self, request: &TransformRequest) -> Result<TransformOutput, TransformError> {
        let quality = request.param.unwrap_or(DEFAULT_COMPRESS_QUALITY);
        CompressEngine::compress_async(request.data.clone(), quality).await
    }
}

/// Remote executor: renders the tool profile's directive and issues one
/// generative call.
pub struct RemoteExecutor {
    client: Arc<dyn RemoteTransform>,
    profile: ToolProfile,
}

impl RemoteExecutor {
    pub fn new(client: Arc<dyn RemoteTransform>, profile: ToolProfile) -> Self {
        RemoteExecutor { client, profile }
    }

    /// Executor with the default profile for a remote tool.
    pub fn for_tool(tool: ToolKind, client: Arc<dyn RemoteTransform>) -> Option<Self> {
        ToolProfile::for_tool(tool).map(|profile| RemoteExecutor::new(client, profile))
    }
}

#[async_trait]
impl TransformExecutor for RemoteExecutor {
    async fn execute(&self, request: &TransformRequest) -> Result<TransformOutput, TransformError> {
        let directive = self.profile.directive(request.param);
        self.client
            .transform(request.data.clone(), &request.content_type, &directive)
            .await
    }
}
