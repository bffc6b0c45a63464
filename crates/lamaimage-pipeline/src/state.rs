//! Pipeline lifecycle states.

use lamaimage_transform::TransformErrorKind;

/// Lifecycle of one pipeline instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No source asset held.
    Empty,
    /// A source asset is selected; no parameter touched yet.
    Selected,
    /// Parameter changed since the last run; any prior result is
    /// invalidated so stale output is never shown against a new value.
    Previewing { param: u8 },
    /// A transform is in flight. At most one per instance.
    Processing,
    /// A result artifact is available for download and (if authenticated)
    /// saving.
    Succeeded,
    /// The last attempt failed with the given classification.
    Failed(TransformErrorKind),
    /// The result was persisted to the library. Further saves are no-ops.
    Saved,
}

impl PipelineState {
    /// Whether an explicit process trigger is accepted in this state.
    pub fn can_process(self) -> bool {
        matches!(
            self,
            PipelineState::Selected
                | PipelineState::Previewing { .. }
                | PipelineState::Succeeded
                | PipelineState::Failed(_)
        )
    }

    /// Whether a parameter change is accepted in this state.
    pub fn can_set_param(self) -> bool {
        matches!(
            self,
            PipelineState::Selected
                | PipelineState::Previewing { .. }
                | PipelineState::Succeeded
                | PipelineState::Failed(_)
        )
    }
}
