use crate::render::broker::{PipelineState, ResourceBroker};

/// Captures the device pipeline state on construction and puts it back when
/// dropped, on every exit path of the flip pass.
pub struct PipelineStateGuard<'a> {
    broker: &'a dyn ResourceBroker,
    saved: Option<PipelineState>,
}

impl<'a> PipelineStateGuard<'a> {
    pub fn capture(broker: &'a dyn ResourceBroker) -> Self {
        let saved = broker.capture_pipeline_state();
        Self {
            broker,
            saved: Some(saved),
        }
    }

    /// State that will be restored.
    pub fn saved(&self) -> Option<&PipelineState> {
        self.saved.as_ref()
    }
}

impl Drop for PipelineStateGuard<'_> {
    fn drop(&mut self) {
        if let Some(state) = self.saved.take() {
            self.broker.apply_pipeline_state(&state);
        }
    }
}
