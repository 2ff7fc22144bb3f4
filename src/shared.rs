//! Read boundary between the analysis thread and its consumers.

use std::sync::{Arc, PoisonError, RwLock};

use crate::audio::features::AnalysisFrame;
use crate::audio::peak::PeakFlags;

#[derive(Debug, Default)]
pub struct SharedState {
    frame: RwLock<AnalysisFrame>,
    peaks: PeakFlags,
}

impl SharedState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Copy of the latest complete frame.
    pub fn snapshot(&self) -> AnalysisFrame {
        self.frame.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Apply one finished update under the write lock.
    pub fn publish(&self, update: impl FnOnce(&mut AnalysisFrame)) {
        let mut frame = self.frame.write().unwrap_or_else(PoisonError::into_inner);
        update(&mut frame);
    }

    pub fn peaks(&self) -> &PeakFlags {
        &self.peaks
    }

    /// Renderer side: consume the pending peak, if any.
    pub fn acknowledge_peak(&self) -> bool {
        self.peaks.renderer.take()
    }
}
