use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::info;

use crate::error::ServiceError;
use crate::kernel::content::GeneratedContent;
use crate::kernel::playback::PriorityTier;
use crate::services::PlaybackSink;

/// Sink that only logs what would be played. Used by the demo binary and
/// any deployment without an audio device.
#[derive(Debug, Default)]
pub struct TracingPlaybackSink {
    paused: AtomicBool,
}

impl TracingPlaybackSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlaybackSink for TracingPlaybackSink {
    async fn play(&self, content: &GeneratedContent, tier: PriorityTier) -> Result<(), ServiceError> {
        info!(
            content_id = %content.id,
            kind = ?content.kind,
            %tier,
            fidelity = ?content.fidelity(),
            "[PLAY] {}",
            content.text
        );
        Ok(())
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        info!("[PLAY] stop");
        Ok(())
    }

    async fn pause(&self) -> Result<(), ServiceError> {
        self.paused.store(true, Ordering::SeqCst);
        info!("[PLAY] pause");
        Ok(())
    }

    async fn resume(&self) -> Result<(), ServiceError> {
        self.paused.store(false, Ordering::SeqCst);
        info!("[PLAY] resume");
        Ok(())
    }
}
