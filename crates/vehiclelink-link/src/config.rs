use vehiclelink_frame::FrameConfig;

use crate::ack::AckConfig;
use crate::liveness::LivenessConfig;

/// Default depth of the outbound frame queue.
pub const DEFAULT_OUTBOUND_QUEUE: usize = 32;

/// Settings for a [`ConnectionManager`](crate::ConnectionManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Record framing on the wire.
    pub frame: FrameConfig,
    /// Command acknowledgment policy.
    pub ack: AckConfig,
    /// Silence detection and heartbeat.
    pub liveness: LivenessConfig,
    /// Frames buffered for the writer task before senders wait.
    pub outbound_queue: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            ack: AckConfig::default(),
            liveness: LivenessConfig::default(),
            outbound_queue: DEFAULT_OUTBOUND_QUEUE,
        }
    }
}

impl LinkConfig {
    pub fn with_frame_config(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }

    pub fn with_ack_config(mut self, ack: AckConfig) -> Self {
        self.ack = ack;
        self
    }

    pub fn with_liveness_config(mut self, liveness: LivenessConfig) -> Self {
        self.liveness = liveness;
        self
    }

    pub fn with_outbound_queue(mut self, outbound_queue: usize) -> Self {
        self.outbound_queue = outbound_queue.max(1);
        self
    }
}
