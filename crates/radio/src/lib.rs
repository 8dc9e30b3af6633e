//! radio access layer for cellcast

use std::time::Duration;

use serde::{Deserialize, Serialize};

use cellcast_core::ConfigError;

pub mod channel;
pub mod mobility;
pub mod scheduler;

pub use channel::{AttemptOutcome, ChannelModel, FixedLossChannel, IdealChannel, Link, PathLossChannel};
pub use scheduler::{FlowTarget, FramePhase, Grant, ResourceBlock, TdmaScheduler, TxRequest};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioConfig {
    pub frame_duration: Duration,
    pub blocks_per_frame: u32,
    pub bandwidth_bps: u32,
    pub packet_loss: f32,
    pub latency: Duration,
    pub latency_jitter: Duration,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            frame_duration: Duration::from_millis(10),
            blocks_per_frame: 4,
            bandwidth_bps: 100_000_000,
            packet_loss: 0.05,
            latency: Duration::from_millis(2),
            latency_jitter: Duration::from_millis(1),
        }
    }
}

impl RadioConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_duration.is_zero() {
            return Err(ConfigError::ZeroFrameDuration);
        }
        if self.blocks_per_frame == 0 {
            return Err(ConfigError::ZeroBlocksPerFrame);
        }
        if !(0.0..=1.0).contains(&self.packet_loss) {
            return Err(ConfigError::LossOutOfRange(self.packet_loss));
        }
        Ok(())
    }
}
