//! simulation tools for cellcast

pub mod scenarios;
pub mod simulation;
pub mod traffic;

pub use simulation::{SimEvent, Simulation, SimulationStats, World};
pub use traffic::{TrafficConfig, TrafficGenerator};

use std::time::Duration;
use cellcast_radio::RadioConfig;

/// Initialise logging from `RUST_LOG`. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env().try_init();
}

pub struct ChannelPresets;

impl ChannelPresets {
    pub fn clear_sky() -> RadioConfig {
        RadioConfig {
            frame_duration: Duration::from_millis(10),
            blocks_per_frame: 4,
            bandwidth_bps: 100_000_000,
            packet_loss: 0.0,
            latency: Duration::from_millis(1),
            latency_jitter: Duration::ZERO,
        }
    }

    pub fn urban_macro() -> RadioConfig {
        RadioConfig {
            frame_duration: Duration::from_millis(10),
            blocks_per_frame: 4,
            bandwidth_bps: 50_000_000,
            packet_loss: 0.05,
            latency: Duration::from_millis(2),
            latency_jitter: Duration::from_millis(1),  // ±1ms jitter (urban macro cell)
        }
    }

    pub fn cell_edge() -> RadioConfig {
        RadioConfig {
            frame_duration: Duration::from_millis(10),
            blocks_per_frame: 2,
            bandwidth_bps: 10_000_000,
            packet_loss: 0.30,
            latency: Duration::from_millis(5),
            latency_jitter: Duration::from_millis(2),  // ±2ms jitter (edge of coverage)
        }
    }
}
