//! Constant-rate traffic sources

use std::time::Duration;

use serde::{Deserialize, Serialize};

use cellcast_core::{ConfigError, Destination, InterfaceId, Packet};

/// Constant-rate application traffic: one packet every `interval` from
/// `start` until `stop` (exclusive). An empty window is legal and produces
/// no packets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficConfig {
    pub interval: Duration,
    pub packet_size: usize,
    pub start: Duration,
    pub stop: Duration,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            packet_size: 1024,
            start: Duration::from_millis(100),
            stop: Duration::from_secs(1),
        }
    }
}

impl TrafficConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        if self.packet_size == 0 {
            return Err(ConfigError::ZeroPacketSize);
        }
        Ok(())
    }
}

/// One traffic source: emits packets from `source` toward `destination` on
/// the configured cadence.
#[derive(Debug, Clone)]
pub struct TrafficGenerator {
    config: TrafficConfig,
    source: InterfaceId,
    destination: Destination,
}

impl TrafficGenerator {
    pub fn new(
        config: TrafficConfig,
        source: InterfaceId,
        destination: Destination,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            source,
            destination,
        })
    }

    pub fn config(&self) -> &TrafficConfig {
        &self.config
    }

    pub fn source(&self) -> InterfaceId {
        self.source
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// When the generator fires first, if ever.
    pub fn first_tick(&self) -> Option<Duration> {
        (self.config.start < self.config.stop).then_some(self.config.start)
    }

    /// When the generator fires next after a tick at `now`, if still inside
    /// its window.
    pub fn next_tick(&self, now: Duration) -> Option<Duration> {
        let next = now + self.config.interval;
        (next < self.config.stop).then_some(next)
    }

    pub fn make_packet(&self, now: Duration) -> Packet {
        Packet {
            size: self.config.packet_size,
            created_at: now,
            source: self.source,
            destination: self.destination.clone(),
        }
    }
}
