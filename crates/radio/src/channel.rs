//! Channel models: per-attempt delivery outcome for one link

use std::time::Duration;

use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use cellcast_core::{ConfigError, NodeId};

use crate::scheduler::ResourceBlock;
use crate::RadioConfig;

/// One transmission attempt over the air: sender, receiver, their current
/// separation, and the payload size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link {
    pub source: NodeId,
    pub target: NodeId,
    pub distance_m: f64,
    pub bytes: usize,
}

/// What a single attempt produced. `delay` is from grant to reception and is
/// meaningless when `delivered` is false.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttemptOutcome {
    pub delivered: bool,
    pub delay: Duration,
}

impl AttemptOutcome {
    pub fn lost() -> Self {
        Self {
            delivered: false,
            delay: Duration::ZERO,
        }
    }

    pub fn delivered(delay: Duration) -> Self {
        Self {
            delivered: true,
            delay,
        }
    }
}

/// Decides the fate of each transmission attempt.
///
/// Implementations own their randomness: a model seeded identically and fed
/// identical attempts produces identical outcomes.
pub trait ChannelModel {
    fn attempt(&mut self, link: &Link, block: &ResourceBlock, now: Duration) -> AttemptOutcome;
}

/// Always delivers, with a fixed delay. The baseline for protocol tests.
#[derive(Debug, Clone, Default)]
pub struct IdealChannel {
    delay: Duration,
}

impl IdealChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }
}

impl ChannelModel for IdealChannel {
    fn attempt(&mut self, _link: &Link, _block: &ResourceBlock, _now: Duration) -> AttemptOutcome {
        AttemptOutcome::delivered(self.delay)
    }
}

/// Fixed drop probability plus latency with gaussian jitter. Transmission
/// time for the payload is charged against the configured bandwidth.
pub struct FixedLossChannel {
    loss: f32,
    latency: Duration,
    jitter: Option<Normal<f64>>,
    bandwidth_bps: u32,
    rng: StdRng,
}

impl FixedLossChannel {
    pub fn new(config: &RadioConfig, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        let jitter = if config.latency_jitter.is_zero() {
            None
        } else {
            let sigma = config.latency_jitter.as_secs_f64();
            Some(Normal::new(0.0, sigma).map_err(|_| ConfigError::InvalidNoise)?)
        };
        Ok(Self {
            loss: config.packet_loss,
            latency: config.latency,
            jitter,
            bandwidth_bps: config.bandwidth_bps,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

impl ChannelModel for FixedLossChannel {
    fn attempt(&mut self, link: &Link, _block: &ResourceBlock, _now: Duration) -> AttemptOutcome {
        if self.rng.random::<f32>() < self.loss {
            debug!("channel drop on link {} -> {}", link.source, link.target);
            return AttemptOutcome::lost();
        }

        let transmission = Duration::from_secs_f64(
            (link.bytes * 8) as f64 / self.bandwidth_bps as f64,
        );
        let mut delay_secs = (self.latency + transmission).as_secs_f64();
        if let Some(jitter) = &self.jitter {
            delay_secs += jitter.sample(&mut self.rng);
        }
        // Jitter can pull the delay negative; reception never precedes the grant.
        let delay = Duration::from_secs_f64(delay_secs.max(0.0));
        trace!(
            "delivering {} bytes {} -> {} after {:?}",
            link.bytes,
            link.source,
            link.target,
            delay
        );
        AttemptOutcome::delivered(delay)
    }
}

/// Log-distance path loss with log-normal shadowing, checked against a
/// receiver sensitivity threshold.
pub struct PathLossChannel {
    tx_power_dbm: f64,
    sensitivity_dbm: f64,
    reference_loss_db: f64,
    exponent: f64,
    shadowing: Option<Normal<f64>>,
    latency: Duration,
    rng: StdRng,
}

impl PathLossChannel {
    pub fn new(
        tx_power_dbm: f64,
        sensitivity_dbm: f64,
        reference_loss_db: f64,
        exponent: f64,
        shadowing_sigma_db: f64,
        latency: Duration,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        let shadowing = if shadowing_sigma_db == 0.0 {
            None
        } else {
            Some(Normal::new(0.0, shadowing_sigma_db).map_err(|_| ConfigError::InvalidNoise)?)
        };
        Ok(Self {
            tx_power_dbm,
            sensitivity_dbm,
            reference_loss_db,
            exponent,
            shadowing,
            latency,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    fn path_loss_db(&mut self, distance_m: f64) -> f64 {
        // Below the 1 m reference distance only the reference loss applies.
        let distance = distance_m.max(1.0);
        let mut loss = self.reference_loss_db + 10.0 * self.exponent * distance.log10();
        if let Some(shadowing) = &self.shadowing {
            loss += shadowing.sample(&mut self.rng);
        }
        loss
    }
}

impl ChannelModel for PathLossChannel {
    fn attempt(&mut self, link: &Link, _block: &ResourceBlock, _now: Duration) -> AttemptOutcome {
        let loss = self.path_loss_db(link.distance_m);
        let rssi = self.tx_power_dbm - loss;
        if rssi < self.sensitivity_dbm {
            debug!(
                "link {} -> {} below sensitivity: rssi {:.1} dBm at {:.1} m",
                link.source, link.target, rssi, link.distance_m
            );
            return AttemptOutcome::lost();
        }
        AttemptOutcome::delivered(self.latency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(distance_m: f64) -> Link {
        Link {
            source: 0,
            target: 1,
            distance_m,
            bytes: 1024,
        }
    }

    fn block() -> ResourceBlock {
        ResourceBlock {
            frame: 0,
            sub_band: 0,
        }
    }

    #[test]
    fn test_ideal_always_delivers() {
        let mut channel = IdealChannel::new();
        for _ in 0..100 {
            let outcome = channel.attempt(&link(1000.0), &block(), Duration::ZERO);
            assert!(outcome.delivered);
            assert_eq!(outcome.delay, Duration::ZERO);
        }
    }

    #[test]
    fn test_fixed_loss_extremes() {
        let lossless = RadioConfig {
            packet_loss: 0.0,
            latency_jitter: Duration::ZERO,
            ..Default::default()
        };
        let mut channel = FixedLossChannel::new(&lossless, 1).unwrap();
        assert!(channel.attempt(&link(10.0), &block(), Duration::ZERO).delivered);

        let total_loss = RadioConfig {
            packet_loss: 1.0,
            ..Default::default()
        };
        let mut channel = FixedLossChannel::new(&total_loss, 1).unwrap();
        for _ in 0..20 {
            assert!(!channel.attempt(&link(10.0), &block(), Duration::ZERO).delivered);
        }
    }

    #[test]
    fn test_fixed_loss_charges_transmission_time() {
        let config = RadioConfig {
            packet_loss: 0.0,
            latency: Duration::from_millis(2),
            latency_jitter: Duration::ZERO,
            bandwidth_bps: 1_024_000,
            ..Default::default()
        };
        let mut channel = FixedLossChannel::new(&config, 1).unwrap();
        let outcome = channel.attempt(&link(10.0), &block(), Duration::ZERO);
        // 1024 bytes at 1024 kbps is 8 ms on the air, plus 2 ms latency.
        assert_eq!(outcome.delay, Duration::from_millis(10));
    }

    #[test]
    fn test_fixed_loss_same_seed_same_outcomes() {
        let config = RadioConfig {
            packet_loss: 0.5,
            ..Default::default()
        };
        let mut a = FixedLossChannel::new(&config, 42).unwrap();
        let mut b = FixedLossChannel::new(&config, 42).unwrap();

        for _ in 0..50 {
            let oa = a.attempt(&link(10.0), &block(), Duration::ZERO);
            let ob = b.attempt(&link(10.0), &block(), Duration::ZERO);
            assert_eq!(oa, ob);
        }
    }

    #[test]
    fn test_fixed_loss_rejects_bad_config() {
        let config = RadioConfig {
            packet_loss: -0.1,
            ..Default::default()
        };
        assert!(FixedLossChannel::new(&config, 1).is_err());
    }

    #[test]
    fn test_path_loss_distance_threshold() {
        // 30 dB at 1 m, exponent 3, no shadowing: 14 dBm tx reaches -100 dBm
        // sensitivity out to 10^((114 - 30) / 30) ~ 630 m.
        let mut channel =
            PathLossChannel::new(14.0, -100.0, 30.0, 3.0, 0.0, Duration::ZERO, 7).unwrap();

        assert!(channel.attempt(&link(100.0), &block(), Duration::ZERO).delivered);
        assert!(!channel.attempt(&link(2000.0), &block(), Duration::ZERO).delivered);
    }

    #[test]
    fn test_path_loss_same_seed_same_outcomes() {
        let mut a = PathLossChannel::new(14.0, -100.0, 30.0, 3.0, 8.0, Duration::ZERO, 9).unwrap();
        let mut b = PathLossChannel::new(14.0, -100.0, 30.0, 3.0, 8.0, Duration::ZERO, 9).unwrap();

        for _ in 0..50 {
            let oa = a.attempt(&link(500.0), &block(), Duration::ZERO);
            let ob = b.attempt(&link(500.0), &block(), Duration::ZERO);
            assert_eq!(oa, ob);
        }
    }
}
