//! Time-division resource scheduler with a persistent round-robin cursor

use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use cellcast_core::{ConfigError, NodeId};

/// One block of air time: a sub-band within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceBlock {
    pub frame: u64,
    pub sub_band: u32,
}

/// Who a queued flow is for. Broadcast flows carry multicast traffic and
/// share their blocks across all receivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowTarget {
    Broadcast,
    Station(NodeId),
}

/// A pending request for air time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxRequest {
    pub queued_at: Duration,
    pub source: NodeId,
    pub target: FlowTarget,
    pub tag: u64,
}

/// A granted request: the block it may transmit in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    pub request: TxRequest,
    pub block: ResourceBlock,
}

/// Where the scheduler is within the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    Assigning,
    Committed,
}

#[derive(Debug, Default)]
struct SchedulerStats {
    frames_started: u64,
    requests_submitted: u64,
    grants_issued: u64,
}

/// Assigns resource blocks frame by frame.
///
/// Every frame is assigned from scratch; the only state carried across
/// frames is the round-robin cursor over stations (and the backlog of flows
/// that did not fit). At equal queue times broadcast flows go first, then
/// station flows in ascending node order rotated by the cursor.
pub struct TdmaScheduler {
    blocks_per_frame: u32,
    cursor: usize,
    current_frame: Option<u64>,
    blocks_used: u32,
    phase: FramePhase,
    backlog: Vec<TxRequest>,
    stats: SchedulerStats,
}

impl TdmaScheduler {
    pub fn new(blocks_per_frame: u32) -> Result<Self, ConfigError> {
        if blocks_per_frame == 0 {
            return Err(ConfigError::ZeroBlocksPerFrame);
        }
        Ok(Self {
            blocks_per_frame,
            cursor: 0,
            current_frame: None,
            blocks_used: 0,
            phase: FramePhase::Idle,
            backlog: Vec::new(),
            stats: SchedulerStats::default(),
        })
    }

    /// Queue a flow for the next assignment.
    pub fn submit(&mut self, request: TxRequest) {
        self.stats.requests_submitted += 1;
        self.backlog.push(request);
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Assign blocks of `frame` to backlogged flows.
    ///
    /// Starting a frame is lazy: the first call for a given index starts it,
    /// later calls for the same index hand out whatever blocks remain, and
    /// calls for an older index grant nothing. `stations` is the attached
    /// station set in ascending order.
    ///
    /// Ties at equal queue times are not broken by plain ascending node id:
    /// the station order is rotated by the cursor, so a station served last
    /// frame does not win the next tie as well.
    pub fn assign(&mut self, frame: u64, stations: &[NodeId]) -> Vec<Grant> {
        match self.current_frame {
            Some(current) if frame < current => return Vec::new(),
            Some(current) if frame == current => {}
            _ => {
                self.current_frame = Some(frame);
                self.blocks_used = 0;
                self.stats.frames_started += 1;
            }
        }
        self.phase = FramePhase::Assigning;

        let cursor = if stations.is_empty() {
            0
        } else {
            self.cursor % stations.len()
        };
        self.backlog.sort_by_key(|request| match request.target {
            FlowTarget::Broadcast => (request.queued_at, 0, 0),
            FlowTarget::Station(id) => {
                let rank = stations
                    .iter()
                    .position(|s| *s == id)
                    .map(|p| (p + stations.len() - cursor) % stations.len())
                    .unwrap_or(stations.len());
                (request.queued_at, 1, rank)
            }
        });

        let capacity = (self.blocks_per_frame - self.blocks_used) as usize;
        let take = capacity.min(self.backlog.len());
        let mut grants = Vec::with_capacity(take);
        let mut last_station = None;
        for request in self.backlog.drain(..take) {
            let block = ResourceBlock {
                frame,
                sub_band: self.blocks_used,
            };
            self.blocks_used += 1;
            if let FlowTarget::Station(id) = request.target {
                last_station = Some(id);
            }
            grants.push(Grant { request, block });
        }

        if let Some(id) = last_station {
            if let Some(pos) = stations.iter().position(|s| *s == id) {
                self.cursor = (pos + 1) % stations.len();
            }
        }

        self.stats.grants_issued += grants.len() as u64;
        if !grants.is_empty() {
            debug!(
                "frame {}: granted {} blocks, {} flows backlogged",
                frame,
                grants.len(),
                self.backlog.len()
            );
        }
        self.phase = FramePhase::Committed;
        grants
    }

    pub fn get_stats(&self) -> (u64, u64, u64) {
        (
            self.stats.frames_started,
            self.stats.requests_submitted,
            self.stats.grants_issued,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station_request(queued_ms: u64, node: NodeId, tag: u64) -> TxRequest {
        TxRequest {
            queued_at: Duration::from_millis(queued_ms),
            source: 0,
            target: FlowTarget::Station(node),
            tag,
        }
    }

    fn broadcast_request(queued_ms: u64, tag: u64) -> TxRequest {
        TxRequest {
            queued_at: Duration::from_millis(queued_ms),
            source: 0,
            target: FlowTarget::Broadcast,
            tag,
        }
    }

    fn granted_tags(grants: &[Grant]) -> Vec<u64> {
        grants.iter().map(|g| g.request.tag).collect()
    }

    #[test]
    fn test_rejects_zero_blocks() {
        assert!(TdmaScheduler::new(0).is_err());
    }

    #[test]
    fn test_capacity_backlogs_to_next_frame() {
        let mut sched = TdmaScheduler::new(2).unwrap();
        let stations = [1, 2, 3];
        sched.submit(station_request(0, 1, 10));
        sched.submit(station_request(0, 2, 20));
        sched.submit(station_request(0, 3, 30));

        let grants = sched.assign(0, &stations);
        assert_eq!(granted_tags(&grants), vec![10, 20]);
        assert_eq!(sched.backlog_len(), 1);

        let grants = sched.assign(1, &stations);
        assert_eq!(granted_tags(&grants), vec![30]);
        assert_eq!(sched.backlog_len(), 0);
    }

    #[test]
    fn test_broadcast_wins_ties() {
        let mut sched = TdmaScheduler::new(4).unwrap();
        sched.submit(station_request(0, 1, 1));
        sched.submit(broadcast_request(0, 2));

        let grants = sched.assign(0, &[1]);
        assert_eq!(granted_tags(&grants), vec![2, 1]);
    }

    #[test]
    fn test_earlier_queue_time_beats_broadcast() {
        let mut sched = TdmaScheduler::new(4).unwrap();
        sched.submit(broadcast_request(5, 2));
        sched.submit(station_request(0, 1, 1));

        let grants = sched.assign(0, &[1]);
        assert_eq!(granted_tags(&grants), vec![1, 2]);
    }

    #[test]
    fn test_round_robin_cursor_persists() {
        let mut sched = TdmaScheduler::new(1).unwrap();
        let stations = [1, 2, 3];
        sched.submit(station_request(0, 1, 1));
        sched.submit(station_request(0, 2, 2));
        sched.submit(station_request(0, 3, 3));

        // One block per frame: the cursor walks the station order across
        // frames instead of re-serving station 1.
        assert_eq!(granted_tags(&sched.assign(0, &stations)), vec![1]);
        assert_eq!(granted_tags(&sched.assign(1, &stations)), vec![2]);
        assert_eq!(granted_tags(&sched.assign(2, &stations)), vec![3]);
    }

    #[test]
    fn test_cursor_rotates_start_of_order() {
        let mut sched = TdmaScheduler::new(1).unwrap();
        let stations = [1, 2, 3];

        sched.submit(station_request(0, 1, 1));
        sched.assign(0, &stations);

        // Cursor now points past station 1; at the next tie station 2 wins
        // even though station 1 queued first in insertion order.
        sched.submit(station_request(10, 1, 11));
        sched.submit(station_request(10, 2, 12));
        assert_eq!(granted_tags(&sched.assign(1, &stations)), vec![12]);
    }

    #[test]
    fn test_same_frame_never_resets() {
        let mut sched = TdmaScheduler::new(2).unwrap();
        let stations = [1, 2];

        sched.submit(station_request(0, 1, 1));
        let grants = sched.assign(7, &stations);
        assert_eq!(grants[0].block, ResourceBlock { frame: 7, sub_band: 0 });

        sched.submit(station_request(0, 2, 2));
        let grants = sched.assign(7, &stations);
        assert_eq!(grants[0].block, ResourceBlock { frame: 7, sub_band: 1 });

        sched.submit(station_request(0, 1, 3));
        assert!(sched.assign(7, &stations).is_empty());
        assert_eq!(granted_tags(&sched.assign(8, &stations)), vec![3]);
    }

    #[test]
    fn test_stale_frame_grants_nothing() {
        let mut sched = TdmaScheduler::new(4).unwrap();
        sched.assign(5, &[1]);
        sched.submit(station_request(0, 1, 1));
        assert!(sched.assign(4, &[1]).is_empty());
        assert_eq!(sched.backlog_len(), 1);
    }

    #[test]
    fn test_unattached_station_sorts_last() {
        let mut sched = TdmaScheduler::new(1).unwrap();
        sched.submit(station_request(0, 9, 90));
        sched.submit(station_request(0, 1, 10));

        assert_eq!(granted_tags(&sched.assign(0, &[1, 2])), vec![10]);
    }

    #[test]
    fn test_phase_transitions() {
        let mut sched = TdmaScheduler::new(1).unwrap();
        assert_eq!(sched.phase(), FramePhase::Idle);
        sched.assign(0, &[1]);
        assert_eq!(sched.phase(), FramePhase::Committed);
    }

    #[test]
    fn test_stats() {
        let mut sched = TdmaScheduler::new(1).unwrap();
        sched.submit(station_request(0, 1, 1));
        sched.submit(station_request(0, 2, 2));
        sched.assign(0, &[1, 2]);
        sched.assign(1, &[1, 2]);

        assert_eq!(sched.get_stats(), (2, 2, 2));
    }
}
