//! Deployment geometry and movement helpers

use std::time::Duration;

use cellcast_core::Position;

/// Standard mast position for the cell's access point.
pub fn access_point_position() -> Position {
    Position::new(0.0, 0.0, 10.0)
}

/// Stations on a line starting 10 m from the mast, 5 m apart, at handset
/// height.
pub fn station_line(count: u32) -> Vec<Position> {
    (0..count)
        .map(|i| Position::new(10.0 + 5.0 * i as f64, 0.0, 1.5))
        .collect()
}

/// Straight-line movement between two positions over a time window,
/// expressed as waypoints to schedule as position-update events.
#[derive(Debug, Clone)]
pub struct LinearMotion {
    pub from: Position,
    pub to: Position,
    pub start: Duration,
    pub duration: Duration,
}

impl LinearMotion {
    /// Sample the path at `steps` evenly spaced times after `start`. The
    /// last waypoint lands exactly on the destination.
    pub fn waypoints(&self, steps: u32) -> Vec<(Duration, Position)> {
        let mut points = Vec::with_capacity(steps as usize);
        for i in 1..=steps {
            let fraction = i as f64 / steps as f64;
            let time = self.start + self.duration.mul_f64(fraction);
            let position = Position::new(
                self.from.x + (self.to.x - self.from.x) * fraction,
                self.from.y + (self.to.y - self.from.y) * fraction,
                self.from.z + (self.to.z - self.from.z) * fraction,
            );
            points.push((time, position));
        }
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_line_spacing() {
        let positions = station_line(3);
        assert_eq!(positions.len(), 3);
        assert_eq!(positions[0].x, 10.0);
        assert_eq!(positions[1].x, 15.0);
        assert_eq!(positions[2].x, 20.0);
        assert!(positions.iter().all(|p| p.z == 1.5));
    }

    #[test]
    fn test_waypoints_reach_destination() {
        let motion = LinearMotion {
            from: Position::new(10.0, 0.0, 1.5),
            to: Position::new(30.0, 0.0, 1.5),
            start: Duration::from_secs(1),
            duration: Duration::from_secs(4),
        };

        let points = motion.waypoints(4);
        assert_eq!(points.len(), 4);
        assert_eq!(points[0].0, Duration::from_secs(2));
        assert_eq!(points[0].1.x, 15.0);
        assert_eq!(points[3].0, Duration::from_secs(5));
        assert_eq!(points[3].1, motion.to);
    }
}
