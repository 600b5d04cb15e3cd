//! Kinematic print-time estimation
//!
//! Walks the file line by line and accumulates a coarse elapsed-time
//! estimate: linear moves contribute Euclidean XYZ distance over
//! feedrate, dwells contribute their literal pause. Acceleration is
//! ignored; the estimate only has to rank tool idle gaps against a
//! timeout measured in minutes.

use prepkit_core::gcode;

/// Cartesian target tracked across moves. The E axis is carried along
/// but never contributes to distance.
#[derive(Debug, Clone, Copy, Default)]
struct Position {
    x: f64,
    y: f64,
    z: f64,
    #[allow(dead_code)]
    e: f64,
}

/// Forward-only elapsed-time model over one file.
#[derive(Debug)]
pub(crate) struct TimeEstimator {
    position: Position,
    feedrate: f64,
    elapsed: f64,
}

impl TimeEstimator {
    /// Create an estimator starting at the origin with the given
    /// feedrate, used until the file sets one (mm/min).
    pub fn new(initial_feedrate: f64) -> Self {
        Self {
            position: Position::default(),
            feedrate: initial_feedrate,
            elapsed: 0.0,
        }
    }

    /// Cumulative estimated seconds before the next line executes.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Account for one line's time contribution.
    pub fn advance(&mut self, line: &str) {
        if gcode::is_linear_move(line) {
            self.elapsed += self.move_time(line);
        } else if let Some(seconds) = dwell_seconds(line) {
            self.elapsed += seconds;
        }
    }

    /// Time for one linear move, updating position and feedrate.
    ///
    /// A move with zero distance or a non-positive feedrate contributes
    /// zero time; the feedrate word still takes effect for later moves.
    fn move_time(&mut self, line: &str) -> f64 {
        let params = gcode::parse_params(line);

        if let Some(&feedrate) = params.get(&'F') {
            self.feedrate = feedrate;
        }

        let mut target = self.position;
        if let Some(&x) = params.get(&'X') {
            target.x = x;
        }
        if let Some(&y) = params.get(&'Y') {
            target.y = y;
        }
        if let Some(&z) = params.get(&'Z') {
            target.z = z;
        }
        if let Some(&e) = params.get(&'E') {
            target.e = e;
        }

        let dx = target.x - self.position.x;
        let dy = target.y - self.position.y;
        let dz = target.z - self.position.z;
        let distance = (dx * dx + dy * dy + dz * dz).sqrt();
        self.position = target;

        if self.feedrate > 0.0 && distance > 0.0 {
            distance / self.feedrate * 60.0
        } else {
            0.0
        }
    }
}

/// Pause contributed by a dwell command, in seconds.
///
/// `G4 P<ms>` is milliseconds, `G4 S<s>` is seconds; `P` wins when both
/// are present. Non-dwell lines yield `None`.
pub(crate) fn dwell_seconds(line: &str) -> Option<f64> {
    if !gcode::is_dwell(line) {
        return None;
    }
    let params = gcode::parse_params(line);
    if let Some(&millis) = params.get(&'P') {
        return Some(millis / 1000.0);
    }
    params.get(&'S').copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_time_from_distance_and_feedrate() {
        let mut estimator = TimeEstimator::new(3000.0);
        estimator.advance("G1 X100 F3000");
        // 100 mm at 3000 mm/min is two seconds
        assert!((estimator.elapsed() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_feedrate_is_inherited() {
        let mut estimator = TimeEstimator::new(3000.0);
        estimator.advance("G1 X50 Y0 F6000");
        estimator.advance("G1 X50 Y50");
        // 50 mm at 6000, then 50 mm at the inherited 6000
        assert!((estimator.elapsed() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_initial_feedrate_applies_before_any_f_word() {
        let mut estimator = TimeEstimator::new(1500.0);
        estimator.advance("G0 X25");
        assert!((estimator.elapsed() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_extrusion_only_moves_take_no_time() {
        let mut estimator = TimeEstimator::new(3000.0);
        estimator.advance("G1 E5 F1800");
        assert_eq!(estimator.elapsed(), 0.0);
        // The F word still sticks for the next move
        estimator.advance("G1 X30");
        assert!((estimator.elapsed() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_positive_feedrate_contributes_nothing() {
        let mut estimator = TimeEstimator::new(0.0);
        estimator.advance("G1 X100");
        assert_eq!(estimator.elapsed(), 0.0);

        let mut estimator = TimeEstimator::new(-100.0);
        estimator.advance("G1 X100");
        assert_eq!(estimator.elapsed(), 0.0);
    }

    #[test]
    fn test_non_move_lines_are_ignored() {
        let mut estimator = TimeEstimator::new(3000.0);
        estimator.advance("M104 T0 S215");
        estimator.advance("; comment");
        estimator.advance("G28");
        assert_eq!(estimator.elapsed(), 0.0);
    }

    #[test]
    fn test_dwell_seconds() {
        assert_eq!(dwell_seconds("G4 P500"), Some(0.5));
        assert_eq!(dwell_seconds("G4 S2.5"), Some(2.5));
        assert_eq!(dwell_seconds("G04 P250"), Some(0.25));
        assert_eq!(dwell_seconds("G4"), None);
        assert_eq!(dwell_seconds("G1 X10"), None);
    }

    #[test]
    fn test_dwell_advances_clock() {
        let mut estimator = TimeEstimator::new(3000.0);
        estimator.advance("G4 S3");
        assert!((estimator.elapsed() - 3.0).abs() < 1e-9);
    }
}
