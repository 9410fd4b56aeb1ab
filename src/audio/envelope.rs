// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Gain automation scheduled on the audio clock.
//!
//! An envelope is a sorted list of automation points. A point either sets the
//! gain at a sample position or ends a linear ramp that starts at the previous
//! point.

/// The gain fades start from and end at. Fades never target exactly zero.
pub const SILENT_GAIN: f32 = 0.0001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PointKind {
    Set,
    LinearRamp,
}

#[derive(Debug, Clone, Copy)]
struct Point {
    at: u64,
    value: f32,
    kind: PointKind,
}

/// Scheduled gain automation for a single voice.
#[derive(Debug, Clone)]
pub struct GainEnvelope {
    /// The gain before the first point.
    initial: f32,
    /// Automation points sorted by sample position.
    points: Vec<Point>,
}

impl GainEnvelope {
    /// Creates an envelope that holds the given gain until automation is scheduled.
    pub fn new(initial: f32) -> Self {
        Self {
            initial,
            points: Vec::new(),
        }
    }

    /// Sets the gain to `value` at sample position `at`.
    pub fn set_value_at(&mut self, value: f32, at: u64) {
        self.insert(Point {
            at,
            value,
            kind: PointKind::Set,
        });
    }

    /// Ramps linearly from the previous point to `value`, arriving at sample position `end`.
    pub fn linear_ramp_to(&mut self, value: f32, end: u64) {
        self.insert(Point {
            at: end,
            value,
            kind: PointKind::LinearRamp,
        });
    }

    /// Drops all scheduled automation and holds the gain the envelope had at `at`.
    pub fn cancel_and_hold(&mut self, at: u64) {
        let held = self.value_at(at);
        self.initial = held;
        self.points.clear();
        self.set_value_at(held, at);
    }

    /// Returns the gain at the given sample position.
    pub fn value_at(&self, at: u64) -> f32 {
        let next = self.points.partition_point(|p| p.at <= at);
        let (start, start_value) = match next.checked_sub(1).map(|i| self.points[i]) {
            Some(point) => (point.at, point.value),
            None => (0, self.initial),
        };

        match self.points.get(next) {
            Some(end) if end.kind == PointKind::LinearRamp => {
                let span = end.at.saturating_sub(start);
                if span == 0 {
                    return end.value;
                }
                let progress = (at - start) as f32 / span as f32;
                start_value + (end.value - start_value) * progress
            }
            _ => start_value,
        }
    }

    /// Returns the sample position of the last scheduled point, if any.
    pub fn last_scheduled(&self) -> Option<u64> {
        self.points.last().map(|p| p.at)
    }

    fn insert(&mut self, point: Point) {
        let position = self.points.partition_point(|p| p.at <= point.at);
        self.points.insert(position, point);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.001
    }

    #[test]
    fn test_set_value_holds() {
        let mut envelope = GainEnvelope::new(0.0);
        envelope.set_value_at(1.0, 100);

        assert!(close(envelope.value_at(50), 0.0));
        assert!(close(envelope.value_at(100), 1.0));
        assert!(close(envelope.value_at(10_000), 1.0));
    }

    #[test]
    fn test_linear_ramp() {
        let mut envelope = GainEnvelope::new(SILENT_GAIN);
        envelope.set_value_at(SILENT_GAIN, 0);
        envelope.linear_ramp_to(1.0, 1000);

        assert!(close(envelope.value_at(0), SILENT_GAIN));
        assert!(close(envelope.value_at(500), 0.5));
        assert!(close(envelope.value_at(1000), 1.0));
        assert!(close(envelope.value_at(2000), 1.0));
    }

    #[test]
    fn test_cancel_and_hold_mid_ramp() {
        let mut envelope = GainEnvelope::new(SILENT_GAIN);
        envelope.set_value_at(SILENT_GAIN, 0);
        envelope.linear_ramp_to(1.0, 1000);

        // Fade-out requested halfway through the fade-in.
        envelope.cancel_and_hold(500);
        envelope.linear_ramp_to(SILENT_GAIN, 1500);

        assert!(close(envelope.value_at(500), 0.5));
        assert!(close(envelope.value_at(1000), 0.25));
        assert!(close(envelope.value_at(1500), SILENT_GAIN));
        // The stale fade-in must not come back.
        assert!(close(envelope.value_at(5000), SILENT_GAIN));
        assert_eq!(envelope.last_scheduled(), Some(1500));
    }

    #[test]
    fn test_zero_length_ramp() {
        let mut envelope = GainEnvelope::new(1.0);
        envelope.cancel_and_hold(200);
        envelope.linear_ramp_to(SILENT_GAIN, 200);

        assert!(close(envelope.value_at(199), 1.0));
        assert!(close(envelope.value_at(200), SILENT_GAIN));
    }
}
