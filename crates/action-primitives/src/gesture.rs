//! Stroke construction from normalized action coordinates.

use std::time::Duration;

use screenpilot_core_types::{NormalizedPoint, ScreenSize};

use crate::surface::Stroke;

pub const DEFAULT_CLICK_DURATION: Duration = Duration::from_millis(100);

// Surfaces reject zero-length strokes.
const MIN_STROKE_DURATION: Duration = Duration::from_millis(1);

/// Single-point stroke starting immediately.
pub fn click_stroke(screen: ScreenSize, at: NormalizedPoint, duration: Duration) -> Stroke {
    Stroke {
        points: vec![screen.denormalize(at)],
        start_delay: Duration::ZERO,
        duration: duration.max(MIN_STROKE_DURATION),
    }
}

/// Two-point stroke from `from` to `to`.
pub fn swipe_stroke(
    screen: ScreenSize,
    from: NormalizedPoint,
    to: NormalizedPoint,
    duration: Duration,
) -> Stroke {
    Stroke {
        points: vec![screen.denormalize(from), screen.denormalize(to)],
        start_delay: Duration::ZERO,
        duration: duration.max(MIN_STROKE_DURATION),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_is_a_single_point_at_screen_center() {
        let stroke = click_stroke(
            ScreenSize::new(1081, 1921),
            NormalizedPoint::CENTER,
            DEFAULT_CLICK_DURATION,
        );
        assert!(stroke.is_tap());
        assert_eq!(stroke.points, vec![(540.0, 960.0)]);
        assert_eq!(stroke.start_delay, Duration::ZERO);
        assert_eq!(stroke.duration, Duration::from_millis(100));
    }

    #[test]
    fn swipe_has_two_points() {
        let stroke = swipe_stroke(
            ScreenSize::new(1001, 501),
            NormalizedPoint::new(0.2, 0.5),
            NormalizedPoint::new(0.8, 0.5),
            Duration::from_millis(500),
        );
        assert_eq!(stroke.points, vec![(200.0, 250.0), (800.0, 250.0)]);
        assert_eq!(stroke.duration, Duration::from_millis(500));
    }

    #[test]
    fn zero_duration_is_raised_to_minimum() {
        let stroke = swipe_stroke(
            ScreenSize::new(10, 10),
            NormalizedPoint::CENTER,
            NormalizedPoint::CENTER,
            Duration::ZERO,
        );
        assert_eq!(stroke.duration, MIN_STROKE_DURATION);
    }
}
