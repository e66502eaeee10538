//! Pure step/percentage conversions shared by every blind variant.
//!
//! There is no position feedback from the hardware, so these values are the
//! only position model the hub has: a discrete tilt step count plus a coarse
//! lift bucket (closed / stopped somewhere / fully open).

/// Lift positions reported to callers.
pub const BLIND_POS_OPEN: u8 = 100;
/// Highest lift value that still counts as "down in the window".
pub const BLIND_POS_TILTED_MAX: u8 = 99;
pub const BLIND_POS_STOPPED: u8 = 50;
/// Closed but with the slats tilted away from flat.
pub const BLIND_POS_TILTED_MIN: u8 = 1;
pub const BLIND_POS_CLOSED: u8 = 0;

/// Tilt percentages reported to callers.
pub const TILT_POS_CLOSED_MAX: u8 = 100;
/// Slats at the mid/home resting angle.
pub const TILT_POS_OPEN: u8 = 50;
pub const TILT_POS_CLOSED_MIN: u8 = 0;

/// Converts a 0..=100 tilt percentage into a step index, clamped to
/// `0..=max_steps`. 50% maps exactly onto `mid_steps`.
pub fn steps_from_percent(percent: u8, mid_steps: u16, max_steps: u16) -> u16 {
    let steps = (f64::from(percent) / 50.0 * f64::from(mid_steps)).round() as u16;
    steps.min(max_steps)
}

/// Converts a step index back into a 0..=100 tilt percentage. The three
/// anchor steps (0, mid, max) map exactly; everything else rounds.
pub fn percent_from_steps(step: u16, mid_steps: u16) -> u8 {
    let max_steps = mid_steps * 2;
    if step == 0 {
        TILT_POS_CLOSED_MIN
    } else if step == mid_steps {
        TILT_POS_OPEN
    } else if step >= max_steps {
        TILT_POS_CLOSED_MAX
    } else {
        let percent = (f64::from(step) / f64::from(mid_steps) * 50.0).round() as u8;
        percent.min(100)
    }
}

/// Derives the lift percentage reported to callers from the stored lift
/// bucket and tilt step. A closed blind with tilted slats reports 1 rather
/// than 0 so callers can tell "dark" from "slats letting light through".
pub fn lift_percent_for(lift: u8, tilt_step: u16) -> u8 {
    match lift {
        BLIND_POS_CLOSED => {
            if tilt_step == 0 {
                BLIND_POS_CLOSED
            } else {
                BLIND_POS_TILTED_MIN
            }
        }
        BLIND_POS_OPEN => BLIND_POS_OPEN,
        _ => BLIND_POS_STOPPED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_from_percent_anchors() {
        assert_eq!(steps_from_percent(0, 2, 4), 0);
        assert_eq!(steps_from_percent(50, 2, 4), 2);
        assert_eq!(steps_from_percent(100, 2, 4), 4);
        assert_eq!(steps_from_percent(0, 6, 12), 0);
        assert_eq!(steps_from_percent(50, 6, 12), 6);
        assert_eq!(steps_from_percent(100, 6, 12), 12);
    }

    #[test]
    fn test_steps_from_percent_rounds() {
        // 25% of mid=2 is 1.0, 30% is 1.2 -> 1, 40% is 1.6 -> 2
        assert_eq!(steps_from_percent(25, 2, 4), 1);
        assert_eq!(steps_from_percent(30, 2, 4), 1);
        assert_eq!(steps_from_percent(40, 2, 4), 2);
    }

    #[test]
    fn test_steps_never_exceed_max() {
        for percent in 0..=100u8 {
            let steps = steps_from_percent(percent, 2, 4);
            assert!(steps <= 4, "percent {percent} gave steps {steps}");
        }
    }

    #[test]
    fn test_percent_from_steps_anchors() {
        assert_eq!(percent_from_steps(0, 2), 0);
        assert_eq!(percent_from_steps(2, 2), 50);
        assert_eq!(percent_from_steps(4, 2), 100);
        // Past-the-end steps clamp to fully tilted.
        assert_eq!(percent_from_steps(9, 2), 100);
    }

    #[test]
    fn test_percent_from_steps_in_range() {
        for step in 0..=12u16 {
            let percent = percent_from_steps(step, 6);
            assert!(percent <= 100, "step {step} gave percent {percent}");
        }
    }

    #[test]
    fn test_round_trip_within_one_percent_of_a_step() {
        // Step resolution for mid=6 is 50/6 ~ 8.3%; a percent -> steps ->
        // percent round trip must land within half a step of the request,
        // and exactly on the anchors.
        for percent in 0..=100u8 {
            let steps = steps_from_percent(percent, 6, 12);
            let back = percent_from_steps(steps, 6);
            let diff = (i16::from(back) - i16::from(percent)).abs();
            assert!(diff <= 5, "percent {percent} -> {steps} -> {back}");
        }
        for anchor in [0u8, 50, 100] {
            let steps = steps_from_percent(anchor, 6, 12);
            assert_eq!(percent_from_steps(steps, 6), anchor);
        }
    }

    #[test]
    fn test_lift_percent() {
        assert_eq!(lift_percent_for(BLIND_POS_CLOSED, 0), BLIND_POS_CLOSED);
        assert_eq!(lift_percent_for(BLIND_POS_CLOSED, 2), BLIND_POS_TILTED_MIN);
        assert_eq!(lift_percent_for(BLIND_POS_OPEN, 0), BLIND_POS_OPEN);
        assert_eq!(lift_percent_for(BLIND_POS_STOPPED, 0), BLIND_POS_STOPPED);
        assert_eq!(lift_percent_for(BLIND_POS_STOPPED, 3), BLIND_POS_STOPPED);
    }
}
