//! Synthesized gestures used when a direct node action is refused.

use crate::node::Bounds;
use crate::source::{Gesture, GestureTicket, NodeSource, Stroke};
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;
use tracing::debug;

pub const TAP_DURATION: Duration = Duration::from_millis(120);
pub const LONG_PRESS_DURATION: Duration = Duration::from_millis(650);
pub const TAP_TIMEOUT: Duration = Duration::from_millis(1200);
pub const SWIPE_DURATION: Duration = Duration::from_millis(380);
pub const SWIPE_TIMEOUT: Duration = Duration::from_millis(2000);

/// Press at the center of `bounds`. `None` for rects too thin to aim at.
pub fn press(bounds: &Bounds, duration: Duration) -> Option<Gesture> {
    if !bounds.is_gesture_target() {
        return None;
    }
    let (x, y) = bounds.center();
    Some(Gesture {
        stroke: Stroke::Tap { x, y },
        duration,
    })
}

/// Vertical swipe through the middle half of `bounds`, away from the edges
/// where system bars intercept touches. Forward swipes upward.
pub fn vertical_swipe(bounds: &Bounds, forward: bool) -> Option<Gesture> {
    if !bounds.is_gesture_target() {
        return None;
    }
    let x = bounds.center().0;
    let h = bounds.height() as f32;
    let low = (bounds.top as f32 + h * 0.75) as i32;
    let high = (bounds.top as f32 + h * 0.25) as i32;
    let (from, to) = if forward {
        ((x, low), (x, high))
    } else {
        ((x, high), (x, low))
    };
    Some(Gesture {
        stroke: Stroke::Swipe { from, to },
        duration: SWIPE_DURATION,
    })
}

/// Wait for a dispatched gesture to finish. Timeouts, cancellation and a
/// dropped sender all read as failure.
pub fn await_ticket(ticket: GestureTicket, timeout: Duration) -> bool {
    match ticket.recv_timeout(timeout.max(Duration::from_millis(1))) {
        Ok(completed) => completed,
        Err(RecvTimeoutError::Timeout) => {
            debug!(?timeout, "gesture did not complete in time");
            false
        }
        Err(RecvTimeoutError::Disconnected) => {
            debug!("gesture dispatcher dropped completion");
            false
        }
    }
}

pub fn dispatch_blocking<S: NodeSource>(source: &S, gesture: Gesture, timeout: Duration) -> bool {
    debug!(?gesture, "dispatching gesture");
    await_ticket(source.dispatch_gesture(gesture), timeout)
}

/// Tap or long-press fallback for a click that the node refused.
pub fn click_fallback<S: NodeSource>(source: &S, bounds: &Bounds, duration: Duration) -> bool {
    match press(bounds, duration) {
        Some(g) => dispatch_blocking(source, g, TAP_TIMEOUT),
        None => false,
    }
}

pub fn scroll_fallback<S: NodeSource>(source: &S, bounds: &Bounds, forward: bool) -> bool {
    match vertical_swipe(bounds, forward) {
        Some(g) => dispatch_blocking(source, g, SWIPE_TIMEOUT),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Instant;

    #[test]
    fn test_press_at_center() {
        let g = press(&Bounds::new(0, 100, 200, 301), TAP_DURATION).unwrap();
        assert_eq!(g.stroke, Stroke::Tap { x: 100, y: 200 });
        assert_eq!(g.duration, TAP_DURATION);
        assert!(press(&Bounds::new(0, 0, 1, 100), TAP_DURATION).is_none());
        assert!(press(&Bounds::new(0, 0, 100, 1), TAP_DURATION).is_none());
    }

    #[test]
    fn test_swipe_direction() {
        let b = Bounds::new(0, 0, 1000, 2000);
        let fwd = vertical_swipe(&b, true).unwrap();
        assert_eq!(fwd.stroke, Stroke::Swipe { from: (500, 1500), to: (500, 500) });
        let back = vertical_swipe(&b, false).unwrap();
        assert_eq!(back.stroke, Stroke::Swipe { from: (500, 500), to: (500, 1500) });
        assert_eq!(back.duration, SWIPE_DURATION);
    }

    #[test]
    fn test_ticket_outcomes() {
        let (tx, rx) = mpsc::channel();
        tx.send(true).unwrap();
        assert!(await_ticket(rx, TAP_TIMEOUT));

        let (tx, rx) = mpsc::channel();
        tx.send(false).unwrap();
        assert!(!await_ticket(rx, TAP_TIMEOUT));

        let (tx, rx) = mpsc::channel::<bool>();
        drop(tx);
        assert!(!await_ticket(rx, TAP_TIMEOUT));
    }

    #[test]
    fn test_ticket_times_out() {
        let (_tx, rx) = mpsc::channel::<bool>();
        let start = Instant::now();
        assert!(!await_ticket(rx, Duration::from_millis(50)));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
