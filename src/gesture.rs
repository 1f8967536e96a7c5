//! Turns raw pointer contact on a pad into one semantic gesture.
//!
//! ```text
//!            press                     release (< long press)
//!   Idle ───────────▶ Pressed ───────────────────────────────▶ Idle + Tap
//!                       │  timer elapsed, no swipe yet
//!                       ├────────────────────────────▶ LongPress (no more swipes)
//!                       │  |dx| ≥ threshold, before the timer
//!                       └────────────────────────────▶ Swipe (timer cancelled,
//!                                                       origin re-anchored)
//! ```
//!
//! Long-press and swipe race; whichever fires first wins the contact and
//! shuts the other out. A swipe re-anchors the origin so a single drag can
//! cycle several times. Cancel (pointer left the pad, touch cancelled)
//! drops the contact without any gesture.
//!
//! There are no real timers in here. The owner calls [`GestureClassifier::poll`]
//! with the current time and the long-press fires once its deadline has
//! passed, which keeps the whole thing deterministic under a manual clock.

use std::time::Duration;

use crate::shared::{CycleDirection, PadId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gesture {
    Tap(PadId),
    LongPress(PadId),
    Swipe(PadId, CycleDirection),
}

/// Decides whether a horizontal displacement is a swipe, and which way.
pub trait SwipePolicy: Send {
    fn classify(&self, dx: f32) -> Option<CycleDirection>;
}

/// Dragging left by at least `threshold` pixels cycles forward, dragging
/// right cycles backward. Yes, that's backwards from what most people
/// expect; it's how the pads have always behaved.
#[derive(Clone, Copy, Debug)]
pub struct HorizontalThreshold {
    pub threshold: f32,
}

impl Default for HorizontalThreshold {
    fn default() -> Self {
        Self { threshold: 30.0 }
    }
}

impl SwipePolicy for HorizontalThreshold {
    fn classify(&self, dx: f32) -> Option<CycleDirection> {
        if dx <= -self.threshold {
            Some(CycleDirection::Forward)
        } else if dx >= self.threshold {
            Some(CycleDirection::Backward)
        } else {
            None
        }
    }
}

/// One pointer contact, press to release.
#[derive(Clone, Debug, PartialEq)]
pub struct GestureSession {
    pub pad: PadId,
    pub started_at: Duration,
    pub anchor_x: f32,
    pub long_press_deadline: Option<Duration>, // the pending timer, None once cancelled or fired
    pub swipe_resolved: bool,
    pub long_press_resolved: bool,
}

impl GestureSession {
    fn resolved(&self) -> bool {
        self.swipe_resolved || self.long_press_resolved
    }
}

pub struct GestureClassifier<P: SwipePolicy = HorizontalThreshold> {
    long_press: Duration,
    policy: P,
    session: Option<GestureSession>,
}

impl Default for GestureClassifier {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), HorizontalThreshold::default())
    }
}

impl<P: SwipePolicy> GestureClassifier<P> {
    pub fn new(long_press: Duration, policy: P) -> Self {
        Self {
            long_press,
            policy,
            session: None,
        }
    }

    pub fn session(&self) -> Option<&GestureSession> {
        self.session.as_ref()
    }

    pub fn is_pressed(&self) -> bool {
        self.session.is_some()
    }

    /// Start a contact. A contact still open from before is abandoned.
    pub fn press(&mut self, pad: PadId, x: f32, now: Duration) {
        if let Some(old) = self.session.take() {
            log::trace!("new press on {} abandons open contact on {}", pad, old.pad);
        }
        self.session = Some(GestureSession {
            pad,
            started_at: now,
            anchor_x: x,
            long_press_deadline: Some(now + self.long_press),
            swipe_resolved: false,
            long_press_resolved: false,
        });
    }

    /// Fire the long-press if its deadline has passed.
    pub fn poll(&mut self, now: Duration) -> Option<Gesture> {
        let session = self.session.as_mut()?;
        let deadline = session.long_press_deadline?;
        if now < deadline || session.resolved() {
            return None;
        }
        session.long_press_deadline = None;
        session.long_press_resolved = true;
        Some(Gesture::LongPress(session.pad))
    }

    pub fn move_to(&mut self, x: f32, now: Duration) -> Option<Gesture> {
        // the timer would have gone off before this move arrived
        if let Some(fired) = self.poll(now) {
            return Some(fired);
        }
        let session = self.session.as_mut()?;
        if session.long_press_resolved {
            return None;
        }
        let direction = self.policy.classify(x - session.anchor_x)?;
        session.swipe_resolved = true;
        session.long_press_deadline = None;
        session.anchor_x = x;
        Some(Gesture::Swipe(session.pad, direction))
    }

    pub fn release(&mut self, now: Duration) -> Option<Gesture> {
        let fired = self.poll(now);
        let session = self.session.take()?;
        if fired.is_some() {
            return fired;
        }
        if session.resolved() {
            None
        } else {
            Some(Gesture::Tap(session.pad))
        }
    }

    /// Abort the contact. Nothing fires, not even a tap.
    pub fn cancel(&mut self) {
        if let Some(session) = self.session.take() {
            log::trace!("contact on {} cancelled", session.pad);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    // drive a contact and collect everything it fires
    fn run(steps: &[(u64, Option<f32>)], release_at: Option<u64>) -> Vec<Gesture> {
        let mut g = GestureClassifier::default();
        let mut out = vec![];
        g.press(PadId(3), 100.0, ms(0));
        for &(t, x) in steps {
            out.extend(match x {
                Some(x) => g.move_to(x, ms(t)),
                None => g.poll(ms(t)),
            });
        }
        if let Some(t) = release_at {
            out.extend(g.release(ms(t)));
        }
        out
    }

    #[test]
    fn quick_release_is_a_tap() {
        assert_eq!(run(&[(50, None), (150, None)], Some(200)), vec![Gesture::Tap(PadId(3))]);
    }

    #[test]
    fn small_wobble_is_still_a_tap() {
        let got = run(&[(50, Some(110.0)), (90, Some(80.0))], Some(200));
        assert_eq!(got, vec![Gesture::Tap(PadId(3))]);
    }

    #[test]
    fn hold_is_exactly_one_long_press() {
        let got = run(&[(499, None), (500, None), (600, None), (700, Some(110.0))], Some(900));
        assert_eq!(got, vec![Gesture::LongPress(PadId(3))]);
    }

    #[test]
    fn long_press_fires_on_release_if_nobody_polled() {
        assert_eq!(run(&[], Some(650)), vec![Gesture::LongPress(PadId(3))]);
    }

    #[test]
    fn swipe_left_is_forward_and_kills_the_timer() {
        let got = run(&[(100, Some(60.0)), (600, None), (1200, None)], Some(1500));
        assert_eq!(got, vec![Gesture::Swipe(PadId(3), CycleDirection::Forward)]);
    }

    #[test]
    fn swipe_right_is_backward() {
        let got = run(&[(100, Some(135.0))], Some(200));
        assert_eq!(got, vec![Gesture::Swipe(PadId(3), CycleDirection::Backward)]);
    }

    #[test]
    fn one_drag_can_swipe_repeatedly() {
        // 100 -> 65 (swipe, anchor 65) -> 40 (25px, nothing) -> 30 (35px, swipe) -> 70 (40px right, swipe)
        let got = run(
            &[(50, Some(65.0)), (80, Some(40.0)), (120, Some(30.0)), (700, Some(70.0))],
            Some(800),
        );
        assert_eq!(
            got,
            vec![
                Gesture::Swipe(PadId(3), CycleDirection::Forward),
                Gesture::Swipe(PadId(3), CycleDirection::Forward),
                Gesture::Swipe(PadId(3), CycleDirection::Backward),
            ]
        );
    }

    #[test]
    fn move_after_deadline_loses_to_the_timer() {
        // poll was never called, but the timer was due before the move landed
        let got = run(&[(520, Some(20.0))], Some(600));
        assert_eq!(got, vec![Gesture::LongPress(PadId(3))]);
    }

    #[test]
    fn cancel_fires_nothing() {
        let mut g = GestureClassifier::default();
        g.press(PadId(1), 0.0, ms(0));
        g.cancel();
        assert!(!g.is_pressed());
        assert_eq!(g.poll(ms(1000)), None);
        assert_eq!(g.release(ms(1000)), None);
    }

    #[test]
    fn new_press_replaces_open_contact() {
        let mut g = GestureClassifier::default();
        g.press(PadId(1), 0.0, ms(0));
        g.press(PadId(2), 0.0, ms(300));
        assert_eq!(g.poll(ms(600)), None); // pad 1's timer is gone
        assert_eq!(g.poll(ms(800)), Some(Gesture::LongPress(PadId(2))));
    }

    #[test]
    fn custom_policy_and_duration() {
        struct Never;
        impl SwipePolicy for Never {
            fn classify(&self, _dx: f32) -> Option<CycleDirection> {
                None
            }
        }
        let mut g = GestureClassifier::new(ms(100), Never);
        g.press(PadId(0), 0.0, ms(0));
        assert_eq!(g.move_to(-500.0, ms(50)), None);
        assert_eq!(g.poll(ms(100)), Some(Gesture::LongPress(PadId(0))));
    }

    #[test]
    fn threshold_is_inclusive() {
        let p = HorizontalThreshold { threshold: 30.0 };
        assert_eq!(p.classify(-30.0), Some(CycleDirection::Forward));
        assert_eq!(p.classify(29.9), None);
        assert_eq!(p.classify(30.0), Some(CycleDirection::Backward));
    }
}
