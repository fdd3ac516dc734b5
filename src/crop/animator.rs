//! Timer-driven state machine that fades the crop overlay after inactivity
//! and animates the camera toward a framing of the crop rectangle.
//!
//! All timing is expressed as deadlines compared against a caller-supplied
//! `Instant`, so stopping is idempotent and a stale tick after teardown is a
//! no-op rather than a crash.

use std::time::{Duration, Instant};

use crate::geometry::Vec2;

/// Inactivity before the framing animation starts.
pub const IDLE_DELAY: Duration = Duration::from_secs(1);
/// Length of the camera interpolation.
pub const ANIM_DURATION: Duration = Duration::from_millis(300);
/// Device pixels of breathing room around the framed crop.
pub const FRAME_PADDING_PX: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub zoom: f32,
    pub pan: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    IdleArmed { deadline: Instant },
    Animating { started: Instant },
    Faded,
}

/// What a tick asks the host to do.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnimatorTick {
    /// Camera pose to apply this frame, if the animation is running.
    pub pose: Option<CameraPose>,
    /// Whether another frame should be scheduled.
    pub animating: bool,
    /// Set on the tick that completes the fade.
    pub faded_now: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CropAnimator {
    state: Option<State>,
    from: CameraPose,
    to: CameraPose,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: Vec2::ZERO,
        }
    }
}

impl CropAnimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the idle timer; also clears a fade or cancels a running
    /// animation. Called on entering crop mode and on every interaction.
    pub fn arm(&mut self, now: Instant) {
        self.state = Some(State::IdleArmed {
            deadline: now + IDLE_DELAY,
        });
    }

    /// Stops everything; subsequent ticks do nothing. Safe to call twice.
    pub fn cancel(&mut self) {
        self.state = None;
    }

    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    pub fn is_faded(&self) -> bool {
        matches!(self.state, Some(State::Faded))
    }

    pub fn is_animating(&self) -> bool {
        matches!(self.state, Some(State::Animating { .. }))
    }

    /// Advances the machine. `current` is the camera now; `target` the
    /// framing pose, sampled at the moment the animation starts.
    pub fn tick(&mut self, now: Instant, current: CameraPose, target: CameraPose) -> AnimatorTick {
        match self.state {
            None | Some(State::Faded) => AnimatorTick::default(),
            Some(State::IdleArmed { deadline }) => {
                if now < deadline {
                    return AnimatorTick::default();
                }
                self.from = current;
                self.to = target;
                self.state = Some(State::Animating { started: now });
                AnimatorTick {
                    pose: Some(self.from),
                    animating: true,
                    faded_now: false,
                }
            }
            Some(State::Animating { started }) => {
                let t = (now - started).as_secs_f32() / ANIM_DURATION.as_secs_f32();
                if t >= 1.0 {
                    self.state = Some(State::Faded);
                    return AnimatorTick {
                        pose: Some(self.to),
                        animating: false,
                        faded_now: true,
                    };
                }
                let e = ease_out_cubic(t);
                AnimatorTick {
                    pose: Some(CameraPose {
                        zoom: lerp(self.from.zoom, self.to.zoom, e),
                        pan: Vec2::new(
                            lerp(self.from.pan.x, self.to.pan.x, e),
                            lerp(self.from.pan.y, self.to.pan.y, e),
                        ),
                    }),
                    animating: true,
                    faded_now: false,
                }
            }
        }
    }
}

fn ease_out_cubic(t: f32) -> f32 {
    let u = 1.0 - t.clamp(0.0, 1.0);
    1.0 - u * u * u
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
