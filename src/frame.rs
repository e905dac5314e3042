//! The per-frame update and render loop.
use std::time::Duration;

use tracing::{error, info};

use crate::{camera::Camera, context::SceneContext, platform::SystemTime, scene::Scene};

/// Source of the time since the scene started.
pub trait Clock {
    fn elapsed(&self) -> Duration;
}

/// Wall clock time measured from when the clock was created.
#[derive(Copy, Clone, Debug)]
pub struct SceneClock {
    start: SystemTime,
}

impl SceneClock {
    pub fn new() -> Self {
        Self {
            start: SystemTime::now(),
        }
    }
}

impl Default for SceneClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SceneClock {
    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Draws a scene as seen by a camera.
pub trait SceneRenderer {
    fn render(&mut self, scene: &Scene, camera: &Camera);
}

/// The platform side of the loop, which decides when the next frame runs.
pub trait FrameHost {
    fn request_next_frame(&self);
}

impl FrameHost for winit::window::Window {
    fn request_next_frame(&self) {
        self.request_redraw();
    }
}

/// Everything one tick of the frame loop touches.
pub struct FrameState<'a> {
    pub clock: &'a dyn Clock,
    pub context: &'a mut SceneContext,
    pub renderer: &'a mut dyn SceneRenderer,
    pub host: &'a dyn FrameHost,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    /// No frame has run yet.
    Idle,
    Running { frames: u64 },
}

/// Drives the scene forward one frame at a time. Once started it keeps
/// requesting frames for as long as the host delivers them.
#[derive(Debug)]
pub struct FrameScheduler {
    state: SchedulerState,
    last_elapsed: Duration,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self {
            state: SchedulerState::Idle,
            last_elapsed: Duration::ZERO,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Run one frame: read the clock, move the ghosts, let the controls move
    /// the camera, render and then ask the host for another frame.
    pub fn tick(&mut self, frame: FrameState<'_>) {
        let elapsed = frame.clock.elapsed();
        let delta = elapsed.saturating_sub(self.last_elapsed);
        self.last_elapsed = elapsed;

        self.state = match self.state {
            SchedulerState::Idle => {
                info!("starting frame loop");
                SchedulerState::Running { frames: 1 }
            }
            SchedulerState::Running { frames } => SchedulerState::Running { frames: frames + 1 },
        };

        let context = frame.context;

        if let Err(e) = context
            .ghosts
            .update(&mut context.scene, elapsed.as_secs_f64())
        {
            error!("failed to move ghost lights: {e}");
        }

        context.controls.update_camera(&mut context.camera, delta);
        frame.renderer.render(&context.scene, &context.camera);
        frame.host.request_next_frame();
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use glam::{Vec2, Vec3};
    use winit::event::WindowEvent;

    use super::*;
    use crate::{
        context::tests::test_context, controls::CameraController, ghosts::GhostOrbit,
        viewport::Viewport,
    };

    type Log = Rc<RefCell<Vec<String>>>;

    struct FakeClock {
        now: Duration,
        log: Log,
    }

    impl Clock for FakeClock {
        fn elapsed(&self) -> Duration {
            self.log.borrow_mut().push("clock".into());
            self.now
        }
    }

    struct RecordingControls {
        log: Log,
    }

    impl CameraController for RecordingControls {
        fn process_input(&mut self, _event: &WindowEvent) -> bool {
            false
        }

        fn process_mouse_motion(&mut self, _delta: Vec2) {}

        fn process_mouse_wheel(&mut self, _delta: Vec2) {}

        fn update_camera(&mut self, _camera: &mut Camera, delta: Duration) {
            self.log
                .borrow_mut()
                .push(format!("controls {}", delta.as_millis()));
        }
    }

    struct FakeRenderer {
        log: Log,
        ghost_positions: Vec<Vec3>,
    }

    impl SceneRenderer for FakeRenderer {
        fn render(&mut self, scene: &Scene, _camera: &Camera) {
            self.log.borrow_mut().push("render".into());

            self.ghost_positions.clear();
            scene.traverse(|_, node, world| {
                if node.name.starts_with("ghost") {
                    self.ghost_positions.push(world.transform_point3(Vec3::ZERO));
                }
            });
        }
    }

    struct FakeHost {
        log: Log,
    }

    impl FrameHost for FakeHost {
        fn request_next_frame(&self) {
            self.log.borrow_mut().push("request".into());
        }
    }

    struct Harness {
        log: Log,
        context: SceneContext,
        renderer: FakeRenderer,
        host: FakeHost,
        scheduler: FrameScheduler,
    }

    impl Harness {
        fn new() -> Self {
            let log = Log::default();
            let mut context = test_context(Viewport::new(800, 600, 1.0));
            context.controls = Box::new(RecordingControls { log: log.clone() });

            Self {
                context,
                renderer: FakeRenderer {
                    log: log.clone(),
                    ghost_positions: Vec::new(),
                },
                host: FakeHost { log: log.clone() },
                scheduler: FrameScheduler::new(),
                log,
            }
        }

        fn tick_at(&mut self, now: Duration) {
            let clock = FakeClock {
                now,
                log: self.log.clone(),
            };

            self.scheduler.tick(FrameState {
                clock: &clock,
                context: &mut self.context,
                renderer: &mut self.renderer,
                host: &self.host,
            });
        }
    }

    #[test]
    fn first_tick_starts_the_loop() {
        let mut harness = Harness::new();
        assert_eq!(SchedulerState::Idle, harness.scheduler.state());

        harness.tick_at(Duration::ZERO);
        assert_eq!(SchedulerState::Running { frames: 1 }, harness.scheduler.state());

        harness.tick_at(Duration::from_millis(16));
        harness.tick_at(Duration::from_millis(32));
        assert_eq!(SchedulerState::Running { frames: 3 }, harness.scheduler.state());
    }

    #[test]
    fn each_tick_runs_steps_in_order() {
        let mut harness = Harness::new();

        harness.tick_at(Duration::from_millis(100));
        harness.tick_at(Duration::from_millis(116));

        assert_eq!(
            vec![
                "clock",
                "controls 100",
                "render",
                "request",
                "clock",
                "controls 16",
                "render",
                "request"
            ],
            *harness.log.borrow()
        );
    }

    #[test]
    fn ghosts_move_before_rendering() {
        let mut harness = Harness::new();
        let now = Duration::from_secs_f32(4.25);

        harness.tick_at(now);

        let expected: Vec<Vec3> = GhostOrbit::ALL
            .iter()
            .map(|orbit| orbit.position_at(now.as_secs_f64()))
            .collect();

        assert_eq!(expected.len(), harness.renderer.ghost_positions.len());
        for (expected, seen) in expected.iter().zip(&harness.renderer.ghost_positions) {
            assert!((*expected - *seen).length() < 1e-5);
        }
    }

    #[test]
    fn clock_going_backwards_gives_zero_delta() {
        let mut harness = Harness::new();

        harness.tick_at(Duration::from_millis(500));
        harness.tick_at(Duration::from_millis(400));

        assert!(harness
            .log
            .borrow()
            .contains(&"controls 0".to_string()));
    }
}
