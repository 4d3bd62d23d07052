// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ember_core::config::{EngineConfig, JobConfig, LoopConfig, RenderConfig};
use ember_core::event::RenderEvent;
use ember_core::platform::KeyCode;
use ember_core::renderer::{ProgramDescriptor, ProgramHandle, ProgramSource};
use ember_core::ManualClock;
use ember_infra::InputChange;
use ember_sdk::{Engine, System, SystemContext};

// --- TEST HARNESS ---

fn test_config() -> EngineConfig {
    EngineConfig {
        jobs: JobConfig {
            worker_count: Some(2),
            max_jobs_per_queue: 1024,
            arena_bytes: 1024 * 1024,
        },
        render: RenderConfig {
            max_draws_per_frame: 256,
            uniform_arena_bytes: 16 * 1024,
            command_stream_bytes: 64 * 1024,
            ..RenderConfig::default()
        },
        frame_loop: LoopConfig {
            fixed_step_ms: 10.0,
            max_fixed_steps_per_frame: None,
            telemetry_interval_frames: 0,
        },
    }
}

type Trace = Rc<RefCell<Vec<String>>>;

struct Tracer {
    name: &'static str,
    trace: Trace,
}

impl Tracer {
    fn push(&self, callback: &str) {
        self.trace.borrow_mut().push(format!("{}.{callback}", self.name));
    }
}

impl System for Tracer {
    fn name(&self) -> &str {
        self.name
    }

    fn initialize(&mut self, _ctx: &mut SystemContext<'_>) {
        self.push("initialize");
    }

    fn fixed_update(&mut self, _ctx: &mut SystemContext<'_>) {
        self.push("fixed_update");
    }

    fn update(&mut self, _ctx: &mut SystemContext<'_>, _dt: Duration) {
        self.push("update");
    }

    fn late_update(&mut self, _ctx: &mut SystemContext<'_>) {
        self.push("late_update");
    }
}

// --- SCENARIOS ---

#[test]
fn test_hundred_frames_hand_over_without_deadlock() {
    // --- 1. ARRANGE ---
    let (mut engine, _input) = Engine::headless(test_config()).expect("headless engine starts");

    // --- 2. ACT ---
    for _ in 0..100 {
        assert!(engine.step().expect("frame completes"));
    }

    // --- 3. ASSERT ---
    let channel = Arc::clone(engine.frontend().channel());
    assert_eq!(engine.frame_number(), 100);
    assert_eq!(channel.frames_submitted(), 100);
    assert_eq!(channel.frames_rendered(), 100);
}

#[test]
fn test_systems_run_in_registration_order() {
    // --- 1. ARRANGE ---
    let (mut engine, _input) = Engine::headless(test_config()).expect("headless engine starts");
    let clock = ManualClock::new();
    engine.set_clock(Box::new(clock.clone()));
    let trace = Trace::default();
    engine
        .add_system(Tracer {
            name: "physics",
            trace: Rc::clone(&trace),
        })
        .add_system(Tracer {
            name: "camera",
            trace: Rc::clone(&trace),
        });

    // --- 2. ACT ---
    clock.advance(Duration::from_millis(25));
    engine.step().expect("frame completes");

    // --- 3. ASSERT ---
    assert_eq!(
        *trace.borrow(),
        [
            "physics.initialize",
            "camera.initialize",
            "physics.fixed_update",
            "camera.fixed_update",
            "physics.fixed_update",
            "camera.fixed_update",
            "physics.update",
            "camera.update",
            "physics.late_update",
            "camera.late_update",
        ]
    );
}

#[test]
fn test_fixed_updates_track_elapsed_time() {
    // --- 1. ARRANGE ---
    struct CountSteps(Rc<RefCell<u32>>);
    impl System for CountSteps {
        fn fixed_update(&mut self, ctx: &mut SystemContext<'_>) {
            *self.0.borrow_mut() += 1;
            assert_eq!(ctx.time().simulated, ctx.time().fixed_step * *self.0.borrow());
        }
    }

    let (mut engine, _input) = Engine::headless(test_config()).expect("headless engine starts");
    let clock = ManualClock::new();
    engine.set_clock(Box::new(clock.clone()));
    let steps = Rc::new(RefCell::new(0));
    engine.add_system(CountSteps(Rc::clone(&steps)));
    let step = Duration::from_millis(10);

    // --- 2. ACT & ASSERT ---
    let mut elapsed = Duration::ZERO;
    for micros in [3_000, 17_500, 9_999, 1, 40_000, 0, 12_345] {
        let dt = Duration::from_micros(micros);
        clock.advance(dt);
        elapsed += dt;
        engine.step().expect("frame completes");

        let simulated = step * *steps.borrow();
        assert!(simulated <= elapsed, "simulation ran ahead of the clock");
        assert!(elapsed - simulated < step, "simulation fell a full step behind");
    }
}

#[test]
fn test_quit_from_a_system_stops_the_loop() {
    // --- 1. ARRANGE ---
    struct QuitAfter(u64);
    impl System for QuitAfter {
        fn late_update(&mut self, ctx: &mut SystemContext<'_>) {
            if ctx.time().frame + 1 >= self.0 {
                ctx.quit();
            }
        }
    }

    let (mut engine, _input) = Engine::headless(test_config()).expect("headless engine starts");
    engine.add_system(QuitAfter(5));

    // --- 2. ACT ---
    engine.run().expect("loop exits cleanly");

    // --- 3. ASSERT ---
    assert_eq!(engine.frame_number(), 5);
    assert!(engine.quit_requested());
}

#[test]
fn test_input_changes_reach_systems_and_resize_callbacks() {
    // --- 1. ARRANGE ---
    struct WatchKeys(Rc<RefCell<Vec<bool>>>);
    impl System for WatchKeys {
        fn update(&mut self, ctx: &mut SystemContext<'_>, _dt: Duration) {
            self.0.borrow_mut().push(ctx.input().is_key_down(KeyCode::Space));
        }
    }

    let (mut engine, input) = Engine::headless(test_config()).expect("headless engine starts");
    let resizes = Rc::new(RefCell::new(Vec::new()));
    let seen = Rc::clone(&resizes);
    engine.on_resize(move |width, height| seen.borrow_mut().push((width, height)));
    let keys = Rc::new(RefCell::new(Vec::new()));
    engine.add_system(WatchKeys(Rc::clone(&keys)));

    // --- 2. ACT ---
    input.send(InputChange::Key(KeyCode::Space, true));
    input.send(InputChange::Resized(800, 600));
    let first = engine.step().expect("frame completes");
    input.send(InputChange::Key(KeyCode::Space, false));
    input.send(InputChange::CloseRequested);
    let second = engine.step().expect("frame completes");

    // --- 3. ASSERT ---
    assert!(first);
    assert!(!second, "CloseRequested must end the loop");
    assert_eq!(*keys.borrow(), [true, false]);
    assert_eq!(*resizes.borrow(), [(800, 600)]);
    assert_eq!(engine.input().screen_size, (800, 600));
}

#[test]
fn test_shader_failures_are_visible_to_systems_next_frame() {
    // --- 1. ARRANGE ---
    struct BrokenShader {
        program: Option<ProgramHandle>,
        failures: Rc<RefCell<Vec<(u64, ProgramHandle)>>>,
    }
    impl System for BrokenShader {
        fn initialize(&mut self, ctx: &mut SystemContext<'_>) {
            self.program = Some(ctx.render().create_program(ProgramDescriptor {
                label: Some(Cow::Borrowed("broken")),
                source: ProgramSource::Graphics {
                    vertex: Cow::Borrowed("void main() {}"),
                    fragment: Cow::Borrowed("#error unterminated\nvoid main() {}"),
                },
            }));
        }

        fn update(&mut self, ctx: &mut SystemContext<'_>, _dt: Duration) {
            let frame = ctx.time().frame;
            for event in ctx.render_events() {
                if let RenderEvent::ShaderFailed { program, .. } = event {
                    self.failures.borrow_mut().push((frame, *program));
                }
            }
        }
    }

    let (mut engine, _input) = Engine::headless(test_config()).expect("headless engine starts");
    let failures = Rc::new(RefCell::new(Vec::new()));
    let system = BrokenShader {
        program: None,
        failures: Rc::clone(&failures),
    };
    engine.add_system(system);

    // --- 2. ACT ---
    for _ in 0..3 {
        engine.step().expect("frame completes");
    }

    // --- 3. ASSERT ---
    let failures = failures.borrow();
    assert_eq!(failures.len(), 1, "the failure is reported exactly once");
    assert_eq!(failures[0].0, 1, "the failure is seen on the frame after creation");
    assert_eq!(failures[0].1.index(), 0);
}

#[test]
fn test_backend_factory_errors_are_returned() {
    // --- 1. ARRANGE ---
    let (input, _feed) = ember_infra::HeadlessInput::new();

    // --- 2. ACT ---
    let result = Engine::new(
        test_config(),
        || anyhow::bail!("no GPU available"),
        Box::new(input),
    );

    // --- 3. ASSERT ---
    let error = result.expect_err("the engine must not start without a backend");
    let message = format!("{error:#}");
    assert!(message.contains("failed to create the graphics backend"), "{message}");
    assert!(message.contains("no GPU available"), "{message}");
}

#[test]
fn test_jobs_are_usable_from_systems() {
    // --- 1. ARRANGE ---
    struct SumJob(Arc<AtomicUsize>);
    impl System for SumJob {
        fn update(&mut self, ctx: &mut SystemContext<'_>, _dt: Duration) {
            let sum = Arc::clone(&self.0);
            let jobs = ctx.jobs();
            let root = jobs.parallel_for(1000, 16, move |i| {
                sum.fetch_add(i, Ordering::Relaxed);
            });
            jobs.run(root);
            jobs.wait(root);
        }
    }

    let (mut engine, _input) = Engine::headless(test_config()).expect("headless engine starts");
    let sum = Arc::new(AtomicUsize::new(0));
    engine.add_system(SumJob(Arc::clone(&sum)));

    // --- 2. ACT ---
    engine.step().expect("frame completes");
    engine.step().expect("frame completes");

    // --- 3. ASSERT ---
    assert_eq!(sum.load(Ordering::Relaxed), 2 * 499_500);
}
