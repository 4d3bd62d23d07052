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

//! The engine value: job system, render thread, input and the frame loop.

use crate::frame_loop::FrameLoop;
use crate::system::{FrameTime, System, SystemContext};
use crate::telemetry::Telemetry;
use anyhow::{bail, Context, Result};
use ember_core::config::EngineConfig;
use ember_core::event::{EventBus, RenderEvent};
use ember_core::platform::{InputEvent, InputSnapshot, InputSource};
use ember_core::renderer::GraphicsBackend;
use ember_core::{Clock, MonotonicClock, Stopwatch};
use ember_infra::{HeadlessBackend, HeadlessInput, InputFeed};
use ember_jobs::JobSystem;
use ember_lanes::render_lane::{FrameChannel, RenderFrontend, Renderer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type ResizeCallback = Box<dyn FnMut(u32, u32)>;

/// A running engine.
///
/// Creating one starts the worker threads and the render thread. The thread
/// that calls [`Engine::new`] becomes the game thread: it owns the systems and
/// must be the one calling [`run`](Self::run) or [`step`](Self::step).
/// Dropping the engine stops and joins both the render thread and the workers.
pub struct Engine {
    config: EngineConfig,
    jobs: JobSystem,
    frontend: RenderFrontend,
    running: Arc<AtomicBool>,
    render_thread: Option<JoinHandle<()>>,
    render_events: EventBus<RenderEvent>,
    pending_events: Vec<RenderEvent>,
    input_source: Box<dyn InputSource>,
    input: InputSnapshot,
    input_events: Vec<InputEvent>,
    systems: Vec<Box<dyn System>>,
    resize_callbacks: Vec<ResizeCallback>,
    frame_loop: FrameLoop,
    telemetry: Telemetry,
    frame: u64,
    initialized: bool,
    quit: bool,
}

impl Engine {
    /// Starts an engine.
    ///
    /// `backend` runs on the render thread, which is where graphics contexts
    /// have to be created. If it fails, the error is returned here.
    pub fn new<F>(config: EngineConfig, backend: F, input: Box<dyn InputSource>) -> Result<Self>
    where
        F: FnOnce() -> Result<Box<dyn GraphicsBackend>> + Send + 'static,
    {
        config.validate().context("invalid engine configuration")?;
        log::info!("Starting engine...");

        let jobs = JobSystem::new(&config.jobs).context("failed to start the job system")?;
        let channel = Arc::new(FrameChannel::new(&config.render));
        let render_events = EventBus::new();
        let running = Arc::new(AtomicBool::new(true));
        let render_thread = spawn_render_thread(
            backend,
            Arc::clone(&channel),
            &config,
            render_events.clone(),
            Arc::clone(&running),
        )?;

        let (width, height) = config.render.framebuffer_size;
        let frame_loop = FrameLoop::new(Box::new(MonotonicClock::new()), &config.frame_loop);
        let telemetry = Telemetry::new(config.frame_loop.telemetry_interval_frames);
        log::info!("Engine started.");

        Ok(Self {
            jobs,
            frontend: RenderFrontend::new(channel),
            running,
            render_thread: Some(render_thread),
            render_events,
            pending_events: Vec::new(),
            input_source: input,
            input: InputSnapshot::new(width, height),
            input_events: Vec::new(),
            systems: Vec::new(),
            resize_callbacks: Vec::new(),
            frame_loop,
            telemetry,
            frame: 0,
            initialized: false,
            quit: false,
            config,
        })
    }

    /// Starts an engine on [`HeadlessBackend`] and [`HeadlessInput`], returning
    /// the feed that drives its input.
    pub fn headless(config: EngineConfig) -> Result<(Self, InputFeed)> {
        let (input, feed) = HeadlessInput::new();
        let engine = Self::new(
            config,
            || Ok(Box::new(HeadlessBackend::new()) as Box<dyn GraphicsBackend>),
            Box::new(input),
        )?;
        Ok((engine, feed))
    }

    /// Replaces the time source of the frame loop, restarting its accumulator.
    pub fn set_clock(&mut self, clock: Box<dyn Clock>) {
        self.frame_loop = FrameLoop::new(clock, &self.config.frame_loop);
    }

    /// Registers a system. Systems run in registration order.
    ///
    /// A system added after the first frame is initialised immediately.
    pub fn add_system<S: System + 'static>(&mut self, system: S) -> &mut Self {
        log::debug!("Registered system '{}'", system.name());
        self.systems.push(Box::new(system));
        if self.initialized {
            let index = self.systems.len() - 1;
            let time = self.frame_time(self.frame_loop.simulated());
            self.dispatch_range(index.., time, |system, ctx| system.initialize(ctx));
        }
        self
    }

    /// Registers a callback invoked with the new size whenever the surface is
    /// resized.
    pub fn on_resize(&mut self, callback: impl FnMut(u32, u32) + 'static) -> &mut Self {
        self.resize_callbacks.push(Box::new(callback));
        self
    }

    /// The configuration the engine was started with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The job system.
    pub fn jobs(&self) -> &JobSystem {
        &self.jobs
    }

    /// The game-side renderer API.
    pub fn frontend(&mut self) -> &mut RenderFrontend {
        &mut self.frontend
    }

    /// Input as of the last poll.
    pub fn input(&self) -> &InputSnapshot {
        &self.input
    }

    /// Frames completed.
    pub fn frame_number(&self) -> u64 {
        self.frame
    }

    /// Returns `true` once a system or the input source asked to stop.
    pub fn quit_requested(&self) -> bool {
        self.quit
    }

    /// Runs frames until a quit is requested.
    pub fn run(&mut self) -> Result<()> {
        log::info!("Entering frame loop with {} systems", self.systems.len());
        while self.step()? {}
        log::info!("Frame loop exited after {} frames", self.frame);
        Ok(())
    }

    /// Runs one frame: input, fixed updates, update, late update, then the
    /// hand-over to the render thread.
    ///
    /// Returns `false` once a quit has been requested.
    pub fn step(&mut self) -> Result<bool> {
        if !self.initialized {
            self.initialized = true;
            let time = self.frame_time(self.frame_loop.simulated());
            self.dispatch_range(.., time, |system, ctx| system.initialize(ctx));
        }
        let stopwatch = Stopwatch::new();

        self.poll_input();
        self.pending_events = self.render_events.drain();
        for event in &self.pending_events {
            if let RenderEvent::FrameRendered(stats) = event {
                self.telemetry.record_render(stats);
            }
        }

        let before = self.frame_loop.simulated();
        let timing = self.frame_loop.advance();
        let step = self.frame_loop.fixed_step();
        for n in 1..=timing.fixed_steps {
            let time = self.frame_time(before + step * n);
            self.dispatch_range(.., time, |system, ctx| system.fixed_update(ctx));
        }
        let time = FrameTime {
            delta: timing.frame_dt,
            ..self.frame_time(self.frame_loop.simulated())
        };
        self.dispatch_range(.., time, |system, ctx| system.update(ctx, timing.frame_dt));
        self.dispatch_range(.., time, |system, ctx| system.late_update(ctx));

        self.jobs.clear_jobs();
        self.end_frame()?;
        self.frame += 1;
        self.telemetry.end_frame(stopwatch.elapsed(), self.jobs.stats());
        Ok(!self.quit)
    }

    /// Hands the recorded frame to the render thread and waits until it has
    /// been drawn.
    pub fn end_frame(&mut self) -> Result<()> {
        let render_thread = self.render_thread.as_ref();
        let acknowledged = self
            .frontend
            .end_frame_while(|| render_thread.is_some_and(|thread| !thread.is_finished()));
        if !acknowledged {
            bail!("the render thread stopped before acknowledging frame {}", self.frame + 1);
        }
        Ok(())
    }

    fn poll_input(&mut self) {
        let mut events = std::mem::take(&mut self.input_events);
        events.clear();
        self.input_source.poll(&mut self.input, &mut events);
        for event in events.drain(..) {
            match event {
                InputEvent::Resized { width, height } => {
                    log::debug!("Surface resized to {width}x{height}");
                    self.input.screen_size = (width, height);
                    self.frontend.resize(width, height);
                    for callback in &mut self.resize_callbacks {
                        callback(width, height);
                    }
                }
                InputEvent::CloseRequested => {
                    log::info!("Close requested, stopping after this frame");
                    self.quit = true;
                }
            }
        }
        self.input_events = events;
    }

    fn frame_time(&self, simulated: std::time::Duration) -> FrameTime {
        FrameTime {
            frame: self.frame,
            delta: std::time::Duration::ZERO,
            fixed_step: self.frame_loop.fixed_step(),
            simulated,
            alpha: self.frame_loop.alpha(),
        }
    }

    fn dispatch_range<R>(
        &mut self,
        range: R,
        time: FrameTime,
        mut callback: impl FnMut(&mut dyn System, &mut SystemContext<'_>),
    ) where
        R: std::slice::SliceIndex<[Box<dyn System>], Output = [Box<dyn System>]>,
    {
        let mut ctx = SystemContext {
            jobs: &self.jobs,
            render: &mut self.frontend,
            input: &self.input,
            render_events: &self.pending_events,
            time,
            quit: &mut self.quit,
        };
        for system in &mut self.systems[range] {
            callback(system.as_mut(), &mut ctx);
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        log::info!("Shutting down engine after {} frames...", self.frame);
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.render_thread.take() {
            if thread.join().is_err() {
                log::error!("The render thread panicked");
            }
        }
        log::info!("Engine shutdown complete.");
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("frame", &self.frame)
            .field("systems", &self.systems.len())
            .field("frame_loop", &self.frame_loop)
            .field("quit", &self.quit)
            .finish_non_exhaustive()
    }
}

fn spawn_render_thread<F>(
    backend: F,
    channel: Arc<FrameChannel>,
    config: &EngineConfig,
    events: EventBus<RenderEvent>,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>>
where
    F: FnOnce() -> Result<Box<dyn GraphicsBackend>> + Send + 'static,
{
    let (ready_tx, ready_rx) = flume::bounded::<Result<()>>(1);
    let render_config = config.render.clone();
    let thread = thread::Builder::new()
        .name("ember-render".into())
        .spawn(move || {
            let backend = match backend() {
                Ok(backend) => backend,
                Err(error) => {
                    let _ = ready_tx.send(Err(error));
                    return;
                }
            };
            let mut renderer = Renderer::new(backend, channel, &render_config, events);
            log::info!("Render thread started on the {} backend", renderer.backend_name());
            let _ = ready_tx.send(Ok(()));
            renderer.run(&running);
        })
        .context("failed to spawn the render thread")?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(thread),
        Ok(Err(error)) => {
            let _ = thread.join();
            Err(error.context("failed to create the graphics backend"))
        }
        Err(_) => {
            let _ = thread.join();
            bail!("the render thread exited during start-up")
        }
    }
}
