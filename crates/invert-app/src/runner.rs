//! Application runner and event loop.
//!
//! The event loop owns the window on the main thread. Rendering happens on a
//! dedicated thread that builds every GPU object itself; the two sides only
//! share the pending-resize slot and the shutdown handshake.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use crossbeam::channel::{self, Sender};
use invert_core::{load_obj, Extent, Mesh};
use invert_gpu::{GpuContextBuilder, SurfaceProvider};
use invert_platform::{create_event_loop, create_window, extent_from_size, WinitSurface};
use invert_render::{FrameScheduler, MeshRenderer, PendingResize, ShutdownSignal};
use tracing::{debug, error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow};
use winit::window::{Window, WindowId};

use crate::config::AppConfig;
use crate::logging::init_tracing;

/// How often the event loop checks whether the render thread has died.
const RENDER_THREAD_POLL: Duration = Duration::from_millis(100);

/// Run the renderer with the given configuration.
///
/// Initializes logging, opens the window, starts the render thread and runs
/// the event loop until the window is closed or rendering fails.
pub fn run_app(config: AppConfig) -> anyhow::Result<()> {
    init_tracing();
    info!("{} starting...", config.title);

    let event_loop = create_event_loop()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut runner = AppRunner {
        config,
        state: None,
        error: None,
    };
    event_loop.run_app(&mut runner)?;

    match runner.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

struct AppRunner {
    config: AppConfig,
    state: Option<AppState>,
    error: Option<anyhow::Error>,
}

struct AppState {
    window: Arc<Window>,
    resize: Arc<PendingResize>,
    shutdown: Arc<ShutdownSignal>,
    render_thread: Option<JoinHandle<anyhow::Result<u64>>>,
}

impl ApplicationHandler for AppRunner {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        match self.create_state(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Application ready");
            }
            Err(e) => {
                error!("Failed to initialize application: {e:#}");
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(state) = &self.state else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                self.stop();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if state.resize.notify(extent_from_size(size)) {
                    debug!(width = size.width, height = size.height, "Resize pending");
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let finished = self.state.as_ref().is_some_and(|state| {
            state
                .render_thread
                .as_ref()
                .map_or(true, JoinHandle::is_finished)
        });
        if finished {
            self.stop();
            event_loop.exit();
            return;
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + RENDER_THREAD_POLL));
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.stop();
    }
}

impl AppRunner {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState> {
        let window = create_window(event_loop, &self.config.platform())?;
        let surface = WinitSurface::new(Arc::clone(&window));

        let resize = Arc::new(PendingResize::new(surface.drawable_extent()));
        let shutdown = Arc::new(ShutdownSignal::new());
        let (ready_tx, ready_rx) = channel::bounded(1);

        let render_thread = {
            let config = self.config.clone();
            let resize = Arc::clone(&resize);
            let shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name("render".to_string())
                .spawn(move || render_main(&surface, &config, resize, shutdown, &ready_tx))?
        };

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(AppState {
                window,
                resize,
                shutdown,
                render_thread: Some(render_thread),
            }),
            Ok(Err(e)) => {
                let _ = render_thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = render_thread.join();
                Err(anyhow!("render thread exited during startup"))
            }
        }
    }

    /// Stop the render thread and release the window. Safe to call twice.
    fn stop(&mut self) {
        let Some(mut state) = self.state.take() else {
            return;
        };

        state.shutdown.request_stop_and_wait();
        if let Some(handle) = state.render_thread.take() {
            match handle.join() {
                Ok(Ok(frames)) => info!(frames, "Render thread finished"),
                Ok(Err(e)) => {
                    error!("Render thread failed: {e:#}");
                    self.error = Some(e);
                }
                Err(_) => {
                    error!("Render thread panicked");
                    self.error = Some(anyhow!("render thread panicked"));
                }
            }
        }
        debug!(window = ?state.window.id(), "Releasing window");
    }
}

/// Render thread entry point.
///
/// Reports startup success or failure on `ready` exactly once, and always
/// acknowledges `shutdown` before returning.
fn render_main(
    surface: &WinitSurface,
    config: &AppConfig,
    resize: Arc<PendingResize>,
    shutdown: Arc<ShutdownSignal>,
    ready: &Sender<anyhow::Result<()>>,
) -> anyhow::Result<u64> {
    let initial = resize.latest();
    let mut scheduler = match build_scheduler(surface, config, initial, resize, &shutdown) {
        Ok(scheduler) => {
            let _ = ready.send(Ok(()));
            scheduler
        }
        Err(e) => {
            let summary = format!("{e:#}");
            let _ = ready.send(Err(e));
            shutdown.acknowledge();
            return Err(anyhow!("renderer initialization failed: {summary}"));
        }
    };

    Ok(scheduler.run()?)
}

fn build_scheduler(
    surface: &WinitSurface,
    config: &AppConfig,
    drawable: Extent,
    resize: Arc<PendingResize>,
    shutdown: &Arc<ShutdownSignal>,
) -> anyhow::Result<FrameScheduler<MeshRenderer>> {
    let shader = config.shader()?;

    let mesh = match &config.mesh_path {
        Some(path) => {
            load_obj(path).with_context(|| format!("loading mesh {}", path.display()))?
        }
        None => Mesh::demo_cube(),
    };

    let gpu = GpuContextBuilder::new()
        .app_name(&config.title)
        .validation(config.validation)
        .build(surface)?;
    info!("GPU: {}", gpu.capabilities().summary());

    let renderer = MeshRenderer::new(Arc::new(gpu), &mesh, config.renderer(shader), drawable)?;
    Ok(FrameScheduler::new(renderer, resize, Arc::clone(shutdown)))
}
