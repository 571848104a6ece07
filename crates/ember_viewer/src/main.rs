use anyhow::Result;
use ember_core::{FrameDriver, PostProcess, RenderBackend};
use ember_math::{OrbitCamera, Vec3};
use ember_renderer::{save_png, CpuTracer, DenoiseFilter, Scene};
use ember_viewport::{Display, UiState};
use std::time::Instant;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

mod options;

use options::Options;

/// Application state
struct App {
    options: Options,
    window: Option<std::sync::Arc<Window>>,
    display: Option<Display>,

    camera: OrbitCamera,
    tracer: CpuTracer,
    driver: FrameDriver,
    denoiser: Option<DenoiseFilter>,
    ui: UiState,

    // Input state
    left_mouse_pressed: bool,
    middle_mouse_pressed: bool,
    last_mouse_pos: Option<(f64, f64)>,
    keys_pressed: std::collections::HashSet<KeyCode>,
    last_frame_time: Instant,
}

impl App {
    fn new(options: Options) -> Self {
        let aspect = options.width as f32 / options.height as f32;
        let mut camera = OrbitCamera::new(Vec3::new(0.0, 0.5, 0.0), 6.0, aspect);
        camera.orbit(0.6, -0.35);

        let tracer = CpuTracer::new(Scene::demo(), options.width, options.height);
        let mut driver = FrameDriver::new(options.width, options.height, options.frames);
        driver.set_continuous_present(options.batch); // batch wants every sample counted, not shown late

        let denoiser = options.denoise.then(DenoiseFilter::new);

        let ui = UiState {
            frame_limit: options.frames,
            continuous: driver.continuous_present(),
            ..UiState::default()
        };

        Self {
            options,
            window: None,
            display: None,
            camera,
            tracer,
            driver,
            denoiser,
            ui,
            left_mouse_pressed: false,
            middle_mouse_pressed: false,
            last_mouse_pos: None,
            keys_pressed: std::collections::HashSet::new(),
            last_frame_time: Instant::now(),
        }
    }

    /// Save the accumulated image (through the filter stage, when enabled)
    /// as a PNG at the configured path.
    fn save_screenshot(&mut self) {
        let frame = self.tracer.framebuffer();
        let result = match &mut self.denoiser {
            Some(filter) => match filter.run(frame) {
                Ok(filtered) => save_png(filtered, &self.options.screenshot),
                Err(err) => {
                    log::error!("screenshot filter failed: {err}");
                    return;
                }
            },
            None => save_png(frame, &self.options.screenshot),
        };
        if let Err(err) = result {
            log::error!("screenshot failed: {err}");
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            let window_attrs = Window::default_attributes()
                .with_title("Ember Viewer")
                .with_inner_size(winit::dpi::PhysicalSize::new(
                    self.options.width,
                    self.options.height,
                ));

            let window = std::sync::Arc::new(
                event_loop
                    .create_window(window_attrs)
                    .expect("Failed to create window"),
            );

            // Initialize display (async in pollster block)
            let display = pollster::block_on(Display::new(window.clone()))
                .expect("Failed to initialize display");

            self.window = Some(window);
            self.display = Some(display);

            log::info!("Window and display initialized");
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        // Let egui handle the event first
        if let Some(display) = &mut self.display {
            if let Some(window) = &self.window {
                if display.handle_egui_event(window, &event) {
                    // Event was consumed by egui, don't process it further
                    return;
                }
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                let (width, height) = (physical_size.width, physical_size.height);
                if let Some(display) = &mut self.display {
                    display.resize((width, height));
                }
                // Degenerate sizes (minimized window) are rejected here and
                // accumulation simply continues at the old resolution.
                if self.driver.resize(width, height, &mut self.tracer) {
                    self.camera.set_aspect(width as f32 / height as f32);
                }
            }
            WindowEvent::MouseInput { button, state, .. } => match button {
                MouseButton::Left => {
                    self.left_mouse_pressed = state == ElementState::Pressed;
                    if !self.left_mouse_pressed {
                        self.last_mouse_pos = None;
                    }
                }
                MouseButton::Middle => {
                    self.middle_mouse_pressed = state == ElementState::Pressed;
                    if !self.middle_mouse_pressed {
                        self.last_mouse_pos = None;
                    }
                }
                _ => {}
            },
            WindowEvent::CursorMoved { position, .. } => {
                if self.left_mouse_pressed || self.middle_mouse_pressed {
                    if let Some(last_pos) = self.last_mouse_pos {
                        let delta_x = position.x - last_pos.0;
                        let delta_y = position.y - last_pos.1;

                        if self.left_mouse_pressed {
                            // Orbit camera with left mouse
                            let sensitivity = 0.005;
                            self.camera.orbit(
                                -delta_x as f32 * sensitivity,
                                -delta_y as f32 * sensitivity,
                            );
                        } else if self.middle_mouse_pressed {
                            // Pan camera with middle mouse (scaled with distance)
                            let sensitivity = 0.001;
                            self.camera.pan(
                                -delta_x as f32 * sensitivity,
                                delta_y as f32 * sensitivity,
                                0.0,
                                1.0, // delta_time = 1.0 for mouse pan (direct control)
                            );
                        }
                    }
                    self.last_mouse_pos = Some((position.x, position.y));
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                // Handle mouse wheel for dolly (zoom in/out)
                let scroll_amount = match delta {
                    winit::event::MouseScrollDelta::LineDelta(_, y) => y * 100.0,
                    winit::event::MouseScrollDelta::PixelDelta(pos) => pos.y as f32,
                };
                self.camera.dolly(-scroll_amount);
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key,
                        state,
                        ..
                    },
                ..
            } => {
                if let PhysicalKey::Code(keycode) = physical_key {
                    match state {
                        ElementState::Pressed => {
                            self.keys_pressed.insert(keycode);

                            // Handle single-press keys
                            match keycode {
                                KeyCode::KeyP => self.save_screenshot(),
                                KeyCode::Space => self.ui.show_ui = !self.ui.show_ui,
                                KeyCode::Escape => event_loop.exit(),
                                _ => {}
                            }
                        }
                        ElementState::Released => {
                            self.keys_pressed.remove(&keycode);
                        }
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                // Calculate delta time
                let now = Instant::now();
                let delta_time = (now - self.last_frame_time).as_secs_f32();
                self.last_frame_time = now;

                if let Some(display) = &mut self.display {
                    display.update_fps(delta_time);
                }

                // Handle keyboard movement
                {
                    let mut right = 0.0;
                    let mut up = 0.0;
                    let mut forward = 0.0;

                    if self.keys_pressed.contains(&KeyCode::KeyW) {
                        forward += 1.0;
                    }
                    if self.keys_pressed.contains(&KeyCode::KeyS) {
                        forward -= 1.0;
                    }
                    if self.keys_pressed.contains(&KeyCode::KeyA) {
                        right -= 1.0;
                    }
                    if self.keys_pressed.contains(&KeyCode::KeyD) {
                        right += 1.0;
                    }
                    if self.keys_pressed.contains(&KeyCode::KeyE) {
                        up += 1.0;
                    }
                    if self.keys_pressed.contains(&KeyCode::KeyQ) {
                        up -= 1.0;
                    }

                    if right != 0.0 || up != 0.0 || forward != 0.0 {
                        self.camera.pan(right, up, forward, delta_time);
                    }
                }

                let Some(display) = &mut self.display else {
                    return;
                };

                // One scheduler step: camera poll, at most one accumulation
                // iteration, throttled presentation.
                let post = self
                    .denoiser
                    .as_mut()
                    .map(|filter| filter as &mut dyn PostProcess);
                match self
                    .driver
                    .frame(self.camera.frustum(), &mut self.tracer, display, post)
                {
                    Ok(report) => {
                        if self.options.batch && report.completed {
                            log::info!("batch render complete at {} samples", report.iteration);
                            self.save_screenshot();
                            event_loop.exit();
                            return;
                        }
                    }
                    Err(err) => {
                        // Frame-local failure; the scheduler retries next frame.
                        log::error!("frame error: {err}");
                    }
                }

                // Mirror scheduler state into the overlay, draw, and apply
                // whatever the user changed.
                self.ui.iteration = self.driver.iteration();
                self.ui.elapsed = self.driver.elapsed();
                self.ui.fps = display.fps;

                if let Some(window) = &self.window {
                    match display.render(window, &mut self.ui) {
                        Ok(response) => {
                            if response.continuous_changed {
                                self.driver.set_continuous_present(self.ui.continuous);
                            }
                            if response.frame_limit_changed {
                                self.driver.set_frame_limit(self.ui.frame_limit);
                            }
                            if response.sky_changed {
                                self.tracer.scene_mut().sky = self.ui.sky;
                                self.driver.invalidate();
                            }
                            if response.screenshot_requested {
                                self.save_screenshot();
                            }
                        }
                        Err(e) => {
                            // Check if it's a surface error we can handle
                            if let Some(surface_err) = e.downcast_ref::<wgpu::SurfaceError>() {
                                match surface_err {
                                    wgpu::SurfaceError::Lost => {
                                        // Surface lost, reconfigure
                                        let size = display.size;
                                        display.resize(size);
                                    }
                                    wgpu::SurfaceError::OutOfMemory => {
                                        log::error!("Out of memory!");
                                        event_loop.exit();
                                    }
                                    _ => {
                                        log::error!("Surface error: {:?}", surface_err);
                                    }
                                }
                            } else {
                                log::error!("Render error: {:?}", e);
                            }
                        }
                    }
                }

                // Request next frame
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        // The accumulation advances every frame, so keep redrawing.
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let options = Options::parse(std::env::args().skip(1))?;
    log::info!("Starting Ember Viewer: {options:?}");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(options);

    event_loop.run_app(&mut app)?;

    Ok(())
}
