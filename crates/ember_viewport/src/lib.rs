//! wgpu display for the accumulated image.
//!
//! Owns the surface, a display texture the scheduler blits into (the
//! [`ember_core::Presenter`] capability), a fullscreen quad pipeline to
//! show it, and the egui overlay with the render controls.

use anyhow::Result;
use ember_core::{FrameBuffer, FrameError, Presenter};
use wgpu::{util::DeviceExt, Device, Instance, Queue, Surface, SurfaceConfiguration};

/// Fullscreen quad vertex.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 4],
}

impl Vertex {
    const ATTRIBS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x4];

    fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

const QUAD_VERTICES: &[Vertex] = &[
    Vertex {
        position: [1.0, 1.0, 0.0, 1.0],
    },
    Vertex {
        position: [-1.0, 1.0, 0.0, 1.0],
    },
    Vertex {
        position: [-1.0, -1.0, 0.0, 1.0],
    },
    Vertex {
        position: [1.0, -1.0, 0.0, 1.0],
    },
];
const QUAD_INDICES: &[u32] = &[0, 1, 2, 2, 3, 0];

/// Render controls mirrored into the egui overlay. The viewer owns this
/// and applies any edits to the frame driver after each `render` call.
#[derive(Debug, Clone)]
pub struct UiState {
    pub show_ui: bool,
    /// "Present" toggle: refresh the display every frame instead of
    /// roughly once per second.
    pub continuous: bool,
    /// Samples per view; 0 renders forever.
    pub frame_limit: u32,
    /// Scene parameter: sky gradient environment light.
    pub sky: bool,
    // Read-only stats
    pub iteration: u32,
    pub elapsed: f64,
    pub fps: f32,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            show_ui: true,
            continuous: false,
            frame_limit: 0,
            sky: true,
            iteration: 0,
            elapsed: 0.0,
            fps: 0.0,
        }
    }
}

/// What the user changed in the overlay this frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct UiResponse {
    pub continuous_changed: bool,
    pub frame_limit_changed: bool,
    pub sky_changed: bool,
    pub screenshot_requested: bool,
}

/// Core display managing wgpu state
pub struct Display {
    pub surface: Surface<'static>,
    pub device: Device,
    pub queue: Queue,
    pub config: SurfaceConfiguration,
    pub size: (u32, u32),
    pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
    image_bind_group_layout: wgpu::BindGroupLayout,
    image_texture: wgpu::Texture,
    image_bind_group: wgpu::BindGroup,
    image_size: (u32, u32),
    /// Whether anything has been blitted yet; the quad is skipped until then.
    has_image: bool,

    // egui state
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,

    // FPS counter
    frame_count: u32,
    fps_update_timer: f32,
    pub fps: f32,
}

impl Display {
    /// Create the display texture and its bind group for the given size.
    fn create_image_texture(
        device: &Device,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        size: (u32, u32),
    ) -> (wgpu::Texture, wgpu::BindGroup) {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Accumulation Display Texture"),
            size: wgpu::Extent3d {
                width: size.0.max(1),
                height: size.1.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Image Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });

        (texture, bind_group)
    }

    /// Create a new display for the given window
    pub async fn new(window: std::sync::Arc<winit::window::Window>) -> Result<Self> {
        let size = window.inner_size();

        let instance = Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("Failed to find suitable GPU adapter"))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Ember Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);

        let config = SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Blit Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/blit.wgsl").into()),
        });

        let image_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Image Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Blit Pipeline Layout"),
            bind_group_layouts: &[&image_bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Blit Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[Vertex::desc()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Vertex Buffer"),
            contents: bytemuck::cast_slice(QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Index Buffer"),
            contents: bytemuck::cast_slice(QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Image Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let image_size = (size.width.max(1), size.height.max(1));
        let (image_texture, image_bind_group) =
            Self::create_image_texture(&device, &image_bind_group_layout, &sampler, image_size);

        // Initialize egui
        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        let egui_renderer = egui_wgpu::Renderer::new(&device, config.format, None, 1, false);

        log::info!("display initialized at {}x{}", size.width, size.height);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size: (size.width.max(1), size.height.max(1)),
            pipeline,
            vertex_buffer,
            index_buffer,
            sampler,
            image_bind_group_layout,
            image_texture,
            image_bind_group,
            image_size,
            has_image: false,
            egui_ctx,
            egui_state,
            egui_renderer,
            frame_count: 0,
            fps_update_timer: 0.0,
            fps: 0.0,
        })
    }

    /// Handle window resize. Zero-area sizes are ignored; the display
    /// texture follows the framebuffer, not the surface, so only the
    /// surface is reconfigured here.
    pub fn resize(&mut self, new_size: (u32, u32)) {
        if new_size.0 > 0 && new_size.1 > 0 {
            self.size = new_size;
            self.config.width = new_size.0;
            self.config.height = new_size.1;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Handle egui window event - returns true if event was consumed by egui
    pub fn handle_egui_event(
        &mut self,
        window: &winit::window::Window,
        event: &winit::event::WindowEvent,
    ) -> bool {
        let response = self.egui_state.on_window_event(window, event);
        response.consumed
    }

    /// Update FPS counter (call each frame with delta_time)
    pub fn update_fps(&mut self, delta_time: f32) {
        self.frame_count += 1;
        self.fps_update_timer += delta_time;

        if self.fps_update_timer >= 0.5 {
            self.fps = self.frame_count as f32 / self.fps_update_timer;
            self.frame_count = 0;
            self.fps_update_timer = 0.0;
        }
    }

    /// Draw the accumulated image and the overlay, then present the swap
    /// chain. Returns what the user changed in the overlay.
    pub fn render(
        &mut self,
        window: &winit::window::Window,
        ui: &mut UiState,
    ) -> Result<UiResponse> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let raw_input = self.egui_state.take_egui_input(window);

        let before = ui.clone();
        let mut response = UiResponse::default();
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            if !ui.show_ui {
                return;
            }

            egui::SidePanel::left("render_panel")
                .default_width(280.0)
                .show(ctx, |panel| {
                    panel.heading("Ember");
                    panel.separator();

                    panel.label(format!("FPS: {:.1}", ui.fps));
                    panel.label(format!("Samples: {}", ui.iteration));
                    panel.label(format!("Elapsed: {:.2}s", ui.elapsed));
                    panel.separator();

                    panel.checkbox(&mut ui.continuous, "Present")
                        .on_hover_text("Update the display every frame instead of once per second");
                    panel.horizontal(|row| {
                        row.label("Frames");
                        row.add(
                            egui::DragValue::new(&mut ui.frame_limit)
                                .range(0..=10000)
                                .speed(1),
                        )
                        .on_hover_text("Samples per view, 0 = render forever");
                    });
                    panel.separator();

                    panel.checkbox(&mut ui.sky, "Sky light");
                    panel.separator();

                    if panel.button("Screenshot").clicked() {
                        response.screenshot_requested = true;
                    }

                    panel.separator();
                    panel.collapsing("Controls", |help| {
                        help.label("Left Mouse: orbit");
                        help.label("Middle Mouse: pan");
                        help.label("Scroll Wheel: dolly");
                        help.label("W/A/S/D, Q/E: move");
                        help.label("P: screenshot, Space: toggle UI");
                    });
                });
        });

        response.continuous_changed = ui.continuous != before.continuous;
        response.frame_limit_changed = ui.frame_limit != before.frame_limit;
        response.sky_changed = ui.sky != before.sky;

        self.egui_state
            .handle_platform_output(window, full_output.platform_output);

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.size.0, self.size.1],
            pixels_per_point: window.scale_factor() as f32,
        };

        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Display Encoder"),
            });

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.device, &self.queue, *id, image_delta);
        }

        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            &paint_jobs,
            &screen_descriptor,
        );

        // Accumulated image pass
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Blit Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.02,
                            g: 0.02,
                            b: 0.03,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if self.has_image {
                render_pass.set_pipeline(&self.pipeline);
                render_pass.set_bind_group(0, &self.image_bind_group, &[]);
                render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
                render_pass
                    .set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..1);
            }
        }

        // egui on top
        {
            let mut egui_pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui Render Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                })
                .forget_lifetime(); // egui renderer wants 'static

            self.egui_renderer
                .render(&mut egui_pass, &paint_jobs, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(response)
    }
}

impl Presenter for Display {
    /// Upload the accumulated image to the display texture. The texture is
    /// recreated lazily whenever the framebuffer size changed.
    fn present(&mut self, frame: &FrameBuffer) -> Result<(), FrameError> {
        let size = (frame.width(), frame.height());
        if size.0 == 0 || size.1 == 0 {
            return Err(FrameError::Present("zero-sized framebuffer".into()));
        }

        if size != self.image_size {
            let (texture, bind_group) = Self::create_image_texture(
                &self.device,
                &self.image_bind_group_layout,
                &self.sampler,
                size,
            );
            self.image_texture = texture;
            self.image_bind_group = bind_group;
            self.image_size = size;
        }

        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.image_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &frame.to_rgba8(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * size.0),
                rows_per_image: Some(size.1),
            },
            wgpu::Extent3d {
                width: size.0,
                height: size.1,
                depth_or_array_layers: 1,
            },
        );
        self.has_image = true;
        Ok(())
    }
}
