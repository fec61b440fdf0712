use std::sync::Arc;
use std::time::Instant;

use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{CursorIcon, Window, WindowId};

use deskchat::config::{self, SceneConfig};
use deskchat::conversation::{ConversationLoader, ConversationSource, TopicDirectory};
use deskchat::font::FontRenderer;
use deskchat::geometry::{Point, Size};
use deskchat::loading;
use deskchat::panel::PanelRenderer;
use deskchat::render;
use deskchat::scene::OfficeScene;
use deskchat::text::{self, CosmicMeasure, MonospaceMeasure, TextMeasure};
use deskchat::ui::Theme;

const CONFIG_PATH: &str = "data/config.ron";

/// Clear colours are specified in sRGB but the surface expects linear.
fn srgb_to_linear(s: f64) -> f64 {
    if s <= 0.04045 {
        s / 12.92
    } else {
        ((s + 0.055) / 1.055).powf(2.4)
    }
}

struct GpuState {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    window: Arc<Window>,
}

impl GpuState {
    fn new(window: Arc<Window>) -> Option<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = match instance.create_surface(window.clone()) {
            Ok(s) => s,
            Err(e) => {
                log::error!("failed to create surface: {e}");
                return None;
            }
        };

        let Some(adapter) =
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            }))
        else {
            log::error!("failed to find a suitable GPU adapter");
            return None;
        };

        let (device, queue) = match pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("deskchat_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            },
            None,
        )) {
            Ok(pair) => pair,
            Err(e) => {
                log::error!("failed to create GPU device: {e}");
                return None;
            }
        };

        let surface_caps = surface.get_capabilities(&adapter);
        let Some(surface_format) = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
        else {
            log::error!("surface reports no texture formats");
            return None;
        };
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Some(Self {
            surface,
            device,
            queue,
            config,
            window,
        })
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    fn render(
        &self,
        clear: [f32; 4],
        panel: &PanelRenderer,
        panel_vertex_count: u32,
        font: Option<&FontRenderer>,
        text_vertex_count: u32,
    ) {
        let output = match self.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost) => {
                self.surface.configure(&self.device, &self.config);
                return;
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("out of GPU memory");
                return;
            }
            Err(e) => {
                log::warn!("surface error: {e:?}");
                return;
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("render_encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: srgb_to_linear(clear[0] as f64),
                            g: srgb_to_linear(clear[1] as f64),
                            b: srgb_to_linear(clear[2] as f64),
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            panel.render(&mut render_pass, panel_vertex_count);
            if let Some(font) = font {
                font.render(&mut render_pass, text_vertex_count);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
    }
}

struct App {
    gpu: Option<GpuState>,
    font: Option<FontRenderer>,
    panel: Option<PanelRenderer>,
    /// Kept for rebuilding the glyph pipeline; `None` draws no text.
    font_bytes: Option<Vec<u8>>,
    scene: OfficeScene,
    loader: ConversationLoader,
    topics: Vec<String>,
    theme: Theme,
    cursor: Point,
}

impl App {
    fn request_topic(&mut self, topic: &str) {
        log::info!("requesting topic '{}'", topic);
        self.loader.request(topic);
        self.scene.begin_loading(topic);
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, key: KeyCode) {
        let digit = match key {
            KeyCode::Digit1 => Some(0),
            KeyCode::Digit2 => Some(1),
            KeyCode::Digit3 => Some(2),
            KeyCode::Digit4 => Some(3),
            KeyCode::Digit5 => Some(4),
            KeyCode::Digit6 => Some(5),
            KeyCode::Digit7 => Some(6),
            KeyCode::Digit8 => Some(7),
            KeyCode::Digit9 => Some(8),
            _ => None,
        };
        if let Some(i) = digit {
            match self.topics.get(i).cloned() {
                Some(topic) => self.request_topic(&topic),
                None => log::debug!("no topic bound to key {}", i + 1),
            }
            return;
        }
        match key {
            KeyCode::Escape => event_loop.exit(),
            KeyCode::KeyR => {
                self.scene.reset_click_counts();
                log::info!("click counts reset");
            }
            KeyCode::KeyH => {
                let on = self.scene.toggle_hotspots();
                log::debug!("hotspot overlay {}", if on { "on" } else { "off" });
            }
            _ => {}
        }
    }

    fn redraw(&mut self) {
        let now = Instant::now();
        if let Some(fetched) = self.loader.poll() {
            self.scene.handle_fetch(fetched, now);
        }
        self.scene.update(now);

        let (Some(gpu), Some(panel)) = (self.gpu.as_ref(), self.panel.as_mut()) else {
            return;
        };
        let screen_w = gpu.config.width;
        let screen_h = gpu.config.height;
        let list = render::build_draw_list(&self.scene, now, &self.theme);

        panel.begin_frame(&gpu.queue, screen_w, screen_h);
        for cmd in &list.panels {
            panel.add_panel(cmd);
        }
        for cmd in &list.triangles {
            panel.add_triangle(cmd);
        }
        let panel_vertex_count = panel.flush(&gpu.queue, &gpu.device);

        let mut text_vertex_count = 0;
        if let Some(font) = self.font.as_mut() {
            font.begin_frame(&gpu.queue, screen_w, screen_h);
            for cmd in &list.texts {
                font.prepare(cmd);
            }
            text_vertex_count = font.flush(&gpu.queue, &gpu.device);
        }

        gpu.render(
            self.theme.letterbox,
            panel,
            panel_vertex_count,
            self.font.as_ref(),
            text_vertex_count,
        );
        gpu.window.request_redraw();
    }

    fn build_renderers(&mut self) {
        let Some(gpu) = self.gpu.as_ref() else {
            return;
        };
        self.panel = Some(PanelRenderer::new(&gpu.device, gpu.surface_format()));
        self.font = self.font_bytes.clone().and_then(|bytes| {
            FontRenderer::new(&gpu.device, &gpu.queue, gpu.surface_format(), bytes)
                .map_err(|e| log::warn!("text rendering disabled: {e}"))
                .ok()
        });
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }

        let window_cfg = &self.scene.config().window;
        let attrs = Window::default_attributes()
            .with_title(window_cfg.title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(
                window_cfg.width as f64,
                window_cfg.height as f64,
            ));

        let window = match event_loop.create_window(attrs) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };
        let Some(gpu) = GpuState::new(window.clone()) else {
            event_loop.exit();
            return;
        };

        let size = window.inner_size();
        self.scene
            .resize(Size::new(size.width as f32, size.height as f32));
        self.gpu = Some(gpu);
        self.build_renderers();
        window.request_redraw();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Point::new(position.x as f32, position.y as f32);
                let hovered = self.scene.pointer_moved(self.cursor);
                if let Some(gpu) = self.gpu.as_ref() {
                    gpu.window.set_cursor(if hovered.is_some() {
                        CursorIcon::Pointer
                    } else {
                        CursorIcon::Default
                    });
                }
            }
            WindowEvent::CursorLeft { .. } => {
                self.scene.pointer_moved(Point::new(-1.0, -1.0));
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                if let Some(npc) = self.scene.pointer_down(self.cursor, Instant::now()) {
                    log::debug!("clicked '{}'", npc);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                if let PhysicalKey::Code(key) = event.physical_key {
                    self.handle_key(event_loop, key);
                }
            }
            WindowEvent::Resized(new_size) => {
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.resize(new_size);
                }
                self.scene
                    .resize(Size::new(new_size.width as f32, new_size.height as f32));
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                self.build_renderers();
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.scene.teardown();
    }
}

/// `--topic <name>` from the command line.
fn topic_arg(args: impl IntoIterator<Item = String>) -> Option<String> {
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--topic" {
            return args.next();
        }
        if let Some(topic) = arg.strip_prefix("--topic=") {
            return Some(topic.to_string());
        }
    }
    None
}

/// Real-font measurement when a font is available, otherwise a monospace
/// approximation so layout still works.
fn build_measurer(config: &SceneConfig) -> (Box<dyn TextMeasure>, Option<Vec<u8>>) {
    let style = &config.bubble;
    match text::load_font_bytes(config.font_path.as_deref()) {
        Ok((path, bytes)) => {
            log::info!("using font {}", path.display());
            let measurer = CosmicMeasure::new(bytes.clone(), style.font_size, style.line_height);
            (Box::new(measurer), Some(bytes))
        }
        Err(e) => {
            log::warn!("{e}; measuring text as monospace and drawing no text");
            let measurer = MonospaceMeasure::new(style.font_size * 0.6, style.line_height);
            (Box::new(measurer), None)
        }
    }
}

fn main() {
    env_logger::init();

    let config = config::load_config(CONFIG_PATH);
    let layout = loading::load_scene_layout(&config.scene_path);
    let source = Arc::new(TopicDirectory::new(&config.topics_dir));
    let topics = source.list_topics();
    log::info!(
        "{} characters, {} placements, {} topics",
        layout.characters.len(),
        layout.placements.len(),
        topics.len()
    );

    let (measurer, font_bytes) = build_measurer(&config);
    let viewport = Size::new(config.window.width, config.window.height);
    let scene = OfficeScene::new(config, layout, viewport, measurer);
    let loader = ConversationLoader::spawn(source);

    let event_loop = match EventLoop::new() {
        Ok(l) => l,
        Err(e) => {
            log::error!("failed to create event loop: {e}");
            return;
        }
    };

    let mut app = App {
        gpu: None,
        font: None,
        panel: None,
        font_bytes,
        scene,
        loader,
        topics,
        theme: Theme::default(),
        cursor: Point::new(-1.0, -1.0),
    };
    if let Some(topic) = topic_arg(std::env::args().skip(1)) {
        app.request_topic(&topic);
    }

    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("event loop failed: {e}");
    }
}
