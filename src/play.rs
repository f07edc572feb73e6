#![cfg(feature = "play")]
use std::fs::File;
use std::io::{BufRead, BufReader, Seek};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use egui::{Align2, Color32, FontFamily, FontId, Pos2, Rect, Stroke};
use egui_wgpu::{Renderer as EguiRenderer, ScreenDescriptor};
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event as WinitEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopBuilder, EventLoopWindowTarget};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowBuilder};

use crate::config::ViewerConfig;
use crate::playback::PlaybackController;
use crate::source::{ready_gate, LiveInput, LiveReader, ReadySignal, RecordedSource};
use crate::strip::{Caption, StripGeometry, StripLayout};

const WINDOW_TITLE: &str = "KJunior Robot Linear Camera Analyzer";
const CONTROLS_HEIGHT: f32 = 110.0;
const CAPTION_HEIGHT: f32 = 110.0;
const BACKGROUND: Color32 = Color32::from_gray(238);

pub enum PlayInput {
    Recorded(PathBuf),
    Live(LiveInput),
}

#[derive(Debug, Clone, Copy)]
enum ViewerEvent {
    FrameReady,
}

#[derive(Debug, Clone, Copy)]
enum UiAction {
    TogglePlay,
    Reset,
    Step(i64),
    Seek(i64),
    GoTo,
    ToggleDelimiters,
}

/// Widget state that is not playback state.
struct UiState {
    show_delimiters: bool,
    goto_text: String,
}

struct GpuContext {
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl GpuContext {
    async fn for_surface(instance: &wgpu::Instance, surface: &wgpu::Surface<'_>) -> Result<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                force_fallback_adapter: false,
                compatible_surface: Some(surface),
            })
            .await
            .ok_or_else(|| anyhow!("no suitable GPU adapter found"))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("linecam-device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                },
                None,
            )
            .await
            .context("failed to request wgpu device")?;

        Ok(Self {
            adapter,
            device,
            queue,
        })
    }
}

pub fn run_play(input: PlayInput, config: &ViewerConfig) -> Result<()> {
    let event_loop = EventLoopBuilder::<ViewerEvent>::with_user_event()
        .build()
        .context("failed to create viewer event loop")?;

    match input {
        PlayInput::Recorded(path) => {
            let source = RecordedSource::open(&path)
                .with_context(|| format!("the file : {} could not be opened", path.display()))?;
            let playback =
                PlaybackController::recorded(source, config.interval(), config.start_paused)?;
            let title = format!("{WINDOW_TITLE} - {}", path.display());
            run_window(event_loop, playback, config, title, None)
        }
        PlayInput::Live(live) => {
            let proxy = event_loop.create_proxy();
            let (ready, wait) = ready_gate();
            let reader = LiveReader::spawn(&live, config.poll_interval(), wait, move || {
                let _ = proxy.send_event(ViewerEvent::FrameReady);
            })
            .with_context(|| format!("failed to start live reader on {}", live.describe()))?;
            let playback: PlaybackController<BufReader<File>> =
                PlaybackController::live(reader.feed);
            let title = format!("{WINDOW_TITLE} - live {}", live.describe());
            run_window(event_loop, playback, config, title, Some(ready))
        }
    }
}

fn run_window<R>(
    event_loop: EventLoop<ViewerEvent>,
    mut playback: PlaybackController<R>,
    config: &ViewerConfig,
    title: String,
    mut ready: Option<ReadySignal>,
) -> Result<()>
where
    R: BufRead + Seek + 'static,
{
    let geometry = config.geometry();
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(title)
            .with_inner_size(window_size(&geometry))
            .with_resizable(false)
            .build(&event_loop)
            .context("failed to create viewer window")?,
    );

    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let surface = instance
        .create_surface(window.clone())
        .context("failed to create wgpu surface")?;
    let gpu = pollster::block_on(GpuContext::for_surface(&instance, &surface))?;

    let caps = surface.get_capabilities(&gpu.adapter);
    let format = pick_surface_format(&caps.formats)?;
    let alpha_mode = caps
        .alpha_modes
        .first()
        .copied()
        .unwrap_or(wgpu::CompositeAlphaMode::Auto);
    let initial_size = window.inner_size();
    let mut surface_config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: initial_size.width.max(1),
        height: initial_size.height.max(1),
        present_mode: wgpu::PresentMode::Fifo,
        alpha_mode,
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(&gpu.device, &surface_config);

    let egui_ctx = egui::Context::default();
    egui_ctx.set_visuals(egui::Visuals::light());
    let mut egui_state = egui_winit::State::new(
        egui_ctx.clone(),
        egui::ViewportId::ROOT,
        &event_loop,
        None,
        None,
    );
    let mut egui_renderer = EguiRenderer::new(&gpu.device, surface_config.format, None, 1);

    let mut ui_state = UiState {
        show_delimiters: config.show_delimiters,
        goto_text: String::new(),
    };

    match playback.total_frames() {
        Some(total) => log::info!(
            "playing {} frame(s) every {}ms",
            total,
            playback.interval().as_millis()
        ),
        None => log::info!("waiting for live frames"),
    }
    log::info!("controls: Space play/pause, Left/Right step, R reset, D delimiters, Esc quit");
    window.request_redraw();

    event_loop
        .run(move |event, target| {
            target.set_control_flow(ControlFlow::Wait);

            match event {
                WinitEvent::WindowEvent { window_id, event } if window_id == window.id() => {
                    let egui_response = egui_state.on_window_event(&window, &event);
                    if egui_response.repaint {
                        window.request_redraw();
                    }
                    match event {
                        WindowEvent::CloseRequested => target.exit(),
                        WindowEvent::KeyboardInput { event, .. } => {
                            if event.state == ElementState::Pressed
                                && !event.repeat
                                && !egui_response.consumed
                            {
                                if let Some(action) =
                                    handle_keyboard_event(event.physical_key, target)
                                {
                                    apply_action(&mut playback, &mut ui_state, action);
                                }
                                window.request_redraw();
                            }
                        }
                        WindowEvent::RedrawRequested => {
                            let presented = render_frame(
                                &window,
                                &surface,
                                &gpu,
                                &mut surface_config,
                                &egui_ctx,
                                &mut egui_state,
                                &mut egui_renderer,
                                &mut playback,
                                &mut ui_state,
                                &geometry,
                            );
                            if presented {
                                if let Some(ready) = ready.take() {
                                    log::debug!("surface ready, releasing live reader");
                                    ready.signal();
                                }
                            }
                        }
                        WindowEvent::Resized(size) => {
                            if size.width > 0 && size.height > 0 {
                                surface_config.width = size.width;
                                surface_config.height = size.height;
                                surface.configure(&gpu.device, &surface_config);
                            }
                        }
                        _ => {}
                    }
                }
                WinitEvent::UserEvent(ViewerEvent::FrameReady) => {
                    if playback.drain_live() {
                        window.request_redraw();
                    }
                }
                WinitEvent::AboutToWait => {
                    if playback.is_live() && playback.drain_live() {
                        window.request_redraw();
                    }
                    if playback.poll_timer(Instant::now()) {
                        window.request_redraw();
                    }
                    if let Some(deadline) = playback.next_deadline() {
                        target.set_control_flow(ControlFlow::WaitUntil(deadline));
                    }
                }
                _ => {}
            }
        })
        .map_err(|error| anyhow!("viewer event loop terminated: {error}"))
}

fn render_frame<R: BufRead + Seek>(
    window: &Window,
    surface: &wgpu::Surface<'_>,
    gpu: &GpuContext,
    surface_config: &mut wgpu::SurfaceConfiguration,
    egui_ctx: &egui::Context,
    egui_state: &mut egui_winit::State,
    egui_renderer: &mut EguiRenderer,
    playback: &mut PlaybackController<R>,
    ui_state: &mut UiState,
    geometry: &StripGeometry,
) -> bool {
    if surface_config.width == 0 || surface_config.height == 0 {
        return false;
    }

    let frame = match surface.get_current_texture() {
        Ok(frame) => frame,
        Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
            surface.configure(&gpu.device, surface_config);
            window.request_redraw();
            return false;
        }
        Err(wgpu::SurfaceError::Timeout) => {
            return false;
        }
        Err(wgpu::SurfaceError::OutOfMemory) => {
            log::error!("surface out of memory");
            return false;
        }
    };

    let view = frame
        .texture
        .create_view(&wgpu::TextureViewDescriptor::default());

    let raw_input = egui_state.take_egui_input(window);
    let mut actions = Vec::new();
    let full_output = egui_ctx.run(raw_input, |ctx| {
        draw_controls(ctx, playback, ui_state, &mut actions);
        draw_strip(ctx, playback, ui_state.show_delimiters, geometry);
    });

    egui_state.handle_platform_output(window, full_output.platform_output);
    let pixels_per_point = window.scale_factor() as f32;
    let paint_jobs = egui_ctx.tessellate(full_output.shapes, pixels_per_point);

    for (texture_id, delta) in &full_output.textures_delta.set {
        egui_renderer.update_texture(&gpu.device, &gpu.queue, *texture_id, delta);
    }

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("linecam-egui"),
        });

    let screen_descriptor = ScreenDescriptor {
        size_in_pixels: [surface_config.width, surface_config.height],
        pixels_per_point,
    };
    egui_renderer.update_buffers(
        &gpu.device,
        &gpu.queue,
        &mut encoder,
        &paint_jobs,
        &screen_descriptor,
    );

    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("linecam-egui-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::WHITE),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        egui_renderer.render(&mut pass, &paint_jobs, &screen_descriptor);
    }

    for texture_id in &full_output.textures_delta.free {
        egui_renderer.free_texture(texture_id);
    }

    gpu.queue.submit(Some(encoder.finish()));
    frame.present();

    if !actions.is_empty() {
        for action in actions {
            apply_action(playback, ui_state, action);
        }
        window.request_redraw();
    }
    true
}

fn draw_controls<R: BufRead + Seek>(
    ctx: &egui::Context,
    playback: &PlaybackController<R>,
    ui_state: &mut UiState,
    actions: &mut Vec<UiAction>,
) {
    egui::TopBottomPanel::bottom("controls")
        .resizable(false)
        .exact_height(CONTROLS_HEIGHT)
        .frame(
            egui::Frame::none()
                .fill(BACKGROUND)
                .inner_margin(egui::Margin::symmetric(12.0, 8.0)),
        )
        .show(ctx, |ui| {
            if let Some(total) = playback.total_frames() {
                let max_frame = total.saturating_sub(1);
                let mut slider_frame = playback.index() as f64;
                let slider_width = ui.available_width();
                ui.spacing_mut().slider_width = slider_width;
                let response = ui.add(
                    egui::Slider::new(&mut slider_frame, 0.0..=max_frame as f64)
                        .show_value(false)
                        .text(""),
                );
                if response.changed() {
                    actions.push(UiAction::Seek(slider_frame.round() as i64));
                }
            }

            ui.add_space(6.0);
            ui.horizontal(|ui| {
                let play_label = if playback.is_playing() {
                    "Pause"
                } else {
                    "Play"
                };
                if ui.button(play_label).clicked() {
                    actions.push(UiAction::TogglePlay);
                }
                if !playback.is_live() {
                    if ui.button("Reset").clicked() {
                        actions.push(UiAction::Reset);
                    }
                    if ui.button("Previous").clicked() {
                        actions.push(UiAction::Step(-1));
                    }
                    if ui.button("Next").clicked() {
                        actions.push(UiAction::Step(1));
                    }
                }
            });

            ui.add_space(6.0);
            ui.horizontal(|ui| {
                let delimiter_label = if ui_state.show_delimiters {
                    "hide delimiters"
                } else {
                    "show delimiters"
                };
                if ui.button(delimiter_label).clicked() {
                    actions.push(UiAction::ToggleDelimiters);
                }
                if !playback.is_live() {
                    ui.label("go to frame : ");
                    let response = ui.add(
                        egui::TextEdit::singleline(&mut ui_state.goto_text).desired_width(80.0),
                    );
                    if response.lost_focus() && ui.input(|input| input.key_pressed(egui::Key::Enter))
                    {
                        actions.push(UiAction::GoTo);
                    }
                }
            });
        });
}

fn draw_strip<R: BufRead + Seek>(
    ctx: &egui::Context,
    playback: &PlaybackController<R>,
    show_delimiters: bool,
    geometry: &StripGeometry,
) {
    egui::CentralPanel::default()
        .frame(egui::Frame::none().fill(BACKGROUND))
        .show(ctx, |ui| {
            let origin = ui.max_rect().min;
            let painter = ui.painter();
            let layout = StripLayout::compute(playback.frame(), geometry, show_delimiters);

            for cell in &layout.cells {
                let rect = Rect::from_min_size(
                    origin + egui::vec2(cell.x, cell.y),
                    egui::vec2(cell.width, cell.height),
                );
                painter.rect_filled(rect, 0.0, Color32::from_gray(cell.gray));
            }
            for guide in &layout.guides {
                painter.line_segment(
                    [
                        origin + egui::vec2(guide.x, guide.top),
                        origin + egui::vec2(guide.x, guide.bottom),
                    ],
                    Stroke::new(1.0, Color32::RED),
                );
            }

            let caption = Caption::new(playback.frame(), playback.index(), playback.total_frames());
            let text_x = origin.x + 20.0;
            let strip_bottom = origin.y + geometry.origin_y + geometry.cell_height;
            painter.text(
                Pos2::new(text_x, strip_bottom + 15.0),
                Align2::LEFT_TOP,
                &caption.counter,
                FontId::new(15.0, FontFamily::Proportional),
                Color32::BLACK,
            );
            for (row, (label, values)) in caption.segments.iter().enumerate() {
                painter.text(
                    Pos2::new(text_x, strip_bottom + 40.0 + 20.0 * row as f32),
                    Align2::LEFT_TOP,
                    format!("{:<8}{}", format!("{label}:"), values),
                    FontId::new(11.0, FontFamily::Monospace),
                    Color32::BLACK,
                );
            }
        });
}

fn apply_action<R: BufRead + Seek>(
    playback: &mut PlaybackController<R>,
    ui_state: &mut UiState,
    action: UiAction,
) {
    let result = match action {
        UiAction::TogglePlay => {
            playback.toggle();
            Ok(())
        }
        UiAction::Reset => playback.reset(),
        UiAction::Step(delta) => playback.step(delta),
        UiAction::Seek(frame) => playback.seek(frame),
        UiAction::GoTo => {
            go_to_frame(playback, ui_state);
            Ok(())
        }
        UiAction::ToggleDelimiters => {
            ui_state.show_delimiters = !ui_state.show_delimiters;
            Ok(())
        }
    };
    if let Err(error) = result {
        log::warn!("{action:?} failed: {error}");
    }
}

/// Invalid text or an out-of-range frame clears the field.
fn go_to_frame<R: BufRead + Seek>(playback: &mut PlaybackController<R>, ui_state: &mut UiState) {
    let outcome = ui_state
        .goto_text
        .trim()
        .parse::<i64>()
        .map_err(|error| error.to_string())
        .and_then(|frame| playback.seek(frame).map_err(|error| error.to_string()));
    if let Err(error) = outcome {
        log::warn!("go to frame {:?}: {error}", ui_state.goto_text);
        ui_state.goto_text.clear();
    }
}

fn handle_keyboard_event(
    key: PhysicalKey,
    target: &EventLoopWindowTarget<ViewerEvent>,
) -> Option<UiAction> {
    match key {
        PhysicalKey::Code(KeyCode::Space) => Some(UiAction::TogglePlay),
        PhysicalKey::Code(KeyCode::ArrowLeft) => Some(UiAction::Step(-1)),
        PhysicalKey::Code(KeyCode::ArrowRight) => Some(UiAction::Step(1)),
        PhysicalKey::Code(KeyCode::KeyR) => Some(UiAction::Reset),
        PhysicalKey::Code(KeyCode::KeyD) => Some(UiAction::ToggleDelimiters),
        PhysicalKey::Code(KeyCode::Escape) => {
            target.exit();
            None
        }
        _ => None,
    }
}

fn window_size(geometry: &StripGeometry) -> LogicalSize<f64> {
    let width = geometry.origin_x * 2.0 + geometry.strip_width() + 20.0;
    let height = geometry.origin_y + geometry.cell_height + CAPTION_HEIGHT + CONTROLS_HEIGHT;
    LogicalSize::new(width as f64, height as f64)
}

/// Gray levels are painted as-is, so a non-sRGB target keeps them exact.
fn pick_surface_format(formats: &[wgpu::TextureFormat]) -> Result<wgpu::TextureFormat> {
    formats
        .iter()
        .copied()
        .find(|format| !format.is_srgb())
        .or_else(|| formats.first().copied())
        .ok_or_else(|| anyhow!("surface reports no supported texture formats"))
}
