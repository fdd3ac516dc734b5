use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbaImage;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;

use crate::adjustments::{Adjustments, keys};
use crate::config::AppConfig;
use crate::crop::{CropController, PerspectiveParams};
use crate::geometry::Vec2;
use crate::render::lut::LookupTable;
use crate::render::{FrameParams, OverlayGeometry, Renderer};
use crate::view::ViewTransform;

/// Dimming applied outside the crop rectangle while crop mode is active.
const CROP_DIM_STRENGTH: f32 = 0.55;

/// Renderer stored in the egui-wgpu callback resources; created once at app
/// start and owned by the paint machinery until the surface goes away.
struct ViewportResources {
    renderer: Renderer,
}

/// Per-frame paint callback: uniforms and overlay geometry are snapshotted
/// at UI time, the renderer consumes them in prepare/paint.
struct ViewportCallback {
    params: FrameParams,
    overlay: Option<OverlayGeometry>,
}

impl egui_wgpu::CallbackTrait for ViewportCallback {
    fn prepare(
        &self,
        _device: &wgpu::Device,
        queue: &wgpu::Queue,
        _screen_descriptor: &egui_wgpu::ScreenDescriptor,
        _egui_encoder: &mut wgpu::CommandEncoder,
        resources: &mut egui_wgpu::CallbackResources,
    ) -> Vec<wgpu::CommandBuffer> {
        if let Some(res) = resources.get_mut::<ViewportResources>() {
            res.renderer
                .prepare(queue, &self.params, self.overlay.as_ref());
        }
        Vec::new()
    }

    fn paint(
        &self,
        _info: egui::PaintCallbackInfo,
        render_pass: &mut wgpu::RenderPass<'static>,
        resources: &egui_wgpu::CallbackResources,
    ) {
        if let Some(res) = resources.get::<ViewportResources>() {
            res.renderer.paint(render_pass);
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ExportFormat {
    Png,
    Jpg,
}

impl ExportFormat {
    const ALL: [ExportFormat; 2] = [ExportFormat::Png, ExportFormat::Jpg];

    fn label(self) -> &'static str {
        match self {
            ExportFormat::Png => "PNG",
            ExportFormat::Jpg => "JPG",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpg => "jpg",
        }
    }
}

pub struct ViewfinderApp {
    config: AppConfig,
    adjustments: Adjustments,
    view: ViewTransform,
    controller: CropController,
    image_path: Option<PathBuf>,
    path_input: String,
    load_error: Option<String>,
    pending_upload: Option<Arc<RgbaImage>>,
    curve_table: LookupTable,
    levels_table: LookupTable,
    crop_mode: bool,
    started: Instant,
    show_export_window: bool,
    export_width: u32,
    export_height: u32,
    export_format: ExportFormat,
    export_jpg_quality: u8,
    export_status: String,
}

impl ViewfinderApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: AppConfig,
        image_arg: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let render_state = cc
            .wgpu_render_state
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("wgpu render state unavailable"))?;
        let renderer = Renderer::new(
            &render_state.device,
            &render_state.queue,
            render_state.target_format,
        )?;
        render_state
            .renderer
            .write()
            .callback_resources
            .insert(ViewportResources { renderer });

        let initial = image_arg.or_else(|| config.last_image.clone());
        let mut app = Self {
            config,
            adjustments: Adjustments::new(),
            view: ViewTransform::new(),
            controller: CropController::new(),
            image_path: None,
            path_input: initial
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            load_error: None,
            pending_upload: None,
            curve_table: LookupTable::identity(),
            levels_table: LookupTable::identity(),
            crop_mode: false,
            started: Instant::now(),
            show_export_window: false,
            export_width: 1920,
            export_height: 1440,
            export_format: ExportFormat::Png,
            export_jpg_quality: 90,
            export_status: String::new(),
        };
        if let Some(path) = initial {
            app.load_image(&path);
        }
        Ok(app)
    }

    /// Decodes an image synchronously and stages it for upload on the next
    /// paint. Adjustments round-trip through the sidecar next to the file.
    fn load_image(&mut self, path: &Path) {
        match image::open(path) {
            Ok(img) => {
                let rgba = img.to_rgba8();
                let (w, h) = rgba.dimensions();
                self.view = ViewTransform::new();
                self.view.set_texture_size(w as f32, h as f32);
                self.controller = CropController::new();
                self.controller.set_texture_size(w as f32, h as f32);
                self.adjustments = Adjustments::load(path).unwrap_or_default();
                self.controller.set_crop_rect(self.adjustments.crop_rect());
                self.view
                    .set_rotation_steps(self.adjustments.rotation_steps());
                self.pending_upload = Some(Arc::new(rgba));
                self.image_path = Some(path.to_path_buf());
                self.crop_mode = false;
                self.load_error = None;
                tracing::debug!(path = %path.display(), w, h, "image loaded");
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "could not open image");
                self.load_error = Some(format!("Could not open {}: {err}", path.display()));
            }
        }
    }

    fn save_sidecar(&self) {
        if let Some(ref path) = self.image_path {
            if let Err(err) = self.adjustments.save(path) {
                tracing::warn!(%err, "failed to save adjustment sidecar");
            }
        }
    }

    fn current_perspective(&self) -> PerspectiveParams {
        PerspectiveParams {
            vertical: self.adjustments.scalar(keys::PERSPECTIVE_VERTICAL),
            horizontal: self.adjustments.scalar(keys::PERSPECTIVE_HORIZONTAL),
            straighten_deg: self.adjustments.scalar(keys::CROP_STRAIGHTEN),
            flip_h: self.adjustments.flag(keys::CROP_FLIP_H),
        }
    }

    /// Pushes adjustment state into the engine and uploads any staged
    /// texture/LUT changes.
    fn sync_engine(&mut self, ctx: &egui::Context, frame: &eframe::Frame) {
        if self
            .view
            .set_rotation_steps(self.adjustments.rotation_steps())
        {
            ctx.request_repaint();
        }
        let resp = self
            .controller
            .sync_perspective(self.current_perspective(), &mut self.view);
        self.apply_response(ctx, resp);

        let Some(render_state) = frame.wgpu_render_state() else {
            return;
        };
        let mut egui_renderer = render_state.renderer.write();
        let Some(res) = egui_renderer.callback_resources.get_mut::<ViewportResources>() else {
            return;
        };
        if let Some(upload) = self.pending_upload.take() {
            res.renderer
                .upload_texture(&render_state.device, &render_state.queue, &upload);
        } else if self.image_path.is_none() {
            res.renderer.clear_texture(&render_state.device);
        }
        // Disabled adjustments fall back to the identity table.
        let identity = LookupTable::identity();
        let curve = if self.adjustments.flag(keys::CURVE_ENABLED) {
            &self.curve_table
        } else {
            &identity
        };
        let levels = if self.adjustments.flag(keys::LEVELS_ENABLED) {
            &self.levels_table
        } else {
            &identity
        };
        res.renderer.set_curve_lut(&render_state.queue, curve);
        res.renderer.set_levels_lut(&render_state.queue, levels);
    }

    fn apply_response(&mut self, ctx: &egui::Context, resp: crate::crop::ControllerResponse) {
        if resp.repaint {
            ctx.request_repaint();
        }
        if let Some(cursor) = resp.cursor {
            ctx.set_cursor_icon(cursor);
        }
        if let Some(rect) = resp.crop_changed {
            self.adjustments.set_crop_rect(rect);
        }
        if let Some(zoom) = resp.zoom_changed {
            tracing::trace!(zoom, "zoom changed");
        }
    }

    fn viewport_ui(&mut self, ui: &mut egui::Ui) {
        let ctx = ui.ctx().clone();
        let avail = ui.available_size();
        let (rect, response) = ui.allocate_exact_size(avail, egui::Sense::click_and_drag());
        let ppp = ctx.pixels_per_point();
        self.view
            .set_viewport(Vec2::new(rect.width() * ppp, rect.height() * ppp), ppp);

        let to_local =
            |pos: egui::Pos2| Vec2::new((pos.x - rect.min.x) * ppp, (pos.y - rect.min.y) * ppp);

        // Wheel zoom anchored at the pointer.
        if response.hovered() {
            let scroll = ctx.input(|i| i.raw_scroll_delta.y);
            if scroll.abs() > 0.0 {
                if let Some(pos) = ctx.input(|i| i.pointer.hover_pos()) {
                    let resp = self.controller.wheel(scroll, to_local(pos), &mut self.view);
                    self.apply_response(&ctx, resp);
                }
            }
        }

        if response.drag_started() {
            if let Some(pos) = response.interact_pointer_pos() {
                let resp = self
                    .controller
                    .pointer_pressed(to_local(pos), &mut self.view);
                self.apply_response(&ctx, resp);
            }
        }
        if response.dragged() {
            if let Some(pos) = response.interact_pointer_pos() {
                if self.controller.is_dragging() {
                    let resp = self.controller.pointer_moved(to_local(pos), &mut self.view);
                    self.apply_response(&ctx, resp);
                } else {
                    // Outside crop interaction, dragging pans the camera.
                    let d = response.drag_delta() * ppp;
                    self.view.pan_by(Vec2::new(d.x, -d.y));
                    ctx.request_repaint();
                }
            }
        } else if response.hovered() {
            if let Some(pos) = ctx.input(|i| i.pointer.hover_pos()) {
                let resp = self.controller.pointer_moved(to_local(pos), &mut self.view);
                self.apply_response(&ctx, resp);
            }
        }
        if response.drag_stopped() {
            let resp = self.controller.pointer_released(&mut self.view);
            self.apply_response(&ctx, resp);
            self.save_sidecar();
        }

        // Animator ticks ride the repaint loop.
        let resp = self.controller.tick(Instant::now(), &mut self.view);
        self.apply_response(&ctx, resp);
        if self.crop_mode && !self.controller.is_dragging() {
            ctx.request_repaint_after(Duration::from_millis(50));
        }

        let crop_dim = if self.crop_mode { CROP_DIM_STRENGTH } else { 0.0 };
        let params = FrameParams::compose(
            &self.view,
            self.controller.session(),
            &self.adjustments,
            crop_dim,
            self.started.elapsed().as_secs_f32(),
        );
        let overlay = self.controller.overlay_visible().then(|| {
            OverlayGeometry::crop_frame(
                &self.controller.overlay_corners(&self.view),
                self.view.viewport(),
                1.0,
            )
        });
        ui.painter().add(egui_wgpu::Callback::new_paint_callback(
            rect,
            ViewportCallback { params, overlay },
        ));

        if let Some(ref err) = self.load_error {
            ui.painter().text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                err,
                egui::FontId::proportional(14.0),
                egui::Color32::LIGHT_RED,
            );
        }
    }

    fn controls_ui(&mut self, ui: &mut egui::Ui) {
        ui.label(egui::RichText::new("Image").strong());
        ui.horizontal(|ui| {
            ui.add(
                egui::TextEdit::singleline(&mut self.path_input)
                    .desired_width(ui.available_width() - 56.0)
                    .font(egui::TextStyle::Monospace),
            );
            if ui.button("Load").clicked() {
                let path = PathBuf::from(self.path_input.trim());
                self.load_image(&path);
            }
        });
        ui.separator();

        self.crop_section(ui);
        ui.separator();
        self.perspective_section(ui);
        ui.separator();
        self.light_section(ui);
        ui.separator();

        if ui.button("Export...").clicked() {
            self.show_export_window = true;
        }
    }

    fn crop_section(&mut self, ui: &mut egui::Ui) {
        ui.label(egui::RichText::new("Crop").strong());
        ui.add_space(4.0);

        let mut crop_mode = self.crop_mode;
        if ui.checkbox(&mut crop_mode, "Crop mode").changed() {
            self.crop_mode = crop_mode;
            let resp = self.controller.set_enabled(crop_mode, Instant::now());
            if resp.repaint {
                ui.ctx().request_repaint();
            }
            if !crop_mode {
                self.save_sidecar();
            }
        }

        ui.horizontal(|ui| {
            ui.label("Rotate");
            let steps = self.adjustments.rotation_steps();
            if ui.button("◀ 90°").clicked() {
                self.adjustments
                    .set_scalar(keys::CROP_ROTATE90, ((steps + 3) % 4) as f32);
            }
            if ui.button("180°").clicked() {
                self.adjustments
                    .set_scalar(keys::CROP_ROTATE90, ((steps + 2) % 4) as f32);
            }
            if ui.button("90° ▶").clicked() {
                self.adjustments
                    .set_scalar(keys::CROP_ROTATE90, ((steps + 1) % 4) as f32);
            }
            if steps != 0 {
                ui.weak(format!("({}×90°)", steps));
            }
        });

        ui.horizontal(|ui| {
            ui.label("Flip");
            let flip = self.adjustments.flag(keys::CROP_FLIP_H);
            if ui.selectable_label(flip, "↔ H").clicked() {
                self.adjustments.set_flag(keys::CROP_FLIP_H, !flip);
            }
        });

        if ui.small_button("Reset crop").clicked() {
            self.controller.reset_crop();
            self.adjustments
                .set_crop_rect(self.controller.session().rect());
        }
        if ui.small_button("Reset zoom").clicked() {
            self.view.reset_zoom();
            ui.ctx().request_repaint();
        }
    }

    fn perspective_section(&mut self, ui: &mut egui::Ui) {
        ui.label(egui::RichText::new("Geometry").strong());
        ui.add_space(4.0);

        let mut straighten = self.adjustments.scalar(keys::CROP_STRAIGHTEN);
        ui.horizontal(|ui| {
            ui.label("Straighten");
            let resp = ui.add(
                egui::Slider::new(&mut straighten, -15.0_f32..=15.0_f32)
                    .suffix("°")
                    .fixed_decimals(1)
                    .clamping(egui::SliderClamping::Always),
            );
            self.track_perspective_drag(&resp);
            if resp.changed() {
                self.adjustments
                    .set_scalar(keys::CROP_STRAIGHTEN, straighten);
            }
            if straighten != 0.0 && ui.small_button("↺").clicked() {
                self.adjustments.set_scalar(keys::CROP_STRAIGHTEN, 0.0);
            }
        });

        let mut vertical = self.adjustments.scalar(keys::PERSPECTIVE_VERTICAL);
        ui.horizontal(|ui| {
            ui.label("Vertical");
            let resp = ui.add(
                egui::Slider::new(&mut vertical, -1.0_f32..=1.0_f32)
                    .fixed_decimals(2)
                    .clamping(egui::SliderClamping::Always),
            );
            self.track_perspective_drag(&resp);
            if resp.changed() {
                self.adjustments
                    .set_scalar(keys::PERSPECTIVE_VERTICAL, vertical);
            }
            if vertical != 0.0 && ui.small_button("↺").clicked() {
                self.adjustments.set_scalar(keys::PERSPECTIVE_VERTICAL, 0.0);
            }
        });

        let mut horizontal = self.adjustments.scalar(keys::PERSPECTIVE_HORIZONTAL);
        ui.horizontal(|ui| {
            ui.label("Horizontal");
            let resp = ui.add(
                egui::Slider::new(&mut horizontal, -1.0_f32..=1.0_f32)
                    .fixed_decimals(2)
                    .clamping(egui::SliderClamping::Always),
            );
            self.track_perspective_drag(&resp);
            if resp.changed() {
                self.adjustments
                    .set_scalar(keys::PERSPECTIVE_HORIZONTAL, horizontal);
            }
            if horizontal != 0.0 && ui.small_button("↺").clicked() {
                self.adjustments
                    .set_scalar(keys::PERSPECTIVE_HORIZONTAL, 0.0);
            }
        });
    }

    /// Baseline snapshot bookkeeping for continuous perspective drags.
    fn track_perspective_drag(&mut self, resp: &egui::Response) {
        if resp.drag_started() {
            self.controller.begin_perspective_adjust();
        }
        if resp.drag_stopped() {
            self.controller.end_perspective_adjust();
            self.save_sidecar();
        }
    }

    fn light_section(&mut self, ui: &mut egui::Ui) {
        ui.label(egui::RichText::new("Light & Color").strong());
        ui.add_space(4.0);

        scalar_slider(
            ui,
            &mut self.adjustments,
            "Exposure",
            keys::EXPOSURE,
            -5.0..=5.0,
        );
        scalar_slider(
            ui,
            &mut self.adjustments,
            "Contrast",
            keys::CONTRAST,
            -1.0..=1.0,
        );
        scalar_slider(
            ui,
            &mut self.adjustments,
            "Black point",
            keys::BLACK_POINT,
            0.0..=0.5,
        );
        scalar_slider(
            ui,
            &mut self.adjustments,
            "Saturation",
            keys::SATURATION,
            -1.0..=1.0,
        );
        gain_slider(ui, &mut self.adjustments, "Gain R", keys::GAIN_R);
        gain_slider(ui, &mut self.adjustments, "Gain G", keys::GAIN_G);
        gain_slider(ui, &mut self.adjustments, "Gain B", keys::GAIN_B);
        scalar_slider(
            ui,
            &mut self.adjustments,
            "Grain",
            keys::GRAIN_AMOUNT,
            0.0..=1.0,
        );

        ui.horizontal(|ui| {
            flag_toggle(ui, &mut self.adjustments, "B&W", keys::BW_ENABLED);
            flag_toggle(ui, &mut self.adjustments, "Curve", keys::CURVE_ENABLED);
            flag_toggle(ui, &mut self.adjustments, "Levels", keys::LEVELS_ENABLED);
        });
    }

    fn export_window(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        if !self.show_export_window {
            return;
        }
        let mut open = self.show_export_window;
        let mut do_export = false;
        egui::Window::new("Export")
            .open(&mut open)
            .default_size([360.0, 200.0])
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label("Size");
                    ui.add(egui::DragValue::new(&mut self.export_width).range(16..=8192));
                    ui.label("×");
                    ui.add(egui::DragValue::new(&mut self.export_height).range(16..=8192));
                });
                egui::ComboBox::from_label("Format")
                    .selected_text(self.export_format.label())
                    .show_ui(ui, |ui| {
                        for fmt in ExportFormat::ALL {
                            ui.selectable_value(&mut self.export_format, fmt, fmt.label());
                        }
                    });
                if self.export_format == ExportFormat::Jpg {
                    ui.horizontal(|ui| {
                        ui.label("Quality");
                        ui.add(
                            egui::Slider::new(&mut self.export_jpg_quality, 1_u8..=100_u8)
                                .clamping(egui::SliderClamping::Always),
                        );
                    });
                }
                ui.add_space(8.0);
                if ui.button("Render to file").clicked() {
                    do_export = true;
                }
                if !self.export_status.is_empty() {
                    ui.separator();
                    ui.label(&self.export_status);
                }
            });
        self.show_export_window = open;
        if do_export {
            self.run_export(frame);
        }
    }

    fn run_export(&mut self, frame: &mut eframe::Frame) {
        let Some(render_state) = frame.wgpu_render_state() else {
            self.export_status = "GPU unavailable".to_string();
            return;
        };
        let params = FrameParams::compose(
            &self.view,
            self.controller.session(),
            &self.adjustments,
            0.0,
            0.0,
        )
        .for_export(self.export_width, self.export_height);

        let rendered = {
            let mut egui_renderer = render_state.renderer.write();
            egui_renderer
                .callback_resources
                .get_mut::<ViewportResources>()
                .filter(|res| res.renderer.has_texture())
                .and_then(|res| {
                    res.renderer.render_offscreen_image(
                        &render_state.device,
                        &render_state.queue,
                        self.export_width,
                        self.export_height,
                        params,
                    )
                })
        };
        let Some(image) = rendered else {
            self.export_status = "Export failed; see log".to_string();
            return;
        };

        let output = self.export_output_path();
        match self.write_export(&image, &output) {
            Ok(()) => {
                self.export_status = format!("Wrote {}", output.display());
                tracing::info!(path = %output.display(), "export finished");
            }
            Err(err) => {
                self.export_status = format!("Export failed: {err}");
                tracing::warn!(%err, "export write failed");
            }
        }
    }

    fn export_output_path(&self) -> PathBuf {
        let dir = self
            .config
            .export_dir
            .clone()
            .or_else(dirs::picture_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        let stem = self
            .image_path
            .as_ref()
            .and_then(|p| p.file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "untitled".to_string());
        let base = dir.join(format!("{}.{}", stem, self.export_format.extension()));
        if !base.exists() {
            return base;
        }
        for n in 2..10000 {
            let candidate = dir.join(format!(
                "{}-{}.{}",
                stem,
                n,
                self.export_format.extension()
            ));
            if !candidate.exists() {
                return candidate;
            }
        }
        dir.join(format!("{}-final.{}", stem, self.export_format.extension()))
    }

    fn write_export(&self, image: &RgbaImage, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        match self.export_format {
            ExportFormat::Png => {
                image.write_with_encoder(PngEncoder::new(writer))?;
            }
            ExportFormat::Jpg => {
                let encoder =
                    JpegEncoder::new_with_quality(writer, self.export_jpg_quality.clamp(1, 100));
                image::DynamicImage::ImageRgba8(image.clone())
                    .to_rgb8()
                    .write_with_encoder(encoder)?;
            }
        }
        Ok(())
    }
}

fn scalar_slider(
    ui: &mut egui::Ui,
    adj: &mut Adjustments,
    label: &str,
    key: &str,
    range: std::ops::RangeInclusive<f32>,
) {
    let mut value = adj.scalar(key);
    ui.horizontal(|ui| {
        ui.label(label);
        let resp = ui.add(
            egui::Slider::new(&mut value, range)
                .fixed_decimals(2)
                .clamping(egui::SliderClamping::Always),
        );
        if resp.changed() {
            adj.set_scalar(key, value);
        }
        if value != 0.0 && ui.small_button("↺").clicked() {
            adj.set_scalar(key, 0.0);
        }
    });
}

fn gain_slider(ui: &mut egui::Ui, adj: &mut Adjustments, label: &str, key: &str) {
    let mut value = adj.scalar_or(key, 1.0);
    ui.horizontal(|ui| {
        ui.label(label);
        let resp = ui.add(
            egui::Slider::new(&mut value, 0.0_f32..=2.0_f32)
                .fixed_decimals(2)
                .clamping(egui::SliderClamping::Always),
        );
        if resp.changed() {
            adj.set_scalar(key, value);
        }
        if value != 1.0 && ui.small_button("↺").clicked() {
            adj.set_scalar(key, 1.0);
        }
    });
}

fn flag_toggle(ui: &mut egui::Ui, adj: &mut Adjustments, label: &str, key: &str) {
    let enabled = adj.flag(key);
    if ui.selectable_label(enabled, label).clicked() {
        adj.set_flag(key, !enabled);
    }
}

impl eframe::App for ViewfinderApp {
    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        if let Some(rect) = ctx.input(|i| i.viewport().inner_rect) {
            self.config.window_width = Some(rect.width());
            self.config.window_height = Some(rect.height());
        }

        self.sync_engine(ctx, frame);

        egui::SidePanel::right("controls_panel")
            .min_width(280.0)
            .default_width(320.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical()
                    .auto_shrink([false, false])
                    .show(ui, |ui| {
                        self.controls_ui(ui);
                    });
            });

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                self.viewport_ui(ui);
            });

        self.export_window(ctx, frame);
    }

    fn on_exit(&mut self) {
        self.config.last_image = self.image_path.clone();
        self.config.save();
        self.save_sidecar();
    }
}
