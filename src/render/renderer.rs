//! wgpu renderer for the viewport: owns the image and overlay pipelines, the
//! resident photo texture, and the curve/levels lookup-table textures.
//!
//! Resource creation failures are fatal at construction; per-frame work never
//! allocates. Off-screen export renders the same uniforms into its own
//! target and reads back fixed 8-bit RGBA.

use std::sync::mpsc;

use image::RgbaImage;

use crate::adjustments::{Adjustments, keys};
use crate::crop::CropSession;
use crate::geometry::{Quad, Vec2};
use crate::render::lut::LookupTable;
use crate::render::shaders::{IMAGE_SHADER_SRC, OVERLAY_SHADER_SRC};
use crate::view::ViewTransform;

/// Fragment-stage uniform block. Field order must match the WGSL struct in
/// `shaders::IMAGE_SHADER_SRC`.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameParams {
    pub view_size: [f32; 2],
    pub tex_size: [f32; 2],
    pub logical_size: [f32; 2],
    pub pan: [f32; 2],
    pub scale: f32,
    pub rotation_steps: f32,
    pub crop_dim: f32,
    pub exposure: f32,
    pub contrast: f32,
    pub black_point: f32,
    pub saturation: f32,
    pub bw_mix: f32,
    pub grain_amount: f32,
    pub time_s: f32,
    pub curve_enabled: f32,
    pub levels_enabled: f32,
    pub gain: [f32; 4],
    pub crop_rect: [f32; 4],
    pub persp_r0: [f32; 4],
    pub persp_r1: [f32; 4],
    pub persp_r2: [f32; 4],
}

impl FrameParams {
    /// Gathers the current view, crop session, and adjustment values into
    /// one uniform block. `crop_dim` is the dimming strength applied outside
    /// the crop rectangle while crop mode is active.
    pub fn compose(
        view: &ViewTransform,
        session: &CropSession,
        adj: &Adjustments,
        crop_dim: f32,
        time_s: f32,
    ) -> Self {
        let m = session.sampling_matrix();
        let row = |i: usize| {
            let r = m.row(i);
            [r[0], r[1], r[2], 0.0]
        };
        let rect = session.rect();
        let view_size = view.viewport();
        let logical = view.logical_size();
        let tex = view.texture_size();
        Self {
            view_size: [view_size.x, view_size.y],
            tex_size: [tex.x, tex.y],
            logical_size: [logical.x.max(1.0), logical.y.max(1.0)],
            pan: [view.pan().x, view.pan().y],
            scale: view.effective_scale().max(1e-6),
            rotation_steps: view.rotation_steps() as f32,
            crop_dim,
            exposure: adj.scalar(keys::EXPOSURE),
            contrast: adj.scalar(keys::CONTRAST),
            black_point: adj.scalar(keys::BLACK_POINT),
            saturation: adj.scalar(keys::SATURATION),
            bw_mix: if adj.flag(keys::BW_ENABLED) { 1.0 } else { 0.0 },
            grain_amount: adj.scalar(keys::GRAIN_AMOUNT),
            time_s,
            curve_enabled: if adj.flag(keys::CURVE_ENABLED) { 1.0 } else { 0.0 },
            levels_enabled: if adj.flag(keys::LEVELS_ENABLED) { 1.0 } else { 0.0 },
            gain: [
                adj.scalar_or(keys::GAIN_R, 1.0),
                adj.scalar_or(keys::GAIN_G, 1.0),
                adj.scalar_or(keys::GAIN_B, 1.0),
                1.0,
            ],
            crop_rect: [rect.cx, rect.cy, rect.width, rect.height],
            persp_r0: row(0),
            persp_r1: row(1),
            persp_r2: row(2),
        }
    }

    /// Reframes the uniforms for an off-screen export target: pan zeroed and
    /// the scale recomputed to fit `width`×`height`.
    pub fn for_export(mut self, width: u32, height: u32) -> Self {
        let lw = self.logical_size[0];
        let lh = self.logical_size[1];
        self.view_size = [width as f32, height as f32];
        self.pan = [0.0, 0.0];
        self.crop_dim = 0.0;
        self.grain_amount = 0.0;
        self.scale = if lw > 0.0 && lh > 0.0 {
            (width as f32 / lw).min(height as f32 / lh)
        } else {
            1.0
        };
        self
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct OverlayVertex {
    pos: [f32; 2],
    color: [f32; 4],
}

const BORDER_THICKNESS_PX: f32 = 1.5;
const HANDLE_SIZE_PX: f32 = 10.0;
const OVERLAY_MAX_VERTICES: u64 = 64;

/// Crop-overlay primitives in normalized device coordinates: a border
/// outline plus four corner-handle squares.
#[derive(Debug, Clone, Default)]
pub struct OverlayGeometry {
    vertices: Vec<OverlayVertex>,
}

impl OverlayGeometry {
    /// Builds the overlay for screen-space crop corners inside a viewport of
    /// `view_size` device pixels.
    pub fn crop_frame(corners: &Quad, view_size: Vec2, alpha: f32) -> Self {
        let mut geo = OverlayGeometry::default();
        if view_size.x <= 0.0 || view_size.y <= 0.0 {
            return geo;
        }
        let border = [0.95, 0.95, 0.95, 0.9 * alpha];
        let handle = [1.0, 1.0, 1.0, alpha];
        let min = corners[0];
        let max = corners[2];
        let t = BORDER_THICKNESS_PX;

        // Border as four thin quads.
        geo.push_rect_px(
            Vec2::new(min.x - t, min.y - t),
            Vec2::new(max.x + t, min.y + t),
            view_size,
            border,
        );
        geo.push_rect_px(
            Vec2::new(min.x - t, max.y - t),
            Vec2::new(max.x + t, max.y + t),
            view_size,
            border,
        );
        geo.push_rect_px(
            Vec2::new(min.x - t, min.y),
            Vec2::new(min.x + t, max.y),
            view_size,
            border,
        );
        geo.push_rect_px(
            Vec2::new(max.x - t, min.y),
            Vec2::new(max.x + t, max.y),
            view_size,
            border,
        );

        let h = HANDLE_SIZE_PX * 0.5;
        for corner in corners {
            geo.push_rect_px(
                Vec2::new(corner.x - h, corner.y - h),
                Vec2::new(corner.x + h, corner.y + h),
                view_size,
                handle,
            );
        }
        geo
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    fn push_rect_px(&mut self, min: Vec2, max: Vec2, view: Vec2, color: [f32; 4]) {
        let to_ndc = |p: Vec2| {
            [
                (p.x / view.x) * 2.0 - 1.0,
                1.0 - (p.y / view.y) * 2.0,
            ]
        };
        let tl = to_ndc(min);
        let tr = to_ndc(Vec2::new(max.x, min.y));
        let br = to_ndc(max);
        let bl = to_ndc(Vec2::new(min.x, max.y));
        for pos in [tl, tr, br, tl, br, bl] {
            self.vertices.push(OverlayVertex { pos, color });
        }
    }
}

struct ImageTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct LutTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    cached: LookupTable,
}

pub struct Renderer {
    image_pipeline: wgpu::RenderPipeline,
    overlay_pipeline: wgpu::RenderPipeline,
    export_pipeline: Option<wgpu::RenderPipeline>,
    image_shader: wgpu::ShaderModule,
    image_bgl: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    params_buf: wgpu::Buffer,
    overlay_buf: wgpu::Buffer,
    overlay_vertex_count: u32,
    texture: Option<ImageTexture>,
    placeholder: ImageTexture,
    curve: LutTexture,
    levels: LutTexture,
    bind_group: wgpu::BindGroup,
}

impl Renderer {
    /// Creates all pipelines and resident resources. Any validation error
    /// during creation is fatal and returned with the driver diagnostic.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target_format: wgpu::TextureFormat,
    ) -> anyhow::Result<Self> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let image_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("viewport_image_shader"),
            source: wgpu::ShaderSource::Wgsl(IMAGE_SHADER_SRC.into()),
        });
        let overlay_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("viewport_overlay_shader"),
            source: wgpu::ShaderSource::Wgsl(OVERLAY_SHADER_SRC.into()),
        });

        let image_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("viewport_image_bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                lut_layout_entry(3),
                lut_layout_entry(4),
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("viewport_image_layout"),
            bind_group_layouts: &[&image_bgl],
            push_constant_ranges: &[],
        });
        let image_pipeline =
            create_image_pipeline(device, &image_shader, &layout, target_format);

        let overlay_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("viewport_overlay_layout"),
            bind_group_layouts: &[],
            push_constant_ranges: &[],
        });
        let overlay_pipeline =
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("viewport_overlay"),
                layout: Some(&overlay_layout),
                vertex: wgpu::VertexState {
                    module: &overlay_shader,
                    entry_point: Some("vs_main"),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<OverlayVertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[
                            wgpu::VertexAttribute {
                                format: wgpu::VertexFormat::Float32x2,
                                offset: 0,
                                shader_location: 0,
                            },
                            wgpu::VertexAttribute {
                                format: wgpu::VertexFormat::Float32x4,
                                offset: 8,
                                shader_location: 1,
                            },
                        ],
                    }],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &overlay_shader,
                    entry_point: Some("fs_main"),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: target_format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("viewport_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let params_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("viewport_params"),
            size: std::mem::size_of::<FrameParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let overlay_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("viewport_overlay_vertices"),
            size: OVERLAY_MAX_VERTICES * std::mem::size_of::<OverlayVertex>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let placeholder = create_image_texture(device, queue, 1, 1, &[24, 24, 26, 255]);
        let curve = create_lut_texture(device, queue, "viewport_curve_lut");
        let levels = create_lut_texture(device, queue, "viewport_levels_lut");

        let bind_group = create_bind_group(
            device,
            &image_bgl,
            &params_buf,
            &placeholder.view,
            &sampler,
            &curve.view,
            &levels.view,
        );

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            anyhow::bail!("viewport renderer initialization failed: {err}");
        }

        Ok(Self {
            image_pipeline,
            overlay_pipeline,
            export_pipeline: None,
            image_shader,
            image_bgl,
            sampler,
            params_buf,
            overlay_buf,
            overlay_vertex_count: 0,
            texture: None,
            placeholder,
            curve,
            levels,
            bind_group,
        })
    }

    pub fn has_texture(&self) -> bool {
        self.texture.is_some()
    }

    /// Replaces the resident photo texture. Bilinear/clamp-to-edge sampling
    /// is fixed by the one sampler owned by the renderer.
    pub fn upload_texture(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        image: &RgbaImage,
    ) {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return;
        }
        self.texture = Some(create_image_texture(device, queue, w, h, image.as_raw()));
        self.rebuild_bind_group(device);
    }

    /// Drops the photo texture; the viewport falls back to the placeholder.
    pub fn clear_texture(&mut self, device: &wgpu::Device) {
        if self.texture.take().is_some() {
            self.rebuild_bind_group(device);
        }
    }

    /// Swaps in a new curve table unless it matches the resident one.
    /// Tables are always re-uploaded wholesale.
    pub fn set_curve_lut(&mut self, queue: &wgpu::Queue, lut: &LookupTable) {
        upload_lut(queue, &mut self.curve, lut);
    }

    pub fn set_levels_lut(&mut self, queue: &wgpu::Queue, lut: &LookupTable) {
        upload_lut(queue, &mut self.levels, lut);
    }

    /// Writes this frame's uniforms and overlay vertices.
    pub fn prepare(
        &mut self,
        queue: &wgpu::Queue,
        params: &FrameParams,
        overlay: Option<&OverlayGeometry>,
    ) {
        queue.write_buffer(&self.params_buf, 0, bytemuck::bytes_of(params));
        match overlay {
            Some(geo) if !geo.is_empty() => {
                let count = geo.vertex_count().min(OVERLAY_MAX_VERTICES as u32);
                queue.write_buffer(
                    &self.overlay_buf,
                    0,
                    bytemuck::cast_slice(&geo.vertices[..count as usize]),
                );
                self.overlay_vertex_count = count;
            }
            _ => self.overlay_vertex_count = 0,
        }
    }

    /// Draws the image triangle and, when prepared, the crop overlay.
    pub fn paint(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.image_pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..3, 0..1);

        if self.overlay_vertex_count > 0 {
            pass.set_pipeline(&self.overlay_pipeline);
            pass.set_vertex_buffer(0, self.overlay_buf.slice(..));
            pass.draw(0..self.overlay_vertex_count, 0..1);
        }
    }

    /// Renders the current image and adjustments into an off-screen target
    /// of the given size and reads the result back as 8-bit RGBA. Runtime
    /// failures log a warning and return `None`; export must never take the
    /// interactive session down.
    pub fn render_offscreen_image(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
        params: FrameParams,
    ) -> Option<RgbaImage> {
        let max_dim = device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max_dim || height > max_dim {
            tracing::warn!(width, height, max_dim, "export target size rejected");
            return None;
        }

        let export_pipeline = self.export_pipeline.get_or_insert_with(|| {
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("viewport_export_layout"),
                bind_group_layouts: &[&self.image_bgl],
                push_constant_ranges: &[],
            });
            create_image_pipeline(
                device,
                &self.image_shader,
                &layout,
                wgpu::TextureFormat::Rgba8Unorm,
            )
        });

        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("viewport_export_target"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());

        let export_params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("viewport_export_params"),
            size: std::mem::size_of::<FrameParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&export_params, 0, bytemuck::bytes_of(&params));

        let image_view = self
            .texture
            .as_ref()
            .map(|t| &t.view)
            .unwrap_or(&self.placeholder.view);
        let bind_group = create_bind_group(
            device,
            &self.image_bgl,
            &export_params,
            image_view,
            &self.sampler,
            &self.curve.view,
            &self.levels.view,
        );

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("viewport_export_encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("viewport_export_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(export_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }

        let unpadded_bytes_per_row = width * 4;
        let padded_bytes_per_row = unpadded_bytes_per_row
            .div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("viewport_export_readback"),
            size: padded_bytes_per_row as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        encoder.copy_texture_to_buffer(
            target.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            extent,
        );
        queue.submit([encoder.finish()]);

        let slice = readback.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = device.poll(wgpu::Maintain::wait());
        match rx.recv() {
            Ok(Ok(())) => {}
            other => {
                tracing::warn!(?other, "export readback mapping failed");
                return None;
            }
        }

        let mapped = slice.get_mapped_range();
        let unpadded = unpadded_bytes_per_row as usize;
        let padded = padded_bytes_per_row as usize;
        let mut out = vec![0u8; unpadded * height as usize];
        for row in 0..height as usize {
            let src = row * padded;
            let dst = row * unpadded;
            out[dst..dst + unpadded].copy_from_slice(&mapped[src..src + unpadded]);
        }
        drop(mapped);
        readback.unmap();

        let image = RgbaImage::from_raw(width, height, out);
        if image.is_none() {
            tracing::warn!("export produced a malformed pixel buffer");
        }
        image
    }

    fn rebuild_bind_group(&mut self, device: &wgpu::Device) {
        let image_view = self
            .texture
            .as_ref()
            .map(|t| &t.view)
            .unwrap_or(&self.placeholder.view);
        self.bind_group = create_bind_group(
            device,
            &self.image_bgl,
            &self.params_buf,
            image_view,
            &self.sampler,
            &self.curve.view,
            &self.levels.view,
        );
    }
}

fn lut_layout_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn create_image_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("viewport_image"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

fn create_image_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    width: u32,
    height: u32,
    pixels: &[u8],
) -> ImageTexture {
    let extent = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("viewport_photo"),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        texture.as_image_copy(),
        pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * 4),
            rows_per_image: Some(height),
        },
        extent,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    ImageTexture {
        _texture: texture,
        view,
    }
}

fn create_lut_texture(device: &wgpu::Device, queue: &wgpu::Queue, label: &str) -> LutTexture {
    let identity = LookupTable::identity();
    let extent = wgpu::Extent3d {
        width: crate::render::lut::LUT_SIZE as u32,
        height: 1,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba32Float,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    write_lut(queue, &texture, &identity);
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    LutTexture {
        texture,
        view,
        cached: identity,
    }
}

fn upload_lut(queue: &wgpu::Queue, slot: &mut LutTexture, lut: &LookupTable) {
    if slot.cached == *lut {
        return;
    }
    write_lut(queue, &slot.texture, lut);
    slot.cached = lut.clone();
}

fn write_lut(queue: &wgpu::Queue, texture: &wgpu::Texture, lut: &LookupTable) {
    let data = lut.as_rgba_f32();
    queue.write_texture(
        texture.as_image_copy(),
        bytemuck::cast_slice(&data),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(crate::render::lut::LUT_SIZE as u32 * 16),
            rows_per_image: Some(1),
        },
        wgpu::Extent3d {
            width: crate::render::lut::LUT_SIZE as u32,
            height: 1,
            depth_or_array_layers: 1,
        },
    );
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    params: &wgpu::Buffer,
    image_view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
    curve_view: &wgpu::TextureView,
    levels_view: &wgpu::TextureView,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("viewport_image_bg"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: params.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(image_view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(curve_view),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: wgpu::BindingResource::TextureView(levels_view),
            },
        ],
    })
}
