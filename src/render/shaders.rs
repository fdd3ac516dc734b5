//! WGSL sources for the viewport pipelines.
//!
//! The image pass draws one full-viewport triangle and does all geometry in
//! the fragment stage: screen pixel → logical frame → rotation-step remap →
//! perspective/straighten sampling matrix → texture UV. The overlay pass is
//! a plain colored-triangle pipeline fed with pre-built NDC vertices.

/// Uniform layout must stay in sync with `renderer::FrameParams`.
pub const IMAGE_SHADER_SRC: &str = r#"
struct FrameParams {
    view_size: vec2<f32>,
    tex_size: vec2<f32>,
    logical_size: vec2<f32>,
    pan: vec2<f32>,
    scale: f32,
    rotation_steps: f32,
    crop_dim: f32,
    exposure: f32,
    contrast: f32,
    black_point: f32,
    saturation: f32,
    bw_mix: f32,
    grain_amount: f32,
    time_s: f32,
    curve_enabled: f32,
    levels_enabled: f32,
    gain: vec4<f32>,
    crop_rect: vec4<f32>,
    persp_r0: vec4<f32>,
    persp_r1: vec4<f32>,
    persp_r2: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> params: FrameParams;
@group(0) @binding(1)
var t_image: texture_2d<f32>;
@group(0) @binding(2)
var s_image: sampler;
@group(0) @binding(3)
var t_curve: texture_2d<f32>;
@group(0) @binding(4)
var t_levels: texture_2d<f32>;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) idx: u32) -> VertexOutput {
    // One oversized triangle covering the viewport.
    let x = f32(i32(idx & 1u) << 2u) - 1.0;
    let y = f32(i32(idx & 2u) << 1u) - 1.0;
    var out: VertexOutput;
    out.position = vec4<f32>(x, y, 0.0, 1.0);
    out.uv = vec2<f32>(x + 1.0, 1.0 - y) * 0.5;
    return out;
}

// Screen-uv to crop-plane coordinates: undo pan/scale, then the 90-degree
// step remap.
fn crop_plane_coord(uv: vec2<f32>) -> vec2<f32> {
    let screen = uv * params.view_size;
    let half_view = params.view_size * 0.5;
    let pan = vec2<f32>(params.pan.x, -params.pan.y);
    let l = (screen - half_view - pan) / params.scale + params.logical_size * 0.5;
    let ln = l / params.logical_size;
    let steps = i32(params.rotation_steps + 0.5);
    if (steps == 1) {
        return vec2<f32>(1.0 - ln.y, ln.x);
    } else if (steps == 2) {
        return vec2<f32>(1.0 - ln.x, 1.0 - ln.y);
    } else if (steps == 3) {
        return vec2<f32>(ln.y, 1.0 - ln.x);
    }
    return ln;
}

fn sample_uv(c: vec2<f32>) -> vec2<f32> {
    let x = params.persp_r0.x * c.x + params.persp_r0.y * c.y + params.persp_r0.z;
    let y = params.persp_r1.x * c.x + params.persp_r1.y * c.y + params.persp_r1.z;
    var w = params.persp_r2.x * c.x + params.persp_r2.y * c.y + params.persp_r2.z;
    if (abs(w) < 1e-6) {
        w = select(1e-6, -1e-6, w < 0.0);
    }
    return vec2<f32>(x / w, y / w);
}

fn lut_lookup(tex: texture_2d<f32>, rgb: vec3<f32>) -> vec3<f32> {
    let idx = vec3<i32>(clamp(rgb * 255.0 + 0.5, vec3<f32>(0.0), vec3<f32>(255.0)));
    let r = textureLoad(tex, vec2<i32>(idx.r, 0), 0).r;
    let g = textureLoad(tex, vec2<i32>(idx.g, 0), 0).g;
    let b = textureLoad(tex, vec2<i32>(idx.b, 0), 0).b;
    return vec3<f32>(r, g, b);
}

fn grain_noise(p: vec2<f32>, t: f32) -> f32 {
    let s = dot(p + vec2<f32>(t * 17.0, t * 31.0), vec2<f32>(12.9898, 78.233));
    return fract(sin(s) * 43758.5453);
}

const BACKGROUND: vec3<f32> = vec3<f32>(0.08, 0.08, 0.09);

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let c = crop_plane_coord(in.uv);
    let uv = sample_uv(c);
    // No mips are ever allocated, so sampling at level 0 is exact bilinear.
    let texel = textureSampleLevel(t_image, s_image, clamp(uv, vec2<f32>(0.0), vec2<f32>(1.0)), 0.0);
    if (uv.x < 0.0 || uv.x > 1.0 || uv.y < 0.0 || uv.y > 1.0) {
        return vec4<f32>(BACKGROUND, 1.0);
    }

    var rgb = texel.rgb;

    let black = clamp(params.black_point, 0.0, 0.95);
    rgb = clamp((rgb - vec3<f32>(black)) / (1.0 - black), vec3<f32>(0.0), vec3<f32>(1.0));

    rgb = rgb * exp2(clamp(params.exposure, -5.0, 5.0));

    let contrast_gain = 1.0 + clamp(params.contrast, -1.0, 1.0);
    rgb = (rgb - vec3<f32>(0.5)) * contrast_gain + vec3<f32>(0.5);

    rgb = rgb * params.gain.rgb;
    rgb = clamp(rgb, vec3<f32>(0.0), vec3<f32>(1.0));

    let luma = dot(rgb, vec3<f32>(0.2126, 0.7152, 0.0722));
    let sat = 1.0 + clamp(params.saturation, -1.0, 1.0);
    rgb = clamp(mix(vec3<f32>(luma), rgb, sat), vec3<f32>(0.0), vec3<f32>(1.0));

    if (params.bw_mix > 0.0) {
        let l = dot(rgb, vec3<f32>(0.2126, 0.7152, 0.0722));
        rgb = mix(rgb, vec3<f32>(l), clamp(params.bw_mix, 0.0, 1.0));
    }

    if (params.curve_enabled > 0.5) {
        rgb = lut_lookup(t_curve, rgb);
    }
    if (params.levels_enabled > 0.5) {
        rgb = lut_lookup(t_levels, rgb);
    }

    if (params.grain_amount > 0.0) {
        let n = grain_noise(in.uv * params.view_size, params.time_s);
        rgb = rgb + vec3<f32>((n - 0.5) * params.grain_amount * 0.2);
    }

    if (params.crop_dim > 0.0) {
        let half_size = params.crop_rect.zw * 0.5;
        let d = abs(c - params.crop_rect.xy);
        if (d.x > half_size.x || d.y > half_size.y) {
            rgb = rgb * (1.0 - clamp(params.crop_dim, 0.0, 1.0));
        }
    }

    return vec4<f32>(clamp(rgb, vec3<f32>(0.0), vec3<f32>(1.0)), 1.0);
}
"#;

pub const OVERLAY_SHADER_SRC: &str = r#"
struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) color: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.position = vec4<f32>(in.position, 0.0, 1.0);
    out.color = in.color;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;
