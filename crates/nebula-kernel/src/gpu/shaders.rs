//! WGSL programs of the particle field and their uniform block.
//!
//! Both programs share one uniform layout, [`FieldUniforms`], at group 0
//! binding 0. The math matches [`super::shading`].

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

/// Uniform block shared by the point and nebula programs.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FieldUniforms {
    /// Model-view matrix (column major).
    pub model_view: [[f32; 4]; 4],
    /// Projection matrix (column major).
    pub projection: [[f32; 4]; 4],
    /// Drawing surface size in pixels.
    pub viewport: [f32; 2],
    /// Time in seconds.
    pub time: f32,
    /// Device pixels per sprite pixel.
    pub pixel_ratio: f32,
}

impl FieldUniforms {
    /// Builds the block from matrices and frame parameters.
    #[must_use]
    pub fn new(model_view: Mat4, projection: Mat4, viewport: (u32, u32), time: f32) -> Self {
        Self {
            model_view: model_view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
            viewport: [viewport.0.max(1) as f32, viewport.1.max(1) as f32],
            time,
            pixel_ratio: 1.0,
        }
    }

    /// Same block with a different pixel ratio.
    #[must_use]
    pub fn with_pixel_ratio(mut self, ratio: f32) -> Self {
        self.pixel_ratio = ratio;
        self
    }
}

/// Instanced point sprites.
///
/// Each instance is one point; six generated vertices form a quad sized
/// in pixels like a GL point sprite and turned by the point's rotation seed.
pub const POINT_SHADER: &str = r"
struct Uniforms {
    model_view: mat4x4<f32>,
    projection: mat4x4<f32>,
    viewport: vec2<f32>,
    time: f32,
    pixel_ratio: f32,
}

@group(0) @binding(0) var<uniform> scene: Uniforms;

struct VertexInput {
    @builtin(vertex_index) corner: u32,
    @location(0) position: vec3<f32>,
    @location(1) color: vec3<f32>,
    @location(2) size: f32,
    @location(3) rotation: f32,
}

struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) color: vec3<f32>,
    @location(1) coord: vec2<f32>,
}

// Quad corners in units of half the sprite size
fn corner_offset(i: u32) -> vec2<f32> {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, 1.0),
    );
    return corners[i];
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let t = scene.time;
    let p = in.position;

    let drift = sin(p.x * 0.05 + t) * cos(p.y * 0.05 + t) * sin(p.z * 0.05 + t) * 10.0;
    var pos = p;
    pos.x += sin(t * 0.5 + p.z * 0.02) * 10.0;
    pos.y += cos(t * 0.4 + p.x * 0.01) * 10.0;
    pos.z += drift;

    let mv = scene.model_view * vec4<f32>(pos, 1.0);
    let size_px = in.size * (300.0 / -mv.z) * scene.pixel_ratio;
    let clip = scene.projection * mv;

    let c = corner_offset(in.corner);
    let cs = cos(in.rotation);
    let sn = sin(in.rotation);
    let turned = vec2<f32>(c.x * cs - c.y * sn, c.x * sn + c.y * cs);

    // Half size in pixels to clip units, undoing the perspective divide
    let offset = turned * size_px / scene.viewport * clip.w;
    out.clip = vec4<f32>(clip.xy + offset, clip.zw);
    out.color = in.color;
    out.coord = c * 0.5 + vec2<f32>(0.5, 0.5);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let t = scene.time;
    let dist = max(length(in.coord - vec2<f32>(0.5, 0.5)), 0.0001);

    var strength = 0.05 / dist;
    strength *= 1.0 + 0.3 * sin(t * 2.0);

    var color = in.color;
    color.r += 0.2 * sin(t * 2.0 + in.color.g * 5.0);
    color.g += 0.2 * cos(t * 1.5 + in.color.b * 5.0);
    color.b += 0.2 * sin(t + in.color.r * 5.0);

    let hue = t * 0.1 + dist * 2.0;
    let glow = 0.5 + 0.5 * cos(vec3<f32>(hue, hue + 2.0, hue + 4.0));

    return vec4<f32>(mix(color, glow, vec3<f32>(0.5)) * strength, strength);
}
";

/// Nebula shell: value-noise clouds on the inside of a large sphere.
pub const NEBULA_SHADER: &str = r"
struct Uniforms {
    model_view: mat4x4<f32>,
    projection: mat4x4<f32>,
    viewport: vec2<f32>,
    time: f32,
    pixel_ratio: f32,
}

@group(0) @binding(0) var<uniform> scene: Uniforms;

struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) local: vec3<f32>,
}

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.clip = scene.projection * scene.model_view * vec4<f32>(position, 1.0);
    out.local = position;
    return out;
}

fn rand(n: vec2<f32>) -> f32 {
    return fract(sin(dot(n, vec2<f32>(12.9898, 4.1414))) * 43758.5453);
}

fn noise(p: vec2<f32>) -> f32 {
    let ip = floor(p);
    var u = fract(p);
    u = u * u * (3.0 - 2.0 * u);

    let res = mix(
        mix(rand(ip), rand(ip + vec2<f32>(1.0, 0.0)), u.x),
        mix(rand(ip + vec2<f32>(0.0, 1.0)), rand(ip + vec2<f32>(1.0, 1.0)), u.x),
        u.y
    );
    return res * res;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let q = normalize(in.local) * 5.0;
    let s = scene.time * 0.1;

    let n = noise(vec2<f32>(q.x + s, q.y - s))
        * noise(vec2<f32>(q.z - s, q.x + s))
        * noise(vec2<f32>(q.y + s, q.z - s));

    let c1 = 0.5 + 0.5 * sin(vec3<f32>(s, s + 2.0, s + 4.0));
    let c2 = 0.5 + 0.5 * cos(vec3<f32>(s + 1.0, s + 3.0, s + 5.0));

    var color = mix(c1, c2, vec3<f32>(n));
    if n > 0.7 {
        color += vec3<f32>((n - 0.7) * 3.0);
    }
    return vec4<f32>(color, 0.3 * n);
}
";
