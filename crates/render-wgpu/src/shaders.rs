/// Frame uniforms, light record and the point-light formula shared by every
/// shader module. Mirrors `lumen_render::shading`.
pub const COMMON: &str = r#"
struct Frame {
    view: mat4x4<f32>,
    inverse_view: mat4x4<f32>,
    projection: mat4x4<f32>,
    view_projection: mat4x4<f32>,
    camera_position: vec3<f32>,
    near_clip: f32,
    ambient_color: vec3<f32>,
    light_count: u32,
    viewport_size: vec2<f32>,
    _pad: vec2<f32>,
};

struct PointLight {
    position: vec3<f32>,
    radius: f32,
    color: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> frame: Frame;

@group(0) @binding(1)
var<storage, read> lights: array<PointLight>;

const SPECULAR_POWER: f32 = 32.0;

fn point_light(position: vec3<f32>, normal: vec3<f32>, diffuse: vec3<f32>, specular: f32,
               light_position: vec3<f32>, radius: f32, color: vec3<f32>) -> vec3<f32> {
    let to_light = light_position - position;
    let dist = length(to_light);
    if dist >= radius || dist <= 1.0e-7 {
        return vec3<f32>(0.0);
    }
    let l = to_light / dist;
    let n_dot_l = dot(normal, l);
    if n_dot_l <= 0.0 {
        return vec3<f32>(0.0);
    }
    let attenuation = 1.0 - dist / radius;
    let v = normalize(frame.camera_position - position);
    let h = normalize(l + v);
    let highlight = pow(max(dot(normal, h), 0.0), SPECULAR_POWER) * specular;
    return color * attenuation * (diffuse * n_dot_l + vec3<f32>(highlight));
}

// Corner of a unit quad from the vertex index of a 4-vertex triangle strip.
fn strip_corner(index: u32) -> vec2<f32> {
    return vec2<f32>(f32(index & 1u), f32(index >> 1u)) * 2.0 - 1.0;
}
"#;

/// Scene geometry: forward pixel lighting, ambient-only backdrop and G-buffer fill.
pub const MESH_SHADER: &str = r#"
struct Object {
    world: mat4x4<f32>,
    // rgb diffuse, a specular strength
    material: vec4<f32>,
};

@group(1) @binding(0)
var<uniform> object: Object;

struct MeshVertex {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

struct MeshOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
};

@vertex
fn vs_mesh(vertex: MeshVertex) -> MeshOutput {
    let world_pos = object.world * vec4<f32>(vertex.position, 1.0);
    var out: MeshOutput;
    out.clip_position = frame.view_projection * world_pos;
    out.world_position = world_pos.xyz;
    out.world_normal = normalize((object.world * vec4<f32>(vertex.normal, 0.0)).xyz);
    return out;
}

@fragment
fn fs_pixel_lit(in: MeshOutput) -> @location(0) vec4<f32> {
    let n = normalize(in.world_normal);
    let diffuse = object.material.rgb;
    var color = diffuse * frame.ambient_color;
    for (var i = 0u; i < frame.light_count; i++) {
        let light = lights[i];
        color += point_light(in.world_position, n, diffuse, object.material.a,
                             light.position, light.radius, light.color.rgb);
    }
    return vec4<f32>(color, 1.0);
}

@fragment
fn fs_background(in: MeshOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(object.material.rgb * frame.ambient_color, 1.0);
}

struct GBufferOutput {
    @location(0) diffuse_specular: vec4<f32>,
    @location(1) normal: vec4<f32>,
    @location(2) position: vec4<f32>,
};

@fragment
fn fs_gbuffer(in: MeshOutput) -> GBufferOutput {
    var out: GBufferOutput;
    out.diffuse_specular = object.material;
    out.normal = vec4<f32>(normalize(in.world_normal), 0.0);
    out.position = vec4<f32>(in.world_position, 0.0);
    return out;
}
"#;

/// Ambient resolve and per-light accumulation, both reading the G-buffer.
pub const RESOLVE_SHADER: &str = r#"
@group(1) @binding(0)
var gbuffer_diffuse: texture_2d<f32>;
@group(1) @binding(1)
var gbuffer_normal: texture_2d<f32>;
@group(1) @binding(2)
var gbuffer_position: texture_2d<f32>;

@vertex
fn vs_fullscreen(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    return vec4<f32>(strip_corner(index), 0.0, 1.0);
}

@fragment
fn fs_ambient(@builtin(position) frag: vec4<f32>) -> @location(0) vec4<f32> {
    let diffuse = textureLoad(gbuffer_diffuse, vec2<i32>(frag.xy), 0);
    return vec4<f32>(diffuse.rgb * frame.ambient_color, 1.0);
}

struct LightInput {
    @location(0) position: vec3<f32>,
    @location(1) radius: f32,
    @location(2) color: vec4<f32>,
};

struct LightOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) @interpolate(flat) light_position: vec3<f32>,
    @location(1) @interpolate(flat) radius: f32,
    @location(2) @interpolate(flat) color: vec3<f32>,
};

// Expand a light point into a view-aligned quad covering its sphere of
// influence; full screen when the camera is inside or near the sphere.
@vertex
fn vs_light(@builtin(vertex_index) index: u32, light: LightInput) -> LightOutput {
    let corner = strip_corner(index);
    let c = (frame.view * vec4<f32>(light.position, 1.0)).xyz;
    let r = light.radius;
    var out: LightOutput;
    if c.z - r <= frame.near_clip * 1.01 {
        out.clip_position = vec4<f32>(corner, 0.0, 1.0);
    } else {
        let front = c.z - r;
        let shrink = front / (c.z + r);
        let lo = min(c.xy - vec2<f32>(r), (c.xy - vec2<f32>(r)) * shrink);
        let hi = max(c.xy + vec2<f32>(r), (c.xy + vec2<f32>(r)) * shrink);
        let xy = mix(lo, hi, corner * 0.5 + 0.5);
        out.clip_position = frame.projection * vec4<f32>(xy, front, 1.0);
    }
    out.light_position = light.position;
    out.radius = r;
    out.color = light.color.rgb;
    return out;
}

@fragment
fn fs_light(in: LightOutput) -> @location(0) vec4<f32> {
    let pixel = vec2<i32>(in.clip_position.xy);
    let normal = textureLoad(gbuffer_normal, pixel, 0).xyz;
    if all(normal == vec3<f32>(0.0)) {
        discard;
    }
    let diffuse = textureLoad(gbuffer_diffuse, pixel, 0);
    let position = textureLoad(gbuffer_position, pixel, 0).xyz;
    let color = point_light(position, normal, diffuse.rgb, diffuse.a,
                            in.light_position, in.radius, in.color);
    return vec4<f32>(color, 0.0);
}
"#;

/// Camera-facing flare sprites, one per light.
pub const FLARE_SHADER: &str = r#"
const FLARE_SCALE: f32 = 0.15;

@group(1) @binding(0)
var flare_texture: texture_2d<f32>;
@group(1) @binding(1)
var flare_sampler: sampler;

struct FlareInput {
    @location(0) position: vec3<f32>,
    @location(1) radius: f32,
    @location(2) color: vec4<f32>,
};

struct FlareOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) @interpolate(flat) color: vec3<f32>,
};

@vertex
fn vs_flare(@builtin(vertex_index) index: u32, light: FlareInput) -> FlareOutput {
    let corner = strip_corner(index);
    let right = frame.inverse_view[0].xyz;
    let up = frame.inverse_view[1].xyz;
    let half_size = light.radius * FLARE_SCALE;
    let world = light.position + (right * corner.x + up * corner.y) * half_size;
    var out: FlareOutput;
    out.clip_position = frame.view_projection * vec4<f32>(world, 1.0);
    out.uv = corner * vec2<f32>(0.5, -0.5) + 0.5;
    out.color = light.color.rgb;
    return out;
}

@fragment
fn fs_flare(in: FlareOutput) -> @location(0) vec4<f32> {
    let intensity = textureSample(flare_texture, flare_sampler, in.uv).r;
    return vec4<f32>(in.color * intensity, 0.0);
}
"#;

/// Prepend the shared declarations to a shader body.
pub fn module_source(body: &str) -> String {
    format!("{COMMON}\n{body}")
}
