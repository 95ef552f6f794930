//! GLSL sources for the hexagonal background.
//!
//! The fragment stage is mirrored line for line by [`crate::field`]; any
//! change to a constant or step here has to land there as well.

use std::borrow::Cow;

/// Name of the `vec2` uniform carrying the surface size in pixels.
pub const RESOLUTION_UNIFORM: &str = "resolution";
/// Name of the `float` uniform carrying elapsed seconds.
pub const TIME_UNIFORM: &str = "time";

/// The two stage sources handed to the bootstrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSources {
    pub vertex: Cow<'static, str>,
    pub fragment: Cow<'static, str>,
}

impl ShaderSources {
    /// The bundled pass-through vertex stage and hexagon fragment stage.
    pub fn bundled() -> Self {
        Self {
            vertex: Cow::Borrowed(VERTEX_SHADER_GLSL),
            fragment: Cow::Borrowed(FRAGMENT_SHADER_GLSL),
        }
    }

    /// Bundled vertex stage paired with a caller-provided fragment stage.
    pub fn with_fragment(fragment: impl Into<Cow<'static, str>>) -> Self {
        Self {
            vertex: Cow::Borrowed(VERTEX_SHADER_GLSL),
            fragment: fragment.into(),
        }
    }
}

impl Default for ShaderSources {
    fn default() -> Self {
        Self::bundled()
    }
}

/// Pass-through vertex stage for the full-screen triangle strip.
pub const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) in vec2 position;

void main() {
    gl_Position = vec4(position, 0.0, 1.0);
}
";

/// Procedural hexagon field.
pub const FRAGMENT_SHADER_GLSL: &str = r"#version 450
layout(location = 0) out vec4 fragColor;

layout(std140, set = 0, binding = 0) uniform HexfieldParams {
    vec2 resolution;
    float time;
} params;

const float CYCLE = 20.0;
const float TAU = 6.2831853;
const float PI = 3.14159265;
const float HALF_PI = 1.57079633;
const float SQRT3 = 1.7320508;
const vec2 HEX_R = vec2(1.0, 1.7320508);
const float HEX_CIRCUMRADIUS = 0.57735027;

const float ZOOM_BASE = 4.0;
const float ZOOM_SWING = 0.6;
const float DRIFT_AMPLITUDE = 0.75;
const float AA_PIXELS = 3.0;

// Seam tests: positive x scales y by sqrt(3), negative x scales x by a
// truncated 1/sqrt(3).
const float WEDGE_SCALE_POS = 1.7320508;
const float WEDGE_SLOPE_NEG = 0.577;

const float GRID = 4.0;
const float BEVEL_MIN = 0.12;
const float BEVEL_MAX = 0.32;
const float BORDER_ORBIT = 1.5;

const float RADIUS_MIN = 0.12;
const float RADIUS_MAX = 0.26;
const float LIFT = 0.08;
const float REST_PULSE = 0.15;
const float RING_WIDTH = 0.015;
const float NOISE_SCALE = 9.0;
const float NOISE_ORBIT = 3.0;

const vec3 BORDER_BASE = vec3(0.06, 0.09, 0.16);
const vec3 BEVEL_A = vec3(0.12, 0.17, 0.28);
const vec3 BEVEL_B = vec3(0.16, 0.22, 0.36);
const vec3 BEVEL_HIGHLIGHT = vec3(0.35, 0.45, 0.65);
const vec3 SPHERE_BASE = vec3(0.10, 0.45, 0.85);
const vec3 SPHERE_GLOW = vec3(0.75, 0.90, 1.10);
const vec3 RING_COLOR = vec3(0.55, 0.80, 1.00);

float hash21(vec2 p) {
    return fract(sin(dot(p, vec2(127.1, 311.7))) * 43758.5453);
}

float value_noise(vec2 p) {
    vec2 i = floor(p);
    vec2 f = fract(p);
    vec2 u = f * f * (3.0 - 2.0 * f);
    float a = hash21(i);
    float b = hash21(i + vec2(1.0, 0.0));
    float c = hash21(i + vec2(0.0, 1.0));
    float d = hash21(i + vec2(1.0, 1.0));
    return mix(mix(a, b, u.x), mix(c, d, u.x), u.y);
}

float soft_edge(float edge, float d, float aa) {
    return 1.0 - smoothstep(edge - 0.5 * aa, edge + 0.5 * aa, d);
}

// xy: offset from the cell center, zw: cell center.
vec4 hex_cell(vec2 p) {
    vec2 h = HEX_R * 0.5;
    vec2 a = mod(p, HEX_R) - h;
    vec2 b = mod(p - h, HEX_R) - h;
    vec2 local_offset = b;
    if (dot(a, a) < dot(b, b)) {
        local_offset = a;
    }
    return vec4(local_offset, p - local_offset);
}

int classify_wedge(vec2 l) {
    if (l.x >= 0.0) {
        if (l.y * WEDGE_SCALE_POS >= -l.x) {
            return 1;
        }
        return 3;
    }
    if (l.y >= l.x * WEDGE_SLOPE_NEG) {
        return 2;
    }
    return 3;
}

vec2 wedge_uv(vec2 l, int wedge) {
    if (wedge == 1) {
        return vec2(2.0 * l.x, l.y * SQRT3 + l.x);
    }
    if (wedge == 2) {
        return vec2(-2.0 * l.x, l.y * SQRT3 - l.x);
    }
    return vec2(l.x - l.y * SQRT3, -l.x - l.y * SQRT3);
}

float wedge_shade(int wedge) {
    if (wedge == 1) {
        return 1.0;
    }
    if (wedge == 2) {
        return 0.82;
    }
    return 0.64;
}

vec2 neighbor_offset(int i) {
    if (i == 0) {
        return vec2(0.0, 0.0);
    }
    if (i == 1) {
        return vec2(1.0, 0.0);
    }
    if (i == 2) {
        return vec2(0.0, 1.0);
    }
    return vec2(1.0, 1.0);
}

vec3 bevel_block(vec2 f, float bevel, float aa) {
    float left_edge = soft_edge(bevel, f.x, aa);
    float top_edge = 1.0 - soft_edge(1.0 - bevel, f.y, aa);
    vec3 col = BORDER_BASE;
    col = mix(col, BEVEL_A, left_edge);
    col = mix(col, BEVEL_B, top_edge);
    col = mix(col, BEVEL_HIGHLIGHT, left_edge * top_edge);
    return col;
}

vec3 border_layer(vec2 uv, vec2 seed, float angle, float aa) {
    vec2 g = uv * GRID;
    vec2 q = floor(g);
    vec2 f = g - q;
    vec2 orbit = BORDER_ORBIT * vec2(cos(angle), sin(angle));
    vec3 acc = vec3(0.0);
    for (int i = 0; i < 4; i++) {
        vec2 o = neighbor_offset(i);
        float n = value_noise(q + o + seed + orbit);
        float bevel = mix(BEVEL_MIN, BEVEL_MAX, n);
        vec2 w = mix(1.0 - f, f, o);
        acc += w.x * w.y * bevel_block(f, bevel, aa);
    }
    return acc;
}

// x: radius, y: vertical lift.
vec2 glyph_shape(float t, float cell_hash) {
    float phase = mod(mod(t, CYCLE) + cell_hash * CYCLE, CYCLE);
    float seg = CYCLE * 0.25;
    if (phase < seg) {
        float s = sin(phase / seg * HALF_PI);
        return vec2(mix(RADIUS_MIN, RADIUS_MAX, s), 0.0);
    }
    if (phase < 2.0 * seg) {
        return vec2(RADIUS_MAX, LIFT * sin((phase - seg) / seg * PI));
    }
    if (phase < 3.0 * seg) {
        float s = sin((phase - 2.0 * seg) / seg * HALF_PI);
        return vec2(mix(RADIUS_MAX, RADIUS_MIN, s), 0.0);
    }
    return vec2(RADIUS_MIN * (1.0 + REST_PULSE * sin((phase - 3.0 * seg) / seg * PI)), 0.0);
}

vec4 glyph_layer(vec2 l, vec2 seed, float cell_hash, float t, float angle, float aa) {
    vec2 shape = glyph_shape(t, cell_hash);
    float r = shape.x;
    vec2 c = vec2(0.0, shape.y);
    float d = length(l - c);
    float disk = soft_edge(r, d, aa);
    float ring = soft_edge(RING_WIDTH, abs(d - r), aa);
    vec2 glow_center = c + vec2(-0.3, 0.3) * r;
    float glow = soft_edge(0.45 * r, length(l - glow_center), aa);
    vec2 orbit = NOISE_ORBIT * vec2(cos(angle), sin(angle));
    float n = value_noise(l * NOISE_SCALE + seed + orbit);
    vec3 col = SPHERE_BASE + SPHERE_GLOW * glow * (0.35 + 0.65 * n);
    col = mix(col, RING_COLOR, ring);
    return vec4(col, max(disk, ring));
}

void main() {
    vec2 resolution = params.resolution;
    vec2 frag = vec2(gl_FragCoord.x, resolution.y - gl_FragCoord.y);
    float short_side = min(resolution.x, resolution.y);
    vec2 uv = (frag - 0.5 * resolution) / short_side;

    float tc = mod(params.time, CYCLE);
    float angle = tc * TAU / CYCLE;
    float zoom = ZOOM_BASE + ZOOM_SWING * sin(angle);
    vec2 drift = DRIFT_AMPLITUDE * vec2(sin(angle), cos(2.0 * angle));
    float aa = AA_PIXELS * zoom / short_side;
    vec2 p = uv * zoom + drift;

    vec4 cell = hex_cell(p);
    vec2 l = cell.xy;
    vec2 cell_index = floor(cell.zw / (HEX_R * 0.5) + 0.5);
    float cell_hash = hash21(cell_index);

    int wedge = classify_wedge(l);
    vec2 seed = cell_index * 7.31 + float(wedge) * 13.7;
    vec2 uv_wedge = wedge_uv(l, wedge);
    float aa_grid = aa * GRID / HEX_CIRCUMRADIUS;
    vec3 border = border_layer(uv_wedge, seed, angle, aa_grid) * wedge_shade(wedge);

    vec4 glyph = glyph_layer(l, cell_index * 3.1, cell_hash, tc, angle, aa);
    vec3 color = mix(border, glyph.rgb, glyph.a);
    fragColor = vec4(color, 1.0);
}
";
