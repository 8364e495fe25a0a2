use std::{env, fs, path::PathBuf};

// Vertex input shared by both mesh pipelines (stride 32):
//   - binding 0, location 0: R32G32B32_SFLOAT (pos)
//   - binding 0, location 1: R32G32B32_SFLOAT (normal)
//   - binding 0, location 2: R32G32_SFLOAT (uv)
// The instanced variant adds one mat4 per instance on binding 1, locations 3..=6.
const PUSH_BLOCK: &str = r#"
layout(push_constant) uniform Push {
    mat4 viewProj;
    vec4 baseColor;
    float metallic;
    float roughness;
} pc;
"#;

const MESH_VERT: &str = r#"
layout(location = 0) in vec3 inPos;
layout(location = 1) in vec3 inNormal;
layout(location = 2) in vec2 inUv;

layout(location = 0) out vec3 vWorldPos;
layout(location = 1) out vec3 vNormal;
layout(location = 2) out vec2 vUv;

void main() {
    vWorldPos = inPos;
    vNormal = inNormal;
    vUv = inUv;
    gl_Position = pc.viewProj * vec4(inPos, 1.0);
}
"#;

const MESH_INSTANCED_VERT: &str = r#"
layout(location = 0) in vec3 inPos;
layout(location = 1) in vec3 inNormal;
layout(location = 2) in vec2 inUv;
layout(location = 3) in mat4 inModel;

layout(location = 0) out vec3 vWorldPos;
layout(location = 1) out vec3 vNormal;
layout(location = 2) out vec2 vUv;

void main() {
    vec4 world = inModel * vec4(inPos, 1.0);
    vWorldPos = world.xyz;
    vNormal = mat3(inModel) * inNormal;
    vUv = inUv;
    gl_Position = pc.viewProj * world;
}
"#;

// Light block layout matches cubic_math::LightBlock (std140).
const MESH_FRAG: &str = r#"
layout(location = 0) in vec3 vWorldPos;
layout(location = 1) in vec3 vNormal;
layout(location = 2) in vec2 vUv;

struct Light {
    vec4 positionKind;
    vec4 directionRange;
    vec4 colorIntensity;
};

layout(std140, set = 0, binding = 0) uniform Lights {
    uint count;
    Light lights[8];
} ub;

layout(location = 0) out vec4 outColor;

vec3 toLight(Light l, vec3 pos, out float atten) {
    int kind = int(l.positionKind.w + 0.5);
    if (kind == 0) {
        atten = 1.0;
        return normalize(-l.directionRange.xyz);
    }
    vec3 d = l.positionKind.xyz - pos;
    float dist = length(d);
    float falloff = clamp(1.0 - dist / max(l.directionRange.w, 1e-4), 0.0, 1.0);
    atten = falloff * falloff;
    vec3 dir = d / max(dist, 1e-4);
    if (kind == 2) {
        atten *= smoothstep(0.80, 0.95, dot(-dir, normalize(l.directionRange.xyz)));
    }
    return dir;
}

void main() {
    vec3 n = normalize(vNormal);
    vec3 albedo = pc.baseColor.rgb * (1.0 - pc.metallic);
    vec3 color = 0.03 * pc.baseColor.rgb;
    uint count = min(ub.count, 8u);
    for (uint i = 0u; i < count; ++i) {
        float atten;
        vec3 l = toLight(ub.lights[i], vWorldPos, atten);
        float ndl = max(dot(n, l), 0.0);
        vec3 radiance = ub.lights[i].colorIntensity.rgb * ub.lights[i].colorIntensity.a * atten;
        float spec = pow(ndl, mix(64.0, 4.0, pc.roughness)) * mix(0.04, 1.0, pc.metallic);
        color += (albedo * ndl + pc.baseColor.rgb * spec) * radiance;
    }
    outColor = vec4(color, pc.baseColor.a);
}
"#;

fn main() {
    let out = PathBuf::from(env::var("OUT_DIR").unwrap());

    let comp = shaderc::Compiler::new().unwrap();
    let mut opts = shaderc::CompileOptions::new().unwrap();
    opts.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_0 as u32,
    );
    opts.set_optimization_level(shaderc::OptimizationLevel::Performance);

    let shaders = [
        ("mesh.vert", shaderc::ShaderKind::Vertex, MESH_VERT),
        ("mesh_instanced.vert", shaderc::ShaderKind::Vertex, MESH_INSTANCED_VERT),
        ("mesh.frag", shaderc::ShaderKind::Fragment, MESH_FRAG),
    ];
    for (name, kind, body) in shaders {
        let src = format!("#version 450\n{PUSH_BLOCK}{body}");
        let spv = comp
            .compile_into_spirv(&src, kind, name, "main", Some(&opts))
            .unwrap_or_else(|e| panic!("{name}: {e}"));
        fs::write(out.join(format!("{name}.spv")), spv.as_binary_u8()).unwrap();
    }

    // Re-run if this file changes (inline sources live here)
    println!("cargo:rerun-if-changed=build.rs");
}
