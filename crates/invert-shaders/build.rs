//! Compiles the built-in mesh shaders from GLSL to SPIR-V.

use std::env;
use std::fs;
use std::path::Path;

use shaderc::{Compiler, ShaderKind};

const SHADERS: &[(&str, &str, ShaderKind)] = &[
    ("mesh.vert", "mesh_vert.spv", ShaderKind::Vertex),
    ("mesh_position.vert", "mesh_position_vert.spv", ShaderKind::Vertex),
    ("mesh.frag", "mesh_frag.spv", ShaderKind::Fragment),
];

fn main() {
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    let shader_dir = Path::new("shaders");

    println!("cargo:rerun-if-changed=shaders/");

    let compiler = Compiler::new().expect("Failed to create shader compiler");
    for (source, output, kind) in SHADERS {
        compile_shader(
            &compiler,
            &shader_dir.join(source),
            &Path::new(&out_dir).join(output),
            *kind,
        );
    }
}

fn compile_shader(compiler: &Compiler, input: &Path, output: &Path, kind: ShaderKind) {
    let source = fs::read_to_string(input)
        .unwrap_or_else(|e| panic!("Failed to read shader {}: {e}", input.display()));
    let file_name = input.file_name().and_then(|name| name.to_str()).unwrap_or("shader");

    let mut options = shaderc::CompileOptions::new().expect("Failed to create compile options");
    options.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_3 as u32,
    );
    options.set_target_spirv(shaderc::SpirvVersion::V1_6);
    options.set_optimization_level(shaderc::OptimizationLevel::Performance);

    let result = compiler
        .compile_into_spirv(&source, kind, file_name, "main", Some(&options))
        .unwrap_or_else(|e| panic!("Failed to compile shader {}: {e}", input.display()));

    if result.get_num_warnings() > 0 {
        println!(
            "cargo:warning={}: {}",
            input.display(),
            result.get_warning_messages()
        );
    }

    fs::write(output, bytemuck::cast_slice::<u32, u8>(result.as_binary()))
        .unwrap_or_else(|e| panic!("Failed to write shader {}: {e}", output.display()));
}
