//! Invert mesh viewer
//!
//! Draws a single mesh (a colored cube by default) with depth testing and
//! recreates the swapchain as the window is resized.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p invert-viewer -- [OPTIONS]
//! ```
//!
//! ## Options
//!
//! - `--shader <PATH>`: Compiled SPIR-V module built from assets/shaders/mesh.slang
//!   (default: the built-in shaders)
//! - `--mesh <PATH>`: Text mesh with `v` and `f` records (default: demo cube)
//! - `--staged`: Upload geometry through a staging buffer into device-local memory
//! - `--position-only`: Upload positions only and shade by position
//! - `--frames-in-flight <N>`: Frames recorded ahead of the GPU (default: 2)
//! - `--validation`, `--no-validation`: Toggle Vulkan validation layers
//! - `-h, --help`: Print help message
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod args;

use invert_app::{run_app, AppConfig};

use crate::args::Command;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;

fn main() -> anyhow::Result<()> {
    let config = AppConfig::new("Invert Mesh Viewer").with_size(WIDTH, HEIGHT);

    match args::parse(std::env::args().skip(1), config)? {
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Run(config) => run_app(config),
    }
}

fn print_help() {
    eprintln!(
        "Invert mesh viewer

USAGE:
    cargo run -p invert-viewer -- [OPTIONS]

OPTIONS:
    --shader <PATH>           Compiled SPIR-V module with vertexShader,
                              vertexShaderPosition and fragmentShader
                              (see assets/shaders/mesh.slang); default: built-in
    --mesh <PATH>             Text mesh (v/f records); default: built-in cube
    --staged                  Upload geometry via staging buffer to device-local memory
    --position-only           Upload positions only and shade by position
    --frames-in-flight <N>    Frames recorded ahead of the GPU (default: 2)
    --validation              Enable Vulkan validation layers
    --no-validation           Disable Vulkan validation layers
    -h, --help                Print this help message

EXAMPLES:
    # Spinning cube
    cargo run -p invert-viewer

    # Custom mesh through the transfer queue
    cargo run -p invert-viewer -- --mesh assets/meshes/tetrahedron.obj --staged

ENVIRONMENT VARIABLES:
    RUST_LOG                  Set log level (e.g., info, debug, trace)"
    );
}
