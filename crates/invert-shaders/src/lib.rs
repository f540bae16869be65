//! Built-in mesh shaders.
//!
//! GLSL sources live in `shaders/` and are compiled to SPIR-V at build time
//! with shaderc. Every module is entered at `main`.

use std::sync::OnceLock;

/// Embedded SPIR-V (raw bytes, may not be aligned).
mod spirv_bytes {
    pub static MESH_VERT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/mesh_vert.spv"));
    pub static MESH_POSITION_VERT: &[u8] =
        include_bytes!(concat!(env!("OUT_DIR"), "/mesh_position_vert.spv"));
    pub static MESH_FRAG: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/mesh_frag.spv"));
}

/// Repack bytes into words. shaderc always emits whole words.
fn bytes_to_spirv(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

static MESH_VERT: OnceLock<Vec<u32>> = OnceLock::new();
static MESH_POSITION_VERT: OnceLock<Vec<u32>> = OnceLock::new();
static MESH_FRAG: OnceLock<Vec<u32>> = OnceLock::new();

/// Vertex shader reading position (location 0) and color (location 1).
pub fn mesh_vertex_shader() -> &'static [u32] {
    MESH_VERT.get_or_init(|| bytes_to_spirv(spirv_bytes::MESH_VERT))
}

/// Vertex shader reading position only; color is derived from position.
pub fn mesh_position_vertex_shader() -> &'static [u32] {
    MESH_POSITION_VERT.get_or_init(|| bytes_to_spirv(spirv_bytes::MESH_POSITION_VERT))
}

pub fn mesh_fragment_shader() -> &'static [u32] {
    MESH_FRAG.get_or_init(|| bytes_to_spirv(spirv_bytes::MESH_FRAG))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_shaders_are_spirv() {
        for shader in [
            mesh_vertex_shader(),
            mesh_position_vertex_shader(),
            mesh_fragment_shader(),
        ] {
            assert_eq!(shader[0], 0x0723_0203, "Invalid SPIR-V magic number");
            assert!(shader.len() > 20, "Shader too small");
        }
    }

    #[test]
    fn byte_repacking_is_little_endian() {
        assert_eq!(
            bytes_to_spirv(&[0x03, 0x02, 0x23, 0x07, 1, 0, 0, 0]),
            vec![0x0723_0203, 1]
        );
    }
}
