//! Application configuration.

use std::path::PathBuf;

use anyhow::Context;
use invert_gpu::{load_shader_binary, ShaderCode, UploadStrategy, VertexLayout};
use invert_platform::PlatformConfig;
use invert_render::RendererConfig;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Window title, also used as the Vulkan application name.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
    /// Compiled SPIR-V module exporting `vertexShader`,
    /// `vertexShaderPosition` and `fragmentShader`. The built-in shaders
    /// when unset.
    pub shader_path: Option<PathBuf>,
    /// Mesh to draw; the demo cube when unset.
    pub mesh_path: Option<PathBuf>,
    /// Vertex format uploaded and read by the pipeline.
    pub vertex_layout: VertexLayout,
    pub upload: UploadStrategy,
    pub frames_in_flight: usize,
    pub clear_color: [f32; 4],
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Invert".to_string(),
            width: 1280,
            height: 720,
            validation: cfg!(debug_assertions),
            shader_path: None,
            mesh_path: None,
            vertex_layout: VertexLayout::PositionColor,
            upload: UploadStrategy::Direct,
            frames_in_flight: 2,
            clear_color: [0.02, 0.02, 0.04, 1.0],
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_shader_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.shader_path = Some(path.into());
        self
    }

    pub fn with_mesh_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.mesh_path = Some(path.into());
        self
    }

    pub fn with_vertex_layout(mut self, layout: VertexLayout) -> Self {
        self.vertex_layout = layout;
        self
    }

    pub fn with_upload(mut self, upload: UploadStrategy) -> Self {
        self.upload = upload;
        self
    }

    /// Frames the CPU may record ahead of the GPU; clamped to at least 1.
    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames.max(1);
        self
    }

    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    pub(crate) fn platform(&self) -> PlatformConfig {
        PlatformConfig {
            title: self.title.clone(),
            width: self.width,
            height: self.height,
            resizable: true,
        }
    }

    /// The configured shader module, or the built-in pair for the layout.
    pub(crate) fn shader(&self) -> anyhow::Result<ShaderCode> {
        match &self.shader_path {
            Some(path) => {
                let code = load_shader_binary(path)
                    .with_context(|| format!("loading shader {}", path.display()))?;
                Ok(ShaderCode::Combined(code))
            }
            None => {
                let vertex = match self.vertex_layout {
                    VertexLayout::Position => invert_shaders::mesh_position_vertex_shader(),
                    VertexLayout::PositionColor => invert_shaders::mesh_vertex_shader(),
                };
                Ok(ShaderCode::Split {
                    vertex: vertex.to_vec(),
                    fragment: invert_shaders::mesh_fragment_shader().to_vec(),
                })
            }
        }
    }

    pub(crate) fn renderer(&self, shader: ShaderCode) -> RendererConfig {
        RendererConfig {
            vertex_layout: self.vertex_layout,
            frames_in_flight: self.frames_in_flight,
            upload: self.upload,
            clear_color: self.clear_color,
            ..RendererConfig::new(shader)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert!(config.shader_path.is_none());
        assert_eq!(config.vertex_layout, VertexLayout::PositionColor);
        assert_eq!(config.frames_in_flight, 2);
        assert_eq!(config.upload, UploadStrategy::Direct);
        assert!(config.mesh_path.is_none());
        assert_eq!(config.validation, cfg!(debug_assertions));
    }

    #[test]
    fn builder_overrides_and_conversions() {
        let config = AppConfig::new("viewer")
            .with_size(640, 480)
            .with_mesh_path("teapot.obj")
            .with_upload(UploadStrategy::Staged)
            .with_vertex_layout(VertexLayout::Position)
            .with_frames_in_flight(0);

        assert_eq!(config.frames_in_flight, 1);

        let platform = config.platform();
        assert_eq!(platform.title, "viewer");
        assert_eq!((platform.width, platform.height), (640, 480));

        let renderer = config.renderer(ShaderCode::Combined(vec![0x0723_0203]));
        assert_eq!(renderer.upload, UploadStrategy::Staged);
        assert_eq!(renderer.frames_in_flight, 1);
        assert_eq!(renderer.vertex_layout, VertexLayout::Position);
        assert_eq!(renderer.shader, ShaderCode::Combined(vec![0x0723_0203]));
    }

    #[test]
    fn built_in_shader_follows_vertex_layout() {
        let color = AppConfig::default().shader().unwrap();
        let position = AppConfig::default()
            .with_vertex_layout(VertexLayout::Position)
            .shader()
            .unwrap();

        let split = |shader: ShaderCode| match shader {
            ShaderCode::Split { vertex, fragment } => (vertex, fragment),
            ShaderCode::Combined(_) => panic!("built-in shaders are split per stage"),
        };
        let (color_vertex, color_fragment) = split(color);
        let (position_vertex, position_fragment) = split(position);
        assert_ne!(color_vertex, position_vertex);
        assert_eq!(color_fragment, position_fragment);
        assert_eq!(color_vertex[0], 0x0723_0203);
    }

    #[test]
    fn missing_shader_file_is_reported() {
        let err = AppConfig::default()
            .with_shader_path("does/not/exist.spv")
            .shader()
            .unwrap_err();
        assert!(format!("{err:#}").contains("does/not/exist.spv"));
    }
}
