//! Pipeline creation and management.

use std::ffi::CStr;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use invert_core::{ColorVertex, PositionVertex};

use crate::error::{GpuError, Result};

/// First word of every SPIR-V module.
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Vertex entry point of a combined module for [`VertexLayout::PositionColor`].
pub const VERTEX_ENTRY: &CStr = c"vertexShader";
/// Vertex entry point of a combined module for [`VertexLayout::Position`].
pub const POSITION_VERTEX_ENTRY: &CStr = c"vertexShaderPosition";
/// Fragment entry point of a combined module.
pub const FRAGMENT_ENTRY: &CStr = c"fragmentShader";
/// Entry point of each module in [`ShaderCode::Split`].
pub const STAGE_ENTRY: &CStr = c"main";

/// SPIR-V for the vertex and fragment stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderCode {
    /// One module exporting the vertex and fragment entry points by name.
    Combined(Vec<u32>),
    /// One module per stage, each entered at [`STAGE_ENTRY`].
    Split { vertex: Vec<u32>, fragment: Vec<u32> },
}

/// Read a precompiled SPIR-V module holding both shader entry points.
pub fn load_shader_binary(path: impl AsRef<Path>) -> Result<Vec<u32>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| GpuError::ShaderLoad {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse_shader_binary(&bytes).map_err(|reason| GpuError::ShaderLoad {
        path: path.display().to_string(),
        reason,
    })
}

/// Decode SPIR-V words from raw bytes, rejecting truncated or foreign data.
pub fn parse_shader_binary(bytes: &[u8]) -> std::result::Result<Vec<u32>, String> {
    let words = ash::util::read_spv(&mut Cursor::new(bytes)).map_err(|e| e.to_string())?;
    match words.first() {
        Some(&SPIRV_MAGIC) => Ok(words),
        Some(&other) => Err(format!("bad magic number {other:#010x}")),
        None => Err("empty shader binary".to_string()),
    }
}

/// Vertex formats the mesh pipeline can consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexLayout {
    /// `vec3 position` at location 0.
    Position,
    /// `vec3 position` at location 0, `vec3 color` at location 1.
    PositionColor,
}

impl VertexLayout {
    pub const fn stride(self) -> u32 {
        match self {
            Self::Position => std::mem::size_of::<PositionVertex>() as u32,
            Self::PositionColor => std::mem::size_of::<ColorVertex>() as u32,
        }
    }

    /// Vertex entry point in a combined module.
    pub const fn combined_vertex_entry(self) -> &'static CStr {
        match self {
            Self::Position => POSITION_VERTEX_ENTRY,
            Self::PositionColor => VERTEX_ENTRY,
        }
    }

    pub fn bindings(self) -> Vec<vk::VertexInputBindingDescription> {
        vec![vk::VertexInputBindingDescription {
            binding: 0,
            stride: self.stride(),
            input_rate: vk::VertexInputRate::VERTEX,
        }]
    }

    pub fn attributes(self) -> Vec<vk::VertexInputAttributeDescription> {
        let position = vk::VertexInputAttributeDescription {
            location: 0,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: 0,
        };
        match self {
            Self::Position => vec![position],
            Self::PositionColor => vec![
                position,
                vk::VertexInputAttributeDescription {
                    location: 1,
                    binding: 0,
                    format: vk::Format::R32G32B32_SFLOAT,
                    offset: std::mem::offset_of!(ColorVertex, color) as u32,
                },
            ],
        }
    }
}

/// Graphics pipeline configuration.
#[derive(Clone)]
pub struct GraphicsPipelineConfig {
    pub shader: ShaderCode,
    pub vertex_entry: &'static CStr,
    pub fragment_entry: &'static CStr,
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    pub topology: vk::PrimitiveTopology,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub color_format: vk::Format,
    /// Enables depth test and write with `LESS` when set.
    pub depth_format: Option<vk::Format>,
}

impl Default for GraphicsPipelineConfig {
    fn default() -> Self {
        Self {
            shader: ShaderCode::Combined(Vec::new()),
            vertex_entry: VERTEX_ENTRY,
            fragment_entry: FRAGMENT_ENTRY,
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::CLOCKWISE,
            color_format: vk::Format::B8G8R8A8_SRGB,
            depth_format: Some(vk::Format::D32_SFLOAT),
        }
    }
}

impl GraphicsPipelineConfig {
    /// Mesh pipeline for `layout` targeting the given attachment formats.
    ///
    /// Entry points follow `shader`: named per layout for a combined module,
    /// `main` for split modules.
    pub fn for_vertex_layout(
        layout: VertexLayout,
        shader: ShaderCode,
        color_format: vk::Format,
        depth_format: Option<vk::Format>,
    ) -> Self {
        let (vertex_entry, fragment_entry) = match shader {
            ShaderCode::Combined(_) => (layout.combined_vertex_entry(), FRAGMENT_ENTRY),
            ShaderCode::Split { .. } => (STAGE_ENTRY, STAGE_ENTRY),
        };
        Self {
            shader,
            vertex_entry,
            fragment_entry,
            vertex_bindings: layout.bindings(),
            vertex_attributes: layout.attributes(),
            color_format,
            depth_format,
            ..Self::default()
        }
    }
}

/// Graphics pipeline and its layout, destroyed on drop.
pub struct GraphicsPipeline {
    device: Arc<ash::Device>,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl GraphicsPipeline {
    /// Create a graphics pipeline using dynamic rendering (Vulkan 1.3).
    pub fn new(
        device: Arc<ash::Device>,
        config: &GraphicsPipelineConfig,
        descriptor_set_layouts: &[vk::DescriptorSetLayout],
    ) -> Result<Self> {
        let modules = unsafe { ShaderModules::new(&device, &config.shader)? };

        let layout_info =
            vk::PipelineLayoutCreateInfo::default().set_layouts(descriptor_set_layouts);
        let layout = match unsafe { device.create_pipeline_layout(&layout_info, None) } {
            Ok(layout) => layout,
            Err(e) => {
                unsafe { modules.destroy(&device) };
                return Err(GpuError::PipelineCreation(e.to_string()));
            }
        };

        let result = unsafe { create_graphics_pipeline(&device, config, &modules, layout) };
        // Modules are only needed while the pipeline is compiled.
        unsafe { modules.destroy(&device) };

        match result {
            Ok(pipeline) => Ok(Self {
                device,
                pipeline,
                layout,
            }),
            Err(e) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                Err(e)
            }
        }
    }

    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// Vertex and fragment modules. Both are the same handle for a combined
/// module.
struct ShaderModules {
    vertex: vk::ShaderModule,
    fragment: vk::ShaderModule,
}

impl ShaderModules {
    unsafe fn new(device: &ash::Device, shader: &ShaderCode) -> Result<Self> {
        match shader {
            ShaderCode::Combined(code) => {
                let module = unsafe { create_shader_module(device, code)? };
                Ok(Self {
                    vertex: module,
                    fragment: module,
                })
            }
            ShaderCode::Split { vertex, fragment } => {
                let vertex = unsafe { create_shader_module(device, vertex)? };
                match unsafe { create_shader_module(device, fragment) } {
                    Ok(fragment) => Ok(Self { vertex, fragment }),
                    Err(e) => {
                        unsafe { device.destroy_shader_module(vertex, None) };
                        Err(e)
                    }
                }
            }
        }
    }

    unsafe fn destroy(self, device: &ash::Device) {
        unsafe {
            device.destroy_shader_module(self.vertex, None);
            if self.fragment != self.vertex {
                device.destroy_shader_module(self.fragment, None);
            }
        }
    }
}

unsafe fn create_shader_module(device: &ash::Device, code: &[u32]) -> Result<vk::ShaderModule> {
    let info = vk::ShaderModuleCreateInfo::default().code(code);
    unsafe { device.create_shader_module(&info, None) }
        .map_err(|e| GpuError::PipelineCreation(format!("shader module: {e}")))
}

unsafe fn create_graphics_pipeline(
    device: &ash::Device,
    config: &GraphicsPipelineConfig,
    modules: &ShaderModules,
    layout: vk::PipelineLayout,
) -> Result<vk::Pipeline> {
    let shader_stages = [
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(modules.vertex)
            .name(config.vertex_entry),
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(modules.fragment)
            .name(config.fragment_entry),
    ];

    let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&config.vertex_bindings)
        .vertex_attribute_descriptions(&config.vertex_attributes);

    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(config.topology)
        .primitive_restart_enable(false);

    // Counts are dynamic too (VIEWPORT_WITH_COUNT / SCISSOR_WITH_COUNT).
    let viewport_state = vk::PipelineViewportStateCreateInfo::default();

    let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .cull_mode(config.cull_mode)
        .front_face(config.front_face)
        .depth_bias_enable(false)
        .line_width(1.0);

    let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
        .rasterization_samples(vk::SampleCountFlags::TYPE_1)
        .sample_shading_enable(false);

    let depth_enabled = config.depth_format.is_some();
    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(depth_enabled)
        .depth_write_enable(depth_enabled)
        .depth_compare_op(vk::CompareOp::LESS)
        .depth_bounds_test_enable(false)
        .stencil_test_enable(false);

    let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
        .blend_enable(false)
        .color_write_mask(vk::ColorComponentFlags::RGBA)];
    let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .attachments(&color_blend_attachments);

    let dynamic_states = [
        vk::DynamicState::VIEWPORT_WITH_COUNT,
        vk::DynamicState::SCISSOR_WITH_COUNT,
    ];
    let dynamic_state =
        vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

    let color_formats = [config.color_format];
    let mut rendering_info =
        vk::PipelineRenderingCreateInfo::default().color_attachment_formats(&color_formats);
    if let Some(depth_format) = config.depth_format {
        rendering_info = rendering_info.depth_attachment_format(depth_format);
    }

    let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization)
        .multisample_state(&multisampling)
        .depth_stencil_state(&depth_stencil)
        .color_blend_state(&color_blending)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .push_next(&mut rendering_info);

    let pipelines = unsafe {
        device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
    }
    .map_err(|(_pipelines, e)| GpuError::PipelineCreation(e.to_string()))?;

    pipelines
        .into_iter()
        .next()
        .ok_or_else(|| GpuError::PipelineCreation("driver returned no pipeline".to_string()))
}
