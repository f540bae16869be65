//! Vulkan layer of the Invert renderer.
//!
//! This crate provides:
//! - Capability negotiation and physical device selection
//! - Device, queue and surface ownership
//! - Explicit memory-type selection and buffer uploads
//! - Swapchain lifecycle with depth buffer
//! - The mesh graphics pipeline (dynamic rendering)

pub mod capabilities;
pub mod command;
pub mod context;
pub mod descriptors;
pub mod error;
pub mod instance;
pub mod memory;
pub mod pipeline;
pub mod surface;
pub mod swapchain;
pub mod sync;
pub mod upload;

pub use capabilities::{DeviceRejection, GpuCapabilities, RejectionReason, RequiredCapabilities};
pub use context::{GpuContext, GpuContextBuilder, QueueFamilies};
pub use descriptors::{
    write_uniform_buffer, DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder,
};
pub use error::{GpuError, Result};
pub use memory::{find_memory_type, GpuBuffer, GpuImage};
pub use pipeline::{
    load_shader_binary, GraphicsPipeline, GraphicsPipelineConfig, ShaderCode, VertexLayout,
};
pub use surface::{SurfaceContext, SurfaceProvider};
pub use swapchain::{
    AcquireOutcome, DepthBuffer, PresentOutcome, SwapchainLifecycle, SwapchainManager,
    SwapchainState,
};
pub use sync::{FrameFences, ImageSemaphores};
pub use upload::{UploadStrategy, Uploader};
