//! Frame scheduling and mesh rendering for the Invert renderer.
//!
//! This crate provides:
//! - The per-frame state machine and its GPU seam ([`FrameBackend`])
//! - Cross-thread resize and shutdown primitives
//! - Camera and per-frame uniforms
//! - The Vulkan mesh renderer

pub mod camera;
pub mod error;
pub mod frame;
pub mod renderer;
pub mod resize;
pub mod scheduler;
pub mod shutdown;

pub use camera::{model_rotation, Camera, FrameUniforms};
pub use error::{RenderError, Result};
pub use frame::FrameRing;
pub use renderer::{MeshRenderer, RendererConfig};
pub use resize::PendingResize;
pub use scheduler::{FrameBackend, FrameOutcome, FrameScheduler};
pub use shutdown::ShutdownSignal;
