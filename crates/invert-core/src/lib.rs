//! Core types for the Invert renderer.
//!
//! This crate provides the plain data shared by the GPU, render and platform
//! crates:
//! - Drawable extents
//! - Vertex formats and the text mesh parser
//! - The engine-wide error type

pub mod error;
pub mod mesh;
pub mod types;

pub use error::{Error, Result};
pub use mesh::{load_obj, parse_obj, ColorVertex, Mesh, PositionVertex};
pub use types::Extent;
