//! Application runner for the Invert renderer.
//!
//! Opens a window, starts a dedicated render thread that draws one mesh,
//! forwards resizes and coordinates shutdown.
//!
//! # Example
//!
//! ```no_run
//! use invert_app::{run_app, AppConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     run_app(AppConfig::new("Mesh").with_size(1280, 720))
//! }
//! ```

mod config;
mod logging;
mod runner;

pub use config::AppConfig;
pub use logging::init_tracing;
pub use runner::run_app;

pub use invert_gpu::{UploadStrategy, VertexLayout};
