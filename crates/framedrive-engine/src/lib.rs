//! Framedrive engine crate.
//!
//! A single-quad frame driver: startup uploads resources and builds one
//! pipeline, then the frame sequencer records, submits, fences and presents
//! one frame at a time.

pub mod binding;
pub mod config;
pub mod device;
pub mod error;
pub mod frame;
pub mod logging;
pub mod pipeline;
pub mod quad;
pub mod resource;
pub mod window;

pub use config::DriverConfig;
pub use error::{ErrorClass, FrameError, RecordError};
pub use window::{DriverFailure, Runtime, RuntimeConfig};
