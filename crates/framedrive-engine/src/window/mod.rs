//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and Window, and wires them to the frame sequencer.

mod runtime;

pub use runtime::{DriverFailure, Runtime, RuntimeConfig};
