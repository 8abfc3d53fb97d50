use std::path::PathBuf;

use crate::device::GpuInit;
use crate::frame::SequencerConfig;
use crate::window::RuntimeConfig;

/// Everything the driver needs to start, with the defaults the viewer ships.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub runtime: RuntimeConfig,
    pub gpu: GpuInit,
    pub sequencer: SequencerConfig,
    pub texture_path: PathBuf,
    pub shader_path: PathBuf,
    pub vertex_entry: String,
    pub pixel_entry: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            runtime: RuntimeConfig::default(),
            gpu: GpuInit::default(),
            sequencer: SequencerConfig::default(),
            texture_path: PathBuf::from("assets/textures/checker.png"),
            shader_path: PathBuf::from("assets/shaders/quad.wgsl"),
            vertex_entry: "vs_main".to_string(),
            pixel_entry: "fs_main".to_string(),
        }
    }
}

impl DriverConfig {
    /// GPU settings with the present interval taken from the sequencer.
    pub fn gpu_init(&self) -> GpuInit {
        GpuInit {
            sync_interval: self.sequencer.sync_interval,
            ..self.gpu.clone()
        }
    }
}
