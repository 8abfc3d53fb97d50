/// Initialization parameters for the GPU layer.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Surface formats in order of preference; the first supported one wins.
    pub preferred_formats: Vec<wgpu::TextureFormat>,

    /// Vertical-sync interval used when presenting. 0 disables vsync.
    pub sync_interval: u32,

    /// Optional alpha mode preference for the surface.
    ///
    /// If provided but unsupported on the current surface, a supported mode is selected.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    /// Required wgpu features.
    pub required_features: wgpu::Features,

    /// Limit tiers tried in order until a device is created.
    pub limit_tiers: Vec<wgpu::Limits>,

    /// Enables backend validation and debug labels.
    pub debug_layer: bool,

    /// Number of back buffers the swap surface rotates through.
    pub back_buffer_count: usize,

    /// Desired maximum frame latency for the surface.
    ///
    /// This value is a hint; support depends on platform/backend.
    pub desired_maximum_frame_latency: u32,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            preferred_formats: vec![
                wgpu::TextureFormat::Rgba8Unorm,
                wgpu::TextureFormat::Bgra8Unorm,
            ],
            sync_interval: 1,
            alpha_mode: None,
            required_features: wgpu::Features::empty(),
            limit_tiers: vec![wgpu::Limits::default(), wgpu::Limits::downlevel_defaults()],
            debug_layer: cfg!(debug_assertions),
            back_buffer_count: 2,
            desired_maximum_frame_latency: 1,
        }
    }
}

impl GpuInit {
    pub fn present_mode(&self) -> wgpu::PresentMode {
        present_mode_for(self.sync_interval)
    }

    pub fn instance_flags(&self) -> wgpu::InstanceFlags {
        if self.debug_layer {
            wgpu::InstanceFlags::DEBUG | wgpu::InstanceFlags::VALIDATION
        } else {
            wgpu::InstanceFlags::empty()
        }
    }
}

/// Any non-zero interval waits for vertical blank.
pub fn present_mode_for(sync_interval: u32) -> wgpu::PresentMode {
    if sync_interval == 0 {
        wgpu::PresentMode::AutoNoVsync
    } else {
        wgpu::PresentMode::Fifo
    }
}
