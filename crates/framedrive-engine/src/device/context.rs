use std::sync::Arc;

use anyhow::{Context, Result};

use super::GpuInit;

/// Owns the wgpu core objects every other GPU entity is created from.
///
/// Passed by reference; it outlives the arena, the surface and the backend.
pub struct GpuContext {
    /// wgpu instance used to create the adapter and surface.
    instance: wgpu::Instance,

    /// Selected adapter.
    adapter: wgpu::Adapter,

    /// Logical device.
    device: wgpu::Device,

    /// Command queue.
    queue: wgpu::Queue,

    /// Limits the device was created with.
    limits: wgpu::Limits,
}

impl GpuContext {
    /// Creates the instance, honoring the debug layer flag.
    pub fn create_instance(init: &GpuInit) -> wgpu::Instance {
        wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: init.instance_flags(),
            ..Default::default()
        })
    }

    /// Selects an adapter and creates the device, walking the limit tiers.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn new(
        instance: wgpu::Instance,
        compatible_surface: Option<&wgpu::Surface<'_>>,
        init: &GpuInit,
    ) -> Result<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface,
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let info = adapter.get_info();
        log::info!(
            "adapter: {} ({:?}, {:?})",
            info.name,
            info.backend,
            info.device_type
        );

        let mut last_err = None;
        for (tier, limits) in init.limit_tiers.iter().enumerate() {
            let request = adapter
                .request_device(&wgpu::DeviceDescriptor {
                    label: Some("framedrive device"),
                    required_features: init.required_features,
                    required_limits: limits.clone(),
                    experimental_features: wgpu::ExperimentalFeatures::disabled(),
                    memory_hints: wgpu::MemoryHints::Performance,
                    trace: wgpu::Trace::Off,
                })
                .await;

            match request {
                Ok((device, queue)) => {
                    log::info!("device created at limit tier {tier}");
                    device.on_uncaptured_error(Arc::new(|e: wgpu::Error| {
                        log::error!("uncaptured wgpu error: {e}");
                    }));
                    let limits = device.limits();
                    return Ok(Self {
                        instance,
                        adapter,
                        device,
                        queue,
                        limits,
                    });
                }
                Err(e) => {
                    log::warn!("limit tier {tier} rejected: {e}");
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) => Err(e).context("failed to create wgpu device/queue at any limit tier"),
            None => anyhow::bail!("no limit tiers configured"),
        }
    }

    pub fn instance(&self) -> &wgpu::Instance {
        &self.instance
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    /// Returns a reference to the logical device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Returns a reference to the command queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn limits(&self) -> &wgpu::Limits {
        &self.limits
    }

    /// Runs `create` inside a validation error scope.
    ///
    /// Returns the message of the first validation error raised by any call
    /// made in `create`, instead of handing it to the uncaptured handler.
    pub fn capture_validation<T>(&self, create: impl FnOnce(&wgpu::Device) -> T) -> Result<T, String> {
        let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create(&self.device);
        match pollster::block_on(scope.pop()) {
            None => Ok(value),
            Some(e) => Err(e.to_string()),
        }
    }
}
