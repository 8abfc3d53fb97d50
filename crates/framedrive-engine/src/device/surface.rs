use std::sync::Arc;

use anyhow::{Context, Result};
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::error::FrameError;

use super::{GpuContext, GpuInit};

pub(crate) fn choose_surface_format(
    caps: &wgpu::SurfaceCapabilities,
    preferred: &[wgpu::TextureFormat],
) -> Option<wgpu::TextureFormat> {
    if caps.formats.is_empty() {
        return None;
    }

    preferred
        .iter()
        .copied()
        .find(|f| caps.formats.contains(f))
        .or_else(|| caps.formats.first().copied())
}

pub(crate) fn choose_alpha_mode(
    caps: &wgpu::SurfaceCapabilities,
    requested: Option<wgpu::CompositeAlphaMode>,
) -> wgpu::CompositeAlphaMode {
    requested
        .filter(|m| caps.alpha_modes.contains(m))
        .or_else(|| caps.alpha_modes.first().copied())
        .unwrap_or(wgpu::CompositeAlphaMode::Auto)
}

/// Whether an acquisition error earns the single reconfigure-and-retry.
pub(crate) fn is_recoverable(err: &wgpu::SurfaceError) -> bool {
    matches!(err, wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)
}

struct AcquiredImage {
    index: usize,
    texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
}

/// Window swap chain with a fixed number of logically indexed back buffers.
///
/// The current index advances by one on every present.
pub struct SwapSurface {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    buffer_count: usize,
    current: usize,
    acquired: Option<AcquiredImage>,
}

impl SwapSurface {
    /// Creates the surface for `window`; configure it with [`SwapSurface::configure`].
    pub fn create(instance: &wgpu::Instance, window: Arc<Window>) -> Result<wgpu::Surface<'static>> {
        instance
            .create_surface(window)
            .context("failed to create wgpu surface")
    }

    pub fn configure(
        ctx: &GpuContext,
        window: Arc<Window>,
        surface: wgpu::Surface<'static>,
        init: &GpuInit,
    ) -> Result<Self> {
        let size = window.inner_size();
        anyhow::ensure!(size.width > 0 && size.height > 0, "window has zero size");
        anyhow::ensure!(init.back_buffer_count >= 2, "at least two back buffers are required");

        let caps = surface.get_capabilities(ctx.adapter());
        let format = choose_surface_format(&caps, &init.preferred_formats)
            .context("no supported surface formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode: init.present_mode(),
            alpha_mode: choose_alpha_mode(&caps, init.alpha_mode),
            view_formats: vec![],
            desired_maximum_frame_latency: init.desired_maximum_frame_latency,
        };

        surface.configure(ctx.device(), &config);
        log::info!(
            "surface configured: {format:?} {}x{} {:?}",
            size.width,
            size.height,
            config.present_mode
        );

        Ok(Self {
            window,
            surface,
            config,
            size,
            buffer_count: init.back_buffer_count,
            current: 0,
            acquired: None,
        })
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn extent(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn present_mode(&self) -> wgpu::PresentMode {
        self.config.present_mode
    }

    pub fn buffer_count(&self) -> usize {
        self.buffer_count
    }

    /// Index of the back buffer available for the next frame.
    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Reconfigures the surface after a resize; zero sizes are remembered but skipped.
    pub fn resize(&mut self, ctx: &GpuContext, new_size: PhysicalSize<u32>) {
        self.size = new_size;
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }

        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(ctx.device(), &self.config);
        log::debug!("surface resized to {}x{}", new_size.width, new_size.height);
    }

    /// Acquires the swap chain image for the current index.
    pub fn acquire(&mut self, ctx: &GpuContext) -> Result<usize, FrameError> {
        if self.acquired.is_some() {
            return Err(FrameError::Acquire("previous back buffer was never presented".into()));
        }

        let texture = match self.surface.get_current_texture() {
            Ok(t) => t,
            Err(e) if is_recoverable(&e) => {
                log::warn!("surface {e}; reconfiguring once");
                self.surface.configure(ctx.device(), &self.config);
                self.surface
                    .get_current_texture()
                    .map_err(|e| FrameError::Acquire(e.to_string()))?
            }
            Err(e) => return Err(FrameError::Acquire(e.to_string())),
        };

        let view = texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.acquired = Some(AcquiredImage {
            index: self.current,
            texture,
            view,
        });
        Ok(self.current)
    }

    /// View of the acquired back buffer at `index`.
    pub fn target_view(&self, index: usize) -> Option<&wgpu::TextureView> {
        self.acquired
            .as_ref()
            .filter(|a| a.index == index)
            .map(|a| &a.view)
    }

    /// Presents the acquired image and advances to the next back buffer.
    pub fn present(&mut self, index: usize) -> Result<(), FrameError> {
        let Some(image) = self.acquired.take() else {
            return Err(FrameError::Present("no back buffer acquired".into()));
        };
        if image.index != index {
            return Err(FrameError::Present(format!(
                "back buffer {index} presented but {} was acquired",
                image.index
            )));
        }

        self.window.pre_present_notify();
        drop(image.view);
        image.texture.present();

        self.current = (self.current + 1) % self.buffer_count;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(formats: Vec<wgpu::TextureFormat>) -> wgpu::SurfaceCapabilities {
        wgpu::SurfaceCapabilities {
            formats,
            present_modes: vec![wgpu::PresentMode::Fifo],
            alpha_modes: vec![wgpu::CompositeAlphaMode::Opaque],
            usages: wgpu::TextureUsages::RENDER_ATTACHMENT,
        }
    }

    #[test]
    fn format_follows_preference_order() {
        let preferred = GpuInit::default().preferred_formats;
        let c = caps(vec![
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Bgra8Unorm,
            wgpu::TextureFormat::Rgba8Unorm,
        ]);
        assert_eq!(
            choose_surface_format(&c, &preferred),
            Some(wgpu::TextureFormat::Rgba8Unorm)
        );

        let c = caps(vec![wgpu::TextureFormat::Bgra8UnormSrgb, wgpu::TextureFormat::Bgra8Unorm]);
        assert_eq!(
            choose_surface_format(&c, &preferred),
            Some(wgpu::TextureFormat::Bgra8Unorm)
        );
    }

    #[test]
    fn format_falls_back_to_first_supported() {
        let c = caps(vec![wgpu::TextureFormat::Rgb10a2Unorm]);
        assert_eq!(
            choose_surface_format(&c, &GpuInit::default().preferred_formats),
            Some(wgpu::TextureFormat::Rgb10a2Unorm)
        );
        assert_eq!(choose_surface_format(&caps(vec![]), &[]), None);
    }

    #[test]
    fn unsupported_alpha_mode_falls_back() {
        let c = caps(vec![wgpu::TextureFormat::Rgba8Unorm]);
        assert_eq!(
            choose_alpha_mode(&c, Some(wgpu::CompositeAlphaMode::PreMultiplied)),
            wgpu::CompositeAlphaMode::Opaque
        );
    }

    #[test]
    fn only_lost_and_outdated_are_recoverable() {
        assert!(is_recoverable(&wgpu::SurfaceError::Lost));
        assert!(is_recoverable(&wgpu::SurfaceError::Outdated));
        assert!(!is_recoverable(&wgpu::SurfaceError::Timeout));
        assert!(!is_recoverable(&wgpu::SurfaceError::OutOfMemory));
    }
}
