use std::path::PathBuf;

use framedrive_engine::logging::{init_logging, LoggingConfig};
use framedrive_engine::{DriverConfig, Runtime};

fn asset(relative: &str) -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/assets")).join(relative)
}

fn main() {
    init_logging(LoggingConfig::default());

    let config = DriverConfig {
        texture_path: asset("textures/checker.png"),
        shader_path: asset("shaders/quad.wgsl"),
        ..DriverConfig::default()
    };

    match Runtime::run(config) {
        Ok(frames) => log::info!("rendered {frames} frames"),
        Err(e) => {
            log::error!("{e:#}");
            std::process::exit(-1);
        }
    }
}
