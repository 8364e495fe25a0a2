// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use cubic_present::{MaterialConstants, PresentConfig, VsyncMode};
use cubic_present_vk::ShaderSource;
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file; missing or invalid falls back to defaults
    #[arg(long, default_value = "cubic.toml")]
    pub config: PathBuf,
    /// Number of cube instances in the demo grid (0 draws one cube without instancing)
    #[arg(long, default_value_t = 0)]
    pub instances: u32,
    /// Start in borderless fullscreen (F11 toggles)
    #[arg(long)]
    pub fullscreen: bool,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RenderCfg {
    #[serde(default = "default_clear")]
    pub clear_color: [f32; 4],
    #[serde(default = "default_vsync")]
    pub vsync: bool,
    #[serde(default)]
    pub vsync_mode: VsyncModeCfg,
    /// Directory holding mesh.vert.spv, mesh_instanced.vert.spv and mesh.frag.spv.
    #[serde(default)]
    pub shader_dir: Option<PathBuf>,
    #[serde(default = "default_base_color")]
    pub base_color: [f32; 4],
    #[serde(default)]
    pub metallic: f32,
    #[serde(default = "default_roughness")]
    pub roughness: f32,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VsyncModeCfg {
    Fifo,
    #[default]
    Mailbox,
}

#[derive(Debug, Deserialize, Default, PartialEq)]
pub struct AppCfg {
    #[serde(default)]
    pub render: RenderCfg,
}

impl Default for RenderCfg {
    fn default() -> Self {
        RenderCfg {
            clear_color: default_clear(),
            vsync: true,
            vsync_mode: VsyncModeCfg::Mailbox,
            shader_dir: None,
            base_color: default_base_color(),
            metallic: 0.0,
            roughness: default_roughness(),
        }
    }
}

fn default_clear() -> [f32; 4] {
    [0.02, 0.02, 0.04, 1.0]
}
fn default_vsync() -> bool {
    true
}
fn default_base_color() -> [f32; 4] {
    [0.8, 0.8, 0.8, 1.0]
}
fn default_roughness() -> f32 {
    0.5
}

impl RenderCfg {
    pub fn present_config(&self) -> PresentConfig {
        PresentConfig {
            clear_color: self.clear_color,
            vsync: self.vsync,
            vsync_mode: match self.vsync_mode {
                VsyncModeCfg::Fifo => VsyncMode::Fifo,
                VsyncModeCfg::Mailbox => VsyncMode::Mailbox,
            },
            ..PresentConfig::default()
        }
    }

    pub fn material(&self) -> MaterialConstants {
        MaterialConstants {
            base_color: self.base_color,
            metallic: self.metallic.clamp(0.0, 1.0),
            roughness: self.roughness.clamp(0.0, 1.0),
        }
    }

    pub fn shader_source(&self) -> ShaderSource {
        match &self.shader_dir {
            Some(dir) => ShaderSource::Directory(dir.clone()),
            None => ShaderSource::Embedded,
        }
    }
}

pub fn parse_cfg(text: &str) -> Result<AppCfg, toml::de::Error> {
    toml::from_str::<AppCfg>(text)
}

pub fn load_cfg(path: &Path) -> AppCfg {
    let text = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => {
            info!("no {}, using defaults", path.display());
            return AppCfg::default();
        }
    };
    parse_cfg(&text).unwrap_or_else(|e| {
        warn!("{} is invalid, using defaults: {e}", path.display());
        AppCfg::default()
    })
}
