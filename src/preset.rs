use std::path::Path;

use anyhow::Context as _;
use serde_derive::{Deserialize, Serialize};

use crate::packet::{Packet, Rgb, Scene};

fn default_rgb() -> Rgb {
    Rgb::WHITE
}

fn default_brightness() -> u8 {
    255
}

/// A saved look for the light. Fields missing from the file fall back to
/// full-brightness white without an effect.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Preset {
    #[serde(default = "default_rgb")]
    pub rgb: Rgb,
    #[serde(default = "default_brightness")]
    pub brightness: u8,
    #[serde(default)]
    pub scene: Option<Scene>,
}

impl Default for Preset {
    fn default() -> Self {
        Preset {
            rgb: default_rgb(),
            brightness: default_brightness(),
            scene: None,
        }
    }
}

impl Preset {
    pub fn from_json(contents: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading preset {}", path.display()))?;
        Self::from_json(&contents).with_context(|| format!("parsing preset {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("writing preset {}", path.display()))
    }

    /// Frames to send, in order: colour, brightness, then the scene if any.
    pub fn packets(&self) -> Vec<(String, Packet)> {
        let mut packets = vec![
            (format!("colour {}", self.rgb), Packet::color(self.rgb)),
            (
                format!("brightness {}", self.brightness),
                Packet::brightness(self.brightness),
            ),
        ];
        if let Some(scene) = self.scene {
            packets.push((format!("scene {scene}"), Packet::scene(scene)));
        }
        packets
    }
}
