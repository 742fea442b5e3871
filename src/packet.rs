use std::fmt;
use std::str::FromStr;

use serde_derive::{Deserialize, Serialize};

pub const PACKET_LEN: usize = 20;
const HEADER: u8 = 0x33;

const POWER: u8 = 0x01;
const BRIGHTNESS: u8 = 0x04;
const COLOR: u8 = 0x05;

const COLOR_STATIC: u8 = 0x02;
const COLOR_SCENE: u8 = 0x04;

/// A single Govee control frame, written as-is to the control characteristic.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Packet([u8; PACKET_LEN]);

pub const POWER_ON: Packet = Packet([
    0x33, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x33,
]);

pub const POWER_OFF: Packet = Packet([
    0x33, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x32,
]);

impl Packet {
    pub fn power(on: bool) -> Self {
        let packet = if on { POWER_ON } else { POWER_OFF };
        debug_assert_eq!(packet, Self::build(POWER, &[u8::from(on)]));
        packet
    }

    pub fn brightness(level: u8) -> Self {
        Self::build(BRIGHTNESS, &[level])
    }

    pub fn color(rgb: Rgb) -> Self {
        Self::build(COLOR, &[COLOR_STATIC, rgb.r, rgb.g, rgb.b])
    }

    pub fn scene(scene: Scene) -> Self {
        Self::build(COLOR, &[COLOR_SCENE, scene.id()])
    }

    /// Lays out header, command type and body, zero-pads, and seals the
    /// frame with the XOR checksum. Bodies longer than 17 bytes are truncated.
    fn build(command: u8, body: &[u8]) -> Self {
        let mut frame = [0u8; PACKET_LEN];
        frame[0] = HEADER;
        frame[1] = command;
        for (slot, byte) in frame[2..PACKET_LEN - 1].iter_mut().zip(body) {
            *slot = *byte;
        }
        frame[PACKET_LEN - 1] = checksum(&frame[..PACKET_LEN - 1]);
        Packet(frame)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Packet({})", self)
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb {
        r: 0xFF,
        g: 0xFF,
        b: 0xFF,
    };
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Rgb { r, g, b }
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(rgb: Rgb) -> Self {
        [rgb.r, rgb.g, rgb.b]
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid colour {0:?}, expected #RRGGBB or r,g,b")]
pub struct ParseRgbError(String);

impl FromStr for Rgb {
    type Err = ParseRgbError;

    /// Accepts `#RRGGBB`, `RRGGBB` or `r,g,b` with decimal components.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseRgbError(s.to_string());
        let trimmed = s.trim();

        if trimmed.contains(',') {
            let parts = trimmed
                .split(',')
                .map(|p| p.trim().parse::<u8>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| err())?;
            return match parts.as_slice() {
                [r, g, b] => Ok(Rgb {
                    r: *r,
                    g: *g,
                    b: *b,
                }),
                _ => Err(err()),
            };
        }

        let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(err());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err());
        Ok(Rgb {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }
}

/// Built-in light effects, identified by the id the firmware expects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Scene {
    Breathe,
    Pulse,
    Rainbow,
    Candlelight,
}

impl Scene {
    pub fn id(&self) -> u8 {
        match self {
            Scene::Breathe => 0x0A,
            Scene::Pulse => 0x08,
            Scene::Rainbow => 0x15,
            Scene::Candlelight => 0x09,
        }
    }
}

impl fmt::Display for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scene::Breathe => "breathe",
            Scene::Pulse => "pulse",
            Scene::Rainbow => "rainbow",
            Scene::Candlelight => "candlelight",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_sealed(packet: &Packet) -> bool {
        let bytes = packet.as_bytes();
        bytes[PACKET_LEN - 1] == checksum(&bytes[..PACKET_LEN - 1])
    }

    #[test]
    fn test_power_literals() {
        assert_eq!(
            POWER_ON.as_bytes(),
            &[0x33, 0x01, 0x01, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x33]
        );
        assert_eq!(
            POWER_OFF.as_bytes(),
            &[0x33, 0x01, 0x00, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x32]
        );
        assert_eq!(Packet::power(true), POWER_ON);
        assert_eq!(Packet::power(false), POWER_OFF);
    }

    #[test]
    fn test_literals_match_frame_layout() {
        assert_eq!(Packet::build(POWER, &[0x01]), POWER_ON);
        assert_eq!(Packet::build(POWER, &[0x00]), POWER_OFF);
    }

    #[test]
    fn test_brightness_frame() {
        let packet = Packet::brightness(0x80);
        assert_eq!(&packet.as_bytes()[..3], &[0x33, 0x04, 0x80]);
        assert_eq!(packet.as_bytes()[PACKET_LEN - 1], 0x33 ^ 0x04 ^ 0x80);
    }

    #[test]
    fn test_color_frame() {
        let packet = Packet::color(Rgb {
            r: 0x12,
            g: 0x34,
            b: 0x56,
        });
        assert_eq!(
            &packet.as_bytes()[..6],
            &[0x33, 0x05, 0x02, 0x12, 0x34, 0x56]
        );
        assert!(packet.as_bytes()[6..PACKET_LEN - 1].iter().all(|b| *b == 0));
        assert!(is_sealed(&packet));
    }

    #[test]
    fn test_scene_frame() {
        let packet = Packet::scene(Scene::Rainbow);
        assert_eq!(&packet.as_bytes()[..4], &[0x33, 0x05, 0x04, 0x15]);
        assert!(is_sealed(&packet));
    }

    #[test]
    fn test_parse_rgb() {
        let expected = Rgb {
            r: 255,
            g: 0,
            b: 128,
        };
        assert_eq!("#FF0080".parse::<Rgb>().unwrap(), expected);
        assert_eq!("ff0080".parse::<Rgb>().unwrap(), expected);
        assert_eq!("255, 0, 128".parse::<Rgb>().unwrap(), expected);
        assert!("#FF00".parse::<Rgb>().is_err());
        assert!("256,0,0".parse::<Rgb>().is_err());
        assert!("1,2".parse::<Rgb>().is_err());
        assert!("#GG0000".parse::<Rgb>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            POWER_OFF.to_string(),
            "33 01 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 32"
        );
        assert_eq!(Rgb::WHITE.to_string(), "#FFFFFF");
    }
}
