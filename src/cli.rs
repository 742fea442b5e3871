use std::ffi::OsString;
use std::path::PathBuf;

use clap::error::{ContextKind, ErrorKind};
use clap::{CommandFactory as _, Parser, Subcommand};
use mac_address::MacAddress;

use crate::packet::{Rgb, Scene};

/// Control a Govee BLE light from the command line.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Config file (defaults to ./govee.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Hardware address of the light, overriding the config file
    #[arg(short, long, global = true)]
    pub address: Option<MacAddress>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Turn the light on
    On,
    /// Turn the light off
    Off,
    /// List nearby BLE devices
    Scan {
        /// Only list devices that advertise a name
        #[arg(long)]
        named: bool,
        /// Pick one of the listed devices and switch it on or off
        #[arg(long)]
        select: bool,
    },
    /// Set brightness (0-255)
    Brightness { level: u8 },
    /// Set a static colour, as #RRGGBB or r,g,b
    Color { rgb: Rgb },
    /// Start a built-in effect
    Scene {
        #[arg(value_enum)]
        scene: Scene,
    },
    /// Save or apply colour/brightness/scene presets
    #[command(subcommand)]
    Preset(PresetCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum PresetCommand {
    /// Write a preset file without touching the light
    Save {
        file: PathBuf,
        #[arg(long, default_value = "#FFFFFF")]
        color: Rgb,
        #[arg(long, default_value_t = 255)]
        brightness: u8,
        #[arg(long, value_enum)]
        scene: Option<Scene>,
    },
    /// Send a preset's colour, brightness and scene to the light
    Apply { file: PathBuf },
}

/// What `main` should do with the process arguments.
#[derive(Debug)]
pub enum Invocation {
    Run {
        command: Command,
        config: Option<PathBuf>,
        address: Option<MacAddress>,
    },
    /// No or unknown command: list the valid ones and do nothing else.
    Usage { complaint: Option<String> },
    /// Help, version, or a malformed argument that clap reports itself.
    Clap(clap::Error),
}

pub fn parse<I, T>(args: I) -> Invocation
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(Cli {
            command: Some(command),
            config,
            address,
        }) => Invocation::Run {
            command,
            config,
            address,
        },
        Ok(Cli { command: None, .. }) => Invocation::Usage { complaint: None },
        // Unknown commands, flags and trailing words all get the listing.
        Err(err)
            if matches!(
                err.kind(),
                ErrorKind::InvalidSubcommand | ErrorKind::UnknownArgument
            ) =>
        {
            let complaint = err
                .get(ContextKind::InvalidSubcommand)
                .or_else(|| err.get(ContextKind::InvalidArg))
                .map(|arg| format!("Invalid argument '{arg}'."));
            Invocation::Usage {
                complaint: complaint.or_else(|| Some("Invalid argument.".to_string())),
            }
        }
        Err(err) => Invocation::Clap(err),
    }
}

pub fn usage() -> String {
    Cli::command().render_help().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_on_off_scan() {
        match parse(["govee-rs", "on"]) {
            Invocation::Run { command, .. } => assert_eq!(command, Command::On),
            other => panic!("unexpected {other:?}"),
        }
        match parse(["govee-rs", "off"]) {
            Invocation::Run { command, .. } => assert_eq!(command, Command::Off),
            other => panic!("unexpected {other:?}"),
        }
        match parse(["govee-rs", "scan"]) {
            Invocation::Run { command, .. } => assert_eq!(
                command,
                Command::Scan {
                    named: false,
                    select: false
                }
            ),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_no_argument_is_usage() {
        assert!(matches!(
            parse(["govee-rs"]),
            Invocation::Usage { complaint: None }
        ));
    }

    #[test]
    fn test_unknown_argument_is_usage() {
        match parse(["govee-rs", "dim"]) {
            Invocation::Usage { complaint } => {
                assert_eq!(complaint.as_deref(), Some("Invalid argument 'dim'."))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_flag_is_usage() {
        match parse(["govee-rs", "--bogus"]) {
            Invocation::Usage { complaint } => {
                assert!(complaint.unwrap().contains("--bogus"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_trailing_argument_is_usage() {
        match parse(["govee-rs", "on", "extra"]) {
            Invocation::Usage { complaint } => {
                assert!(complaint.unwrap().contains("extra"))
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            parse(["govee-rs", "scan", "--bogus"]),
            Invocation::Usage { .. }
        ));
    }

    #[test]
    fn test_usage_lists_commands() {
        let usage = usage();
        for command in ["on", "off", "scan"] {
            assert!(
                usage.lines().any(|l| l.trim_start().starts_with(command)),
                "{command} missing from:\n{usage}"
            );
        }
    }

    #[test]
    fn test_global_options() {
        match parse(["govee-rs", "off", "--address", "A4:C1:38:00:11:22"]) {
            Invocation::Run { address, .. } => {
                assert_eq!(address.unwrap().to_string(), "A4:C1:38:00:11:22")
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            parse(["govee-rs", "on", "--address", "nope"]),
            Invocation::Clap(_)
        ));
    }

    #[test]
    fn test_value_commands() {
        match parse(["govee-rs", "color", "10,20,30"]) {
            Invocation::Run { command, .. } => assert_eq!(
                command,
                Command::Color {
                    rgb: Rgb {
                        r: 10,
                        g: 20,
                        b: 30
                    }
                }
            ),
            other => panic!("unexpected {other:?}"),
        }
        match parse(["govee-rs", "scene", "candlelight"]) {
            Invocation::Run { command, .. } => assert_eq!(
                command,
                Command::Scene {
                    scene: Scene::Candlelight
                }
            ),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            parse(["govee-rs", "brightness", "300"]),
            Invocation::Clap(_)
        ));
    }

    #[test]
    fn test_preset_save_defaults() {
        match parse(["govee-rs", "preset", "save", "evening.json"]) {
            Invocation::Run {
                command: Command::Preset(PresetCommand::Save {
                    file,
                    color,
                    brightness,
                    scene,
                }),
                ..
            } => {
                assert_eq!(file, PathBuf::from("evening.json"));
                assert_eq!(color, Rgb::WHITE);
                assert_eq!(brightness, 255);
                assert_eq!(scene, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
