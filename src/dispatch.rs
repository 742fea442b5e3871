use std::io::{BufRead, Write};

use anyhow::Context as _;
use log::{debug, info};
use mac_address::MacAddress;

use crate::ble::{Transport, TransportError};
use crate::cli::{Command, PresetCommand};
use crate::config::AppConfig;
use crate::packet::{Packet, Rgb, Scene};
use crate::preset::Preset;
use crate::scanner::{self, ScanResult};

/// Runs one command against one light. Operator-facing text goes to
/// `output`; `input` is only read for the interactive prompts.
pub struct Dispatcher<'a, T, R, W> {
    transport: &'a T,
    config: &'a AppConfig,
    address: MacAddress,
    interactive: bool,
    input: R,
    output: W,
}

impl<'a, T, R, W> Dispatcher<'a, T, R, W>
where
    T: Transport,
    R: BufRead,
    W: Write,
{
    pub fn new(
        transport: &'a T,
        config: &'a AppConfig,
        address: MacAddress,
        input: R,
        output: W,
    ) -> Self {
        Dispatcher {
            transport,
            config,
            address,
            interactive: false,
            input,
            output,
        }
    }

    /// Allow prompting the operator when a command can't go ahead as asked.
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub async fn run(&mut self, command: Command) -> anyhow::Result<()> {
        debug!("Running {command:?} against {}", self.address);
        match command {
            Command::On => self.power(self.address, true).await,
            Command::Off => self.power(self.address, false).await,
            Command::Scan { named, select } => self.scan(named, select).await,
            Command::Brightness { level } => {
                self.send(self.address, Packet::brightness(level)).await?;
                writeln!(self.output, "Brightness set to {level}")?;
                Ok(())
            }
            Command::Color { rgb } => {
                self.send(self.address, Packet::color(rgb)).await?;
                writeln!(self.output, "Colour set to {rgb}")?;
                Ok(())
            }
            Command::Scene { scene } => {
                self.send(self.address, Packet::scene(scene)).await?;
                writeln!(self.output, "Scene applied: {scene}")?;
                Ok(())
            }
            Command::Preset(PresetCommand::Save {
                file,
                color,
                brightness,
                scene,
            }) => self.save_preset(&file, color, brightness, scene),
            Command::Preset(PresetCommand::Apply { file }) => {
                let preset = Preset::load(&file)?;
                writeln!(self.output, "Loading preset from {}...", file.display())?;
                for (label, packet) in preset.packets() {
                    self.send(self.address, packet)
                        .await
                        .with_context(|| format!("failed to apply preset {label}"))?;
                }
                writeln!(self.output, "Preset applied successfully")?;
                Ok(())
            }
        }
    }

    async fn send(&mut self, address: MacAddress, packet: Packet) -> anyhow::Result<()> {
        writeln!(self.output, "Connecting to {address}...")?;
        self.transport.send(address, &packet).await?;
        info!("Sent {packet} to {address}");
        Ok(())
    }

    async fn power(&mut self, address: MacAddress, on: bool) -> anyhow::Result<()> {
        let state = if on { "ON" } else { "OFF" };
        match self.send(address, Packet::power(on)).await {
            Ok(()) => {
                writeln!(self.output, "Command sent! Device {state}")?;
                Ok(())
            }
            Err(err)
                if self.interactive
                    && matches!(
                        err.downcast_ref::<TransportError>(),
                        Some(TransportError::DeviceNotFound(..))
                    ) =>
            {
                writeln!(self.output, "Error: {err}")?;
                writeln!(
                    self.output,
                    "Would you like to scan for available devices? (y/n)"
                )?;
                if self
                    .read_line()?
                    .is_some_and(|answer| answer.eq_ignore_ascii_case("y"))
                {
                    self.list(self.config.scan_named_only()).await?;
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    async fn list(&mut self, named_only: bool) -> anyhow::Result<Vec<ScanResult>> {
        let window = self.config.scan_duration();
        writeln!(
            self.output,
            "Scanning for BLE devices (timeout: {}s)...",
            window.as_secs()
        )?;
        let results = self.transport.scan(window, named_only).await?;
        write!(self.output, "{}", scanner::render(&results))?;
        Ok(results)
    }

    async fn scan(&mut self, named: bool, select: bool) -> anyhow::Result<()> {
        let results = self.list(named || self.config.scan_named_only()).await?;
        if !select || results.is_empty() {
            return Ok(());
        }

        loop {
            writeln!(
                self.output,
                "\nEnter the number of the device to control, or 0 to cancel:"
            )?;
            let Some(line) = self.read_line()? else {
                return Ok(());
            };
            let choice = match line.parse::<usize>() {
                Ok(0) => return Ok(()),
                Ok(choice) => choice,
                Err(_) => {
                    writeln!(self.output, "Please enter a number.")?;
                    continue;
                }
            };
            let Some(device) = results.get(choice - 1) else {
                writeln!(self.output, "Invalid selection.")?;
                continue;
            };
            writeln!(self.output, "Selected: {device}")?;

            writeln!(self.output, "Enter command (on/off):")?;
            match self.read_line()?.map(|c| c.to_ascii_lowercase()).as_deref() {
                Some("on") => return self.power(device.address, true).await,
                Some("off") => return self.power(device.address, false).await,
                Some(_) => writeln!(self.output, "Invalid command. Use 'on' or 'off'.")?,
                None => return Ok(()),
            }
        }
    }

    fn save_preset(
        &mut self,
        file: &std::path::Path,
        rgb: Rgb,
        brightness: u8,
        scene: Option<Scene>,
    ) -> anyhow::Result<()> {
        let preset = Preset {
            rgb,
            brightness,
            scene,
        };
        preset.save(file)?;
        writeln!(self.output, "Preset saved to {}", file.display())?;
        Ok(())
    }

    /// Next trimmed line of input, or `None` at end of input.
    fn read_line(&mut self) -> anyhow::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}
