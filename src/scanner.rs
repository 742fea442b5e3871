use std::fmt;

use log::{debug, warn};
use mac_address::MacAddress;

use crate::ble::TransportError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanResult {
    pub address: MacAddress,
    pub name: Option<String>,
    pub rssi: Option<i16>,
}

impl ScanResult {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }
}

impl fmt::Display for ScanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.address, self.display_name())?;
        if let Some(rssi) = self.rssi {
            write!(f, " ({rssi} dBm)")?;
        }
        Ok(())
    }
}

/// Collects advertisements seen during one scan window.
///
/// Each address is reported once, in the order it was first heard. Later
/// advertisements refresh the signal strength and fill in a missing name.
#[derive(Debug, Default)]
pub struct Scanner {
    named_only: bool,
    seen: Vec<ScanResult>,
}

impl Scanner {
    pub fn new(named_only: bool) -> Self {
        Scanner {
            named_only,
            seen: Vec::new(),
        }
    }

    pub fn observe(&mut self, result: ScanResult) {
        match self
            .seen
            .iter_mut()
            .find(|r| r.address.bytes() == result.address.bytes())
        {
            Some(existing) => {
                if result.name.is_some() {
                    existing.name = result.name;
                }
                if result.rssi.is_some() {
                    existing.rssi = result.rssi;
                }
            }
            None => {
                debug!("Discovered {result}");
                self.seen.push(result);
            }
        }
    }

    /// Takes the outcome of looking up one advertiser. A device that vanished
    /// or failed to report its properties is skipped so the window carries on.
    pub fn record(&mut self, lookup: Result<Option<ScanResult>, TransportError>) {
        match lookup {
            Ok(Some(result)) => self.observe(result),
            Ok(None) => {}
            Err(err) => warn!("Skipping device that could not be read: {err}"),
        }
    }

    pub fn finish(self) -> Vec<ScanResult> {
        let named_only = self.named_only;
        self.seen
            .into_iter()
            .filter(|r| !named_only || r.name.is_some())
            .collect()
    }
}

/// Numbered listing printed to the operator after a scan.
pub fn render(results: &[ScanResult]) -> String {
    if results.is_empty() {
        return "No BLE devices found.\n".to_string();
    }

    let mut out = format!("Found {} BLE devices:\n", results.len());
    for (i, result) in results.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, result));
    }
    out
}
