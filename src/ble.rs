use std::time::Duration;

use btleplug::api::{
    BDAddr, Central as _, CentralEvent, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::StreamExt as _;
use log::{debug, info, warn};
use mac_address::MacAddress;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::packet::Packet;
use crate::scanner::{ScanResult, Scanner};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("no Bluetooth adapter found")]
    NoAdapter,
    #[error("device {0} was not found within {1:?}; is it powered and in range?")]
    DeviceNotFound(MacAddress, Duration),
    #[error("could not connect to {0} (weak signal or out of range?)")]
    Connect(MacAddress, #[source] btleplug::Error),
    #[error("connecting to {0} timed out after {1:?}")]
    ConnectTimeout(MacAddress, Duration),
    #[error("device {0} has no characteristic {1}")]
    MissingCharacteristic(MacAddress, Uuid),
    #[error("device {0} rejected the write")]
    WriteRejected(MacAddress, #[source] btleplug::Error),
    #[error(transparent)]
    Bluetooth(#[from] btleplug::Error),
}

/// The two things the dispatcher needs from a BLE stack.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Connects to `address`, writes `packet` once and disconnects.
    async fn send(&self, address: MacAddress, packet: &Packet) -> Result<(), TransportError>;

    /// Listens for advertisements for `window` and reports what was heard.
    async fn scan(
        &self,
        window: Duration,
        named_only: bool,
    ) -> Result<Vec<ScanResult>, TransportError>;
}

/// `Transport` over the host Bluetooth stack, using its first adapter.
pub struct BleTransport {
    characteristic: Uuid,
    discovery_timeout: Duration,
    connect_timeout: Duration,
    write_type: WriteType,
}

impl BleTransport {
    pub fn new(config: &AppConfig) -> Self {
        BleTransport {
            characteristic: config.characteristic(),
            discovery_timeout: config.discovery_timeout(),
            connect_timeout: config.connect_timeout(),
            write_type: if config.write_with_response() {
                WriteType::WithResponse
            } else {
                WriteType::WithoutResponse
            },
        }
    }

    async fn adapter(&self) -> Result<Adapter, TransportError> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        adapters.into_iter().next().ok_or(TransportError::NoAdapter)
    }

    /// Scans until a peripheral advertising `address` shows up or the
    /// discovery timeout elapses.
    async fn locate(
        &self,
        adapter: &Adapter,
        address: MacAddress,
    ) -> Result<Peripheral, TransportError> {
        let target = BDAddr::from(address.bytes());
        let mut events = adapter.events().await?;
        adapter.start_scan(ScanFilter::default()).await?;

        let search = async {
            for peripheral in adapter.peripherals().await? {
                if peripheral.address() == target {
                    return Ok(Some(peripheral));
                }
            }
            while let Some(event) = events.next().await {
                if let CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) = event
                {
                    let peripheral = adapter.peripheral(&id).await?;
                    if peripheral.address() == target {
                        return Ok(Some(peripheral));
                    }
                }
            }
            debug!("Adapter event stream closed");
            Ok::<_, btleplug::Error>(None)
        };
        let found = tokio::time::timeout(self.discovery_timeout, search).await;

        if let Err(err) = adapter.stop_scan().await {
            warn!("Failed to stop scan: {err}");
        }

        match found {
            Ok(Ok(Some(peripheral))) => Ok(peripheral),
            Ok(Ok(None)) | Err(_) => Err(TransportError::DeviceNotFound(
                address,
                self.discovery_timeout,
            )),
            Ok(Err(err)) => Err(err.into()),
        }
    }

    async fn write(
        &self,
        peripheral: &Peripheral,
        address: MacAddress,
        packet: &Packet,
    ) -> Result<(), TransportError> {
        peripheral.discover_services().await?;
        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == self.characteristic)
            .ok_or(TransportError::MissingCharacteristic(
                address,
                self.characteristic,
            ))?;

        debug!("Writing {packet} to {}", characteristic.uuid);
        peripheral
            .write(&characteristic, packet.as_bytes(), self.write_type)
            .await
            .map_err(|err| TransportError::WriteRejected(address, err))
    }

    async fn observe(
        adapter: &Adapter,
        id: &PeripheralId,
    ) -> Result<Option<ScanResult>, TransportError> {
        let peripheral = adapter.peripheral(id).await?;
        let result = peripheral.properties().await?.map(|p| ScanResult {
            address: MacAddress::new(p.address.into_inner()),
            name: p.local_name,
            rssi: p.rssi,
        });
        Ok(result)
    }
}

/// Runs `attempt` for at most `limit`. On timeout the abandoned attempt is
/// cleaned up with `release` and `None` is returned.
async fn within<T, A, R>(limit: Duration, attempt: A, release: R) -> Option<T>
where
    A: Future<Output = T>,
    R: Future<Output = ()>,
{
    match tokio::time::timeout(limit, attempt).await {
        Ok(output) => Some(output),
        Err(_) => {
            release.await;
            None
        }
    }
}

async fn release(peripheral: &Peripheral, address: MacAddress) {
    debug!("Disconnecting from {address}");
    if let Err(err) = peripheral.disconnect().await {
        warn!("Failed to disconnect from {address}: {err}");
    }
}

impl Transport for BleTransport {
    async fn send(&self, address: MacAddress, packet: &Packet) -> Result<(), TransportError> {
        let adapter = self.adapter().await?;
        let peripheral = self.locate(&adapter, address).await?;

        info!("Connecting to {address}");
        let attempt = within(
            self.connect_timeout,
            peripheral.connect(),
            release(&peripheral, address),
        );
        match attempt.await {
            Some(Ok(())) => {}
            Some(Err(err)) => return Err(TransportError::Connect(address, err)),
            None => {
                return Err(TransportError::ConnectTimeout(
                    address,
                    self.connect_timeout,
                ));
            }
        }

        let result = self.write(&peripheral, address, packet).await;
        release(&peripheral, address).await;
        result
    }

    async fn scan(
        &self,
        window: Duration,
        named_only: bool,
    ) -> Result<Vec<ScanResult>, TransportError> {
        let adapter = self.adapter().await?;
        let mut events = adapter.events().await?;
        adapter.start_scan(ScanFilter::default()).await?;

        let mut scanner = Scanner::new(named_only);
        let deadline = tokio::time::sleep(window);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => break,
                event = events.next() => match event {
                    Some(CentralEvent::DeviceDiscovered(id)) | Some(CentralEvent::DeviceUpdated(id)) => {
                        scanner.record(Self::observe(&adapter, &id).await);
                    }
                    Some(_) => {}
                    None => {
                        debug!("No more events");
                        break;
                    }
                },
            }
        }

        if let Err(err) = adapter.stop_scan().await {
            warn!("Failed to stop scan: {err}");
        }
        Ok(scanner.finish())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[tokio::test]
    async fn test_within_releases_on_timeout() {
        let released = Cell::new(false);
        let outcome = within(
            Duration::from_millis(10),
            std::future::pending::<Result<(), TransportError>>(),
            async { released.set(true) },
        )
        .await;
        assert!(outcome.is_none());
        assert!(released.get());
    }

    #[tokio::test]
    async fn test_within_keeps_connection_on_success() {
        let released = Cell::new(false);
        let outcome = within(Duration::from_secs(1), async { 7 }, async {
            released.set(true)
        })
        .await;
        assert_eq!(outcome, Some(7));
        assert!(!released.get());
    }
}
