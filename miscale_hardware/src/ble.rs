//! Bluetooth LE transport for the scale (btleplug).
//!
//! btleplug is async; the transport owns a current-thread tokio runtime and blocks
//! on it, so it plugs into the same synchronous `Transport` seam as the simulator.

use std::pin::Pin;
use std::time::Duration;

use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter, ValueNotification};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::{Stream, StreamExt};
use miscale_traits::{Transport, TransportError};
use uuid::Uuid;

use crate::error::{HwError, Result};

pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x0000181b_0000_1000_8000_00805f9b34fb);
pub const MEASUREMENT_UUID: Uuid = Uuid::from_u128(0x00002a9c_0000_1000_8000_00805f9b34fb);

/// Upper bound on the GATT connect handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

type Notifications = Pin<Box<dyn Stream<Item = ValueNotification> + Send>>;

fn ble(e: btleplug::Error) -> HwError {
    HwError::Ble(e.to_string())
}

pub struct BleScale {
    rt: tokio::runtime::Runtime,
    scan_timeout: Duration,
    peripheral: Option<Peripheral>,
    notifications: Option<Notifications>,
}

impl BleScale {
    pub fn new(scan_timeout: Duration) -> Result<Self> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            rt,
            scan_timeout,
            peripheral: None,
            notifications: None,
        })
    }

    async fn first_adapter() -> Result<Adapter> {
        let manager = Manager::new().await.map_err(ble)?;
        let adapters = manager.adapters().await.map_err(ble)?;
        adapters.into_iter().next().ok_or(HwError::NoAdapter)
    }

    /// Scan for the body composition service and pick `target` (by address) or the first hit.
    async fn discover(
        central: &Adapter,
        target: Option<&str>,
        scan_timeout: Duration,
    ) -> Result<Peripheral> {
        central
            .start_scan(ScanFilter {
                services: vec![SERVICE_UUID],
            })
            .await
            .map_err(ble)?;
        tokio::time::sleep(scan_timeout).await;
        if let Err(e) = central.stop_scan().await {
            tracing::debug!(error = %e, "stop_scan failed");
        }

        for p in central.peripherals().await.map_err(ble)? {
            let address = p.address().to_string();
            match target {
                Some(t) if t.eq_ignore_ascii_case(&address) => return Ok(p),
                Some(_) => continue,
                None => {
                    if let Ok(Some(props)) = p.properties().await
                        && props.services.contains(&SERVICE_UUID)
                    {
                        tracing::info!(%address, name = ?props.local_name, "found scale");
                        return Ok(p);
                    }
                }
            }
        }
        Err(HwError::NotFound)
    }

    async fn open(
        target: Option<&str>,
        scan_timeout: Duration,
    ) -> Result<(Peripheral, Notifications)> {
        let central = Self::first_adapter().await?;
        let peripheral = Self::discover(&central, target, scan_timeout).await?;
        tokio::time::timeout(CONNECT_TIMEOUT, peripheral.connect())
            .await
            .map_err(|_elapsed| HwError::Timeout)?
            .map_err(ble)?;
        peripheral.discover_services().await.map_err(ble)?;
        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == MEASUREMENT_UUID)
            .ok_or(HwError::MissingCharacteristic)?;
        peripheral.subscribe(&characteristic).await.map_err(ble)?;
        let stream = peripheral.notifications().await.map_err(ble)?;
        Ok((peripheral, stream))
    }
}

impl Transport for BleScale {
    fn connect(&mut self, target: Option<&str>) -> std::result::Result<String, TransportError> {
        let scan_timeout = self.scan_timeout;
        let (peripheral, stream) = self.rt.block_on(Self::open(target, scan_timeout))?;
        let id = peripheral.address().to_string();
        tracing::info!(device = %id, "subscribed to measurement characteristic");
        self.peripheral = Some(peripheral);
        self.notifications = Some(stream);
        Ok(id)
    }

    fn next_payload(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<Option<Vec<u8>>, TransportError> {
        let stream = self.notifications.as_mut().ok_or(HwError::NotConnected)?;
        let next = self
            .rt
            .block_on(async { tokio::time::timeout(timeout, stream.next()).await });
        match next {
            Err(_elapsed) => Ok(None),
            Ok(None) => Err(Box::new(HwError::Disconnected)),
            Ok(Some(n)) if n.uuid == MEASUREMENT_UUID => Ok(Some(n.value)),
            Ok(Some(_)) => Ok(None),
        }
    }

    fn stop(&mut self) -> std::result::Result<(), TransportError> {
        self.notifications = None;
        if let Some(p) = self.peripheral.take() {
            self.rt.block_on(p.disconnect()).map_err(ble)?;
        }
        Ok(())
    }
}
