//! Si4461 wiring for the ESP32-S3 gateway board.
//!
//! # Pin Configuration
//!
//! | Signal | GPIO | Notes |
//! |--------|------|-------|
//! | SPI MOSI | 11 | Master Out Slave In |
//! | SPI MISO | 13 | Master In Slave Out |
//! | SPI CLK | 12 | SPI Clock |
//! | NSEL (CS) | 10 | Chip Select |
//! | SDN | 5 | Shutdown, active high |
//! | CTS | 4 | Clear To Send (chip GPIO1) |
//! | SYNC | 1 | Sync word detect (chip GPIO3), rising edge |

use super::profile::RadioProfile;
use super::si446x::Si446x;
use super::sync::SyncWait;
use esp_idf_hal::delay::{Ets, TickType};
use esp_idf_hal::gpio::{
    Gpio1, Gpio10, Gpio11, Gpio12, Gpio13, Gpio4, Gpio5, Input, InterruptType, Output, PinDriver,
};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::spi::config::Config as SpiConfig;
use esp_idf_hal::spi::config::DriverConfig;
use esp_idf_hal::spi::{SpiDeviceDriver, SpiDriver, SPI2};
use esp_idf_hal::task::notification::Notification;
use esp_idf_hal::units::FromValueType;
use esp_idf_sys::EspError;
use log::warn;
use std::num::NonZeroU32;

/// The board's radio, fully typed.
pub type BoardRadio<'d> = Si446x<
    SpiDeviceDriver<'d, SpiDriver<'d>>,
    PinDriver<'d, Gpio5, Output>,
    PinDriver<'d, Gpio4, Input>,
    Ets,
    SyncDetect<'d>,
>;

/// Sync-detect line wired to a task notification.
pub struct SyncDetect<'d> {
    pin: PinDriver<'d, Gpio1, Input>,
    notification: Notification,
}

impl<'d> SyncDetect<'d> {
    pub fn new(pin: impl Peripheral<P = Gpio1> + 'd) -> Result<Self, EspError> {
        let mut pin = PinDriver::input(pin)?;
        pin.set_interrupt_type(InterruptType::PosEdge)?;

        let notification = Notification::new();
        let notifier = notification.notifier();
        // SAFETY: the callback only posts a task notification, which is ISR-safe.
        unsafe {
            pin.subscribe(move || {
                notifier.notify_and_yield(NonZeroU32::MIN);
            })?;
        }
        pin.enable_interrupt()?;

        Ok(Self { pin, notification })
    }

    fn rearm(&mut self) {
        // The driver disables the interrupt after each edge.
        if let Err(e) = self.pin.enable_interrupt() {
            warn!("Failed to re-arm sync interrupt: {:?}", e);
        }
    }
}

impl SyncWait for SyncDetect<'_> {
    fn clear(&mut self) {
        let _ = self.notification.wait(0);
        self.rearm();
    }

    fn wait(&mut self, timeout_ms: u32) -> bool {
        let ticks = TickType::new_millis(timeout_ms as u64).ticks();
        let detected = self.notification.wait(ticks).is_some();
        self.rearm();
        detected
    }
}

/// Bring up the SPI bus and pins for the Si4461.
///
/// This does not talk to the chip; call `Transceiver::init` afterwards.
#[allow(clippy::too_many_arguments)]
pub fn board_radio<'d>(
    spi: impl Peripheral<P = SPI2> + 'd,
    sclk: impl Peripheral<P = Gpio12> + 'd,
    mosi: impl Peripheral<P = Gpio11> + 'd,
    miso: impl Peripheral<P = Gpio13> + 'd,
    cs: impl Peripheral<P = Gpio10> + 'd,
    sdn: impl Peripheral<P = Gpio5> + 'd,
    cts: impl Peripheral<P = Gpio4> + 'd,
    sync: impl Peripheral<P = Gpio1> + 'd,
) -> Result<BoardRadio<'d>, EspError> {
    // Si4461 supports 10 MHz; stay conservative on the board wiring.
    let spi_config = SpiConfig::new().baudrate(2.MHz().into());
    let driver_config = DriverConfig::new();

    let spi_driver = SpiDriver::new(spi, sclk, mosi, Some(miso), &driver_config)?;
    let spi_device = SpiDeviceDriver::new(spi_driver, Some(cs), &spi_config)?;

    let sdn_pin = PinDriver::output(sdn)?;
    let cts_pin = PinDriver::input(cts)?;
    let sync_detect = SyncDetect::new(sync)?;

    Ok(Si446x::new(
        spi_device,
        sdn_pin,
        cts_pin,
        Ets,
        sync_detect,
        RadioProfile::WISAFE,
    ))
}
