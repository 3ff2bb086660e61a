//! The boundary between [`FakeBle`](struct@crate::FakeBle) and the radio hardware.

use crate::BLE_CHANNEL;
use embedded_hal::{delay::DelayNs, digital::OutputPin, spi::SpiDevice};
use rf24::{
    radio::{
        prelude::{
            EsbChannel, EsbDetails, EsbFifo, EsbInit, EsbPaLevel, EsbPower, EsbRadio,
            RadioErrorType,
        },
        Nrf24Error, RadioConfig, RF24,
    },
    CrcLength, DataRate, PaLevel,
};

/// The only address usable in BLE context.
///
/// Only the first 4 bytes are used because BLE uses a 4 byte address length.
pub const BLE_ADDRESS: [u8; 5] = [0x71, 0x91, 0x7D, 0x6B, 0x00];

/// The capabilities of a transceiver that [`FakeBle`](struct@crate::FakeBle) relies on.
///
/// The radio is borrowed for the duration of each [`FakeBle`](struct@crate::FakeBle)
/// method call; it is never owned by the BLE layer.
pub trait BleRadio {
    type Error;

    /// Initialize the radio's hardware.
    ///
    /// Returns `Ok(false)` if the radio is not responding.
    fn begin(&mut self) -> Result<bool, Self::Error>;

    /// Reconfigure the radio with the given `config`.
    fn configure(&mut self, config: &RadioConfig) -> Result<(), Self::Error>;

    /// Set the radio's (physical) channel.
    fn set_channel(&mut self, channel: u8) -> Result<(), Self::Error>;

    /// Power up the radio.
    fn power_up(&mut self) -> Result<(), Self::Error>;

    /// Enter RX mode (`true`) or TX mode (`false`).
    fn set_listening(&mut self, enable: bool) -> Result<(), Self::Error>;

    /// Get the radio's configured Power Amplifier level.
    fn pa_level(&mut self) -> Result<PaLevel, Self::Error>;

    /// Blocking transmission of a single frame.
    fn write(&mut self, buf: &[u8]) -> Result<bool, Self::Error>;

    /// Is there a received frame waiting to be read?
    fn available(&mut self) -> Result<bool, Self::Error>;

    /// Read the next received frame into `buf`, returning the number of bytes stored.
    fn read(&mut self, buf: &mut [u8]) -> Result<u8, Self::Error>;

    /// Print debugging information about the radio's configuration.
    fn print_details(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Returns a [`RadioConfig`] object tailored for OTA compatibility with
/// BLE specifications.
///
/// This configuration complies with inherent [Limitations](index.html#limitations).
pub fn ble_config() -> RadioConfig {
    RadioConfig::default()
        .with_channel(BLE_CHANNEL[0])
        .with_crc_length(CrcLength::Disabled)
        .with_data_rate(DataRate::Mbps1)
        .with_auto_ack(0)
        .with_auto_retries(0, 0)
        .with_dynamic_payloads(false)
        .with_payload_length(32)
        .with_address_length(4)
        .with_rx_address(0, &BLE_ADDRESS)
        .close_rx_pipe(1)
        .with_tx_address(&BLE_ADDRESS)
}

/// Translate a [`PaLevel`] into the dBm value advertised by the nRF24L01.
pub const fn pa_level_dbm(pa_level: PaLevel) -> i8 {
    match pa_level {
        PaLevel::Min => -18,
        PaLevel::Low => -12,
        PaLevel::High => -6,
        PaLevel::Max => 0,
    }
}

impl<SPI, DO, DELAY> BleRadio for RF24<SPI, DO, DELAY>
where
    SPI: SpiDevice,
    DO: OutputPin,
    DELAY: DelayNs,
{
    type Error = <Self as RadioErrorType>::Error;

    fn begin(&mut self) -> Result<bool, Self::Error> {
        match EsbInit::init(self) {
            Ok(()) => Ok(true),
            Err(Nrf24Error::BinaryCorruption) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn configure(&mut self, config: &RadioConfig) -> Result<(), Self::Error> {
        EsbInit::with_config(self, config)
    }

    fn set_channel(&mut self, channel: u8) -> Result<(), Self::Error> {
        EsbChannel::set_channel(self, channel)
    }

    fn power_up(&mut self) -> Result<(), Self::Error> {
        EsbPower::power_up(self, None)
    }

    fn set_listening(&mut self, enable: bool) -> Result<(), Self::Error> {
        if enable {
            EsbRadio::as_rx(self)
        } else {
            EsbRadio::as_tx(self, None)
        }
    }

    fn pa_level(&mut self) -> Result<PaLevel, Self::Error> {
        EsbPaLevel::get_pa_level(self)
    }

    fn write(&mut self, buf: &[u8]) -> Result<bool, Self::Error> {
        // Disregarding any hardware error, `RF24::send()` should
        // always return `Ok(true)` because auto-ack is off.
        EsbRadio::send(self, buf, false)
    }

    fn available(&mut self) -> Result<bool, Self::Error> {
        EsbFifo::available(self)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<u8, Self::Error> {
        EsbRadio::read(self, buf, None)
    }

    fn print_details(&mut self) -> Result<(), Self::Error> {
        EsbDetails::print_details(self)
    }
}
