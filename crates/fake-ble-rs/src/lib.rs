#![no_std]
#![doc(
    html_logo_url = "https://raw.githubusercontent.com/nRF24/rf24-rs/main/docs/src/images/logo-square.png"
)]
#![doc(html_favicon_url = "https://github.com/nRF24/rf24-rs/raw/main/docs/src/images/favicon.ico")]
#![doc = include_str!("../README.md")]
//! ## Limitations
//!
//! Because the nRF24L01 wasn't designed for BLE advertising, it has some limitations that users should beware.
//!
//! 1. The maximum payload length is shortened to **18** bytes (when not broadcasting a device
//!    name nor the radio's PA level). This is calculated as:
//!
//!    ```text
//!    32 (nRF24L01 maximum) - 2 (PDU header) - 6 (MAC address) - 3 (required flags) - 3 (CRC checksum) = 18
//!    ```
//!
//!    Use the helper function [`FakeBle::len_available()`](fn@crate::FakeBle::len_available())
//!    to determine if your payload will transmit.
//! 2. The channels that BLE use are limited to the following three:
//!
//!    - 2.402 GHz
//!    - 2.426 GHz
//!    - 2.480 GHz.
//!
//!    For convenience, use [`FakeBle::hop_channel()`](fn@crate::FakeBle::hop_channel())
//!    to switch between these frequencies. Received payloads can only be decoded
//!    on the channel they were received.
//! 3. CRC length is disabled in the nRF24L01 firmware because BLE specifications require 3 bytes,
//!    and the nRF24L01 firmware can only handle a maximum of 2.
//!    Thus, we append the required 3 bytes of the calculated CRC24 into the payload.
//! 4. Address length of a BLE packet only uses 4 bytes.
//! 5. The auto-ack (automatic acknowledgment) feature of the nRF24L01 is useless
//!    when transmitting to BLE devices, thus the automatic re-transmit and custom ACK payloads
//!    features are useless because they both depend on the automatic acknowledgments feature.
//! 6. Dynamic payloads feature of the nRF24L01 isn't compatible with BLE specifications.
//! 7. BLE specifications only allow using 1 Mbps RF data rate, so that too has been hard coded.
//! 8. Only the "on data sent" (`tx_ds`) & "on data ready" (`rx_dr`) events will have
//!    an effect on the interrupt (IRQ) pin. The "on data fail" is never
//!    triggered when the auto-ack feature is disabled.
//! 9. Decoded advertisements are queued without limit until they are
//!    [read](fn@crate::FakeBle::read).

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

mod error;
pub use error::{BleConfigError, FakeBleError};

mod interface;
pub use interface::{ble_config, pa_level_dbm, BleRadio, BLE_ADDRESS};

mod radio;
pub use radio::{BleChannels, FakeBle, BLE_CHANNEL};

mod payload;
pub use payload::{
    BlePayload, DeviceName, PduHeader, COMPLETE_NAME, FLAGS, SHORTENED_NAME, TX_POWER,
};

pub mod data_manipulation;

pub mod services;
