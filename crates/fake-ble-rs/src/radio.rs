use crate::{
    data_manipulation::{chunk, crc24_ble, reverse_bits, whiten},
    error::{BleConfigError, FakeBleError},
    interface::{ble_config, pa_level_dbm, BleRadio},
    payload::{BlePayload, PduHeader, FLAGS, SHORTENED_NAME, TX_POWER},
};
use alloc::{collections::VecDeque, vec::Vec};
use rand_core::RngCore;

#[cfg(all(feature = "std", not(target_os = "none")))]
use alloc::string::String;

/// The supported channels used amongst BLE devices.
pub const BLE_CHANNEL: [u8; 3] = [2, 26, 80];

/// A namespace of methods to manage the supported range of BLE channels.
pub struct BleChannels;

impl BleChannels {
    /// Get the index of [`BLE_CHANNEL`] for the given `channel`.
    ///
    /// Returns [`None`] if the given `channel` is not in [`BLE_CHANNEL`].
    pub fn index_of(channel: u8) -> Option<usize> {
        BLE_CHANNEL.iter().position(|ch| *ch == channel)
    }

    /// Get the index of [`BLE_CHANNEL`] that follows the given `index`.
    pub const fn next_index(index: usize) -> usize {
        if index < BLE_CHANNEL.len() - 1 {
            index + 1
        } else {
            0
        }
    }

    /// The whitening coefficient for the [`BLE_CHANNEL`] at the given `index`.
    ///
    /// This corresponds to the logical BLE channel (37, 38, or 39).
    pub const fn coefficient(index: usize) -> u8 {
        (index as u8).wrapping_add(37) | 0x40
    }
}

/// A struct that implements BLE functionality.
///
/// This implementation is subject to [Limitations](index.html#limitations).
///
/// The radio is not owned by this struct; it is borrowed by each method that
/// needs it. Use [`FakeBle::begin()`] to configure the radio for BLE compatibility.
///
/// ```ignore
/// use rf24::radio::RF24;
/// use fake_ble::{services::{prelude::*, BatteryService}, FakeBle};
///
/// let mut radio = RF24::new(ce_pin, spi_device, delay_impl);
/// let mut ble = FakeBle::new(&mut rng);
/// if !ble.begin(&mut radio)? {
///     panic!("radio hardware is not responding");
/// }
/// ble.set_name(Some(b"nRF24"))?;
///
/// let mut battery = BatteryService::new();
/// battery.set_data(85);
/// ble.advertise_chunks(&mut radio, &[&battery.chunk()])?;
/// ble.hop_channel(&mut radio)?;
/// ```
#[derive(Debug)]
pub struct FakeBle {
    name: Option<Vec<u8>>,
    show_pa_level: bool,
    mac_address: [u8; 6],
    channel_index: usize,
    rx_queue: VecDeque<BlePayload>,
}

impl FakeBle {
    const PROFILE_FLAGS: u8 = 5;
    /// The bytes left for optional chunks and data in an advertisement.
    const MAX_DATA_LEN: usize = 18;
    /// The bytes occupied by a PA level chunk.
    const PA_LEVEL_LEN: usize = 3;
    /// The longest frame the radio can transmit.
    const MAX_FRAME_LEN: usize = 32;

    /// Instantiate a BLE device with a random MAC address.
    pub fn new<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        let mut mac_address = [0u8; 6];
        rng.fill_bytes(&mut mac_address);
        Self::with_mac_address(mac_address)
    }

    /// Instantiate a BLE device with the given `mac_address`.
    pub fn with_mac_address(mac_address: [u8; 6]) -> Self {
        Self {
            name: None,
            show_pa_level: false,
            mac_address,
            channel_index: 0,
            rx_queue: VecDeque::new(),
        }
    }

    /// Initialize the radio and configure it for BLE compatibility.
    ///
    /// Returns `Ok(false)` if the radio's hardware is not responding.
    /// In that case, the radio is not configured.
    /// Otherwise, the radio is left in RX mode on the first [`BLE_CHANNEL`].
    pub fn begin<R: BleRadio>(&mut self, radio: &mut R) -> Result<bool, R::Error> {
        if !radio.begin()? {
            return Ok(false);
        }
        radio.configure(&ble_config())?;
        self.channel_index = 0;
        radio.set_channel(BLE_CHANNEL[0])?;
        radio.power_up()?;
        radio.set_listening(true)?;
        Ok(true)
    }

    /// The BLE device's MAC address.
    pub fn mac_address(&self) -> [u8; 6] {
        self.mac_address
    }

    /// Set the BLE device's MAC address.
    ///
    /// A MAC address is required by BLE specifications.
    /// Use this to uniquely identify the BLE device.
    ///
    /// If `address` is [`None`], then a random address is generated with `rng`.
    /// An `address` shorter than 6 bytes is padded with random bytes.
    /// Only the first 6 bytes of a longer `address` are used.
    pub fn set_mac_address<R: RngCore + ?Sized>(&mut self, address: Option<&[u8]>, rng: &mut R) {
        let address = address.unwrap_or_default();
        let len = address.len().min(6);
        self.mac_address[..len].copy_from_slice(&address[..len]);
        rng.fill_bytes(&mut self.mac_address[len..]);
    }

    /// Set the BLE device's MAC address from the 6 least significant bytes of an integer.
    pub fn set_mac_address_u64(&mut self, address: u64) {
        self.mac_address
            .copy_from_slice(&address.to_le_bytes()[..6]);
    }

    /// The current BLE device name included in advertisements.
    pub fn name(&self) -> Option<&[u8]> {
        self.name.as_deref()
    }

    /// Set the BLE device's name for inclusion in advertisements.
    ///
    /// Setting a BLE device name will occupy more bytes from the
    /// 18 available bytes in advertisements. The exact number of bytes occupied
    /// is the length of the given `name` buffer plus 2.
    ///
    /// The maximum supported name length is 18 bytes (or 15 bytes if
    /// [`FakeBle::show_pa_level()`] is enabled). An empty `name` or [`None`]
    /// removes the name from advertisements.
    pub fn set_name(&mut self, name: Option<&[u8]>) -> Result<(), BleConfigError> {
        match name {
            Some(name) if !name.is_empty() => {
                let max = Self::MAX_DATA_LEN - self.pa_level_len();
                if name.len() > max {
                    return Err(BleConfigError::NameTooLong {
                        length: name.len(),
                        max,
                    });
                }
                self.name = Some(name.to_vec());
            }
            _ => self.name = None,
        }
        Ok(())
    }

    /// Is the radio's PA level included in advertisements?
    pub fn show_pa_level(&self) -> bool {
        self.show_pa_level
    }

    /// Enable or disable the inclusion of the radio's PA level in advertisements.
    ///
    /// Enabling this feature occupies 3 bytes of the 18 available bytes in
    /// advertised payloads. It cannot be enabled while the device name is
    /// longer than 16 bytes.
    pub fn set_show_pa_level(&mut self, enable: bool) -> Result<(), BleConfigError> {
        let name_length = self.name.as_ref().map_or(0, Vec::len);
        if enable && name_length > 16 {
            return Err(BleConfigError::NoRoomForPaLevel { name_length });
        }
        self.show_pa_level = enable;
        Ok(())
    }

    /// The index of [`BLE_CHANNEL`] currently in use.
    pub fn channel_index(&self) -> usize {
        self.channel_index
    }

    /// The (physical) radio channel currently in use.
    pub fn channel(&self) -> u8 {
        BLE_CHANNEL[self.channel_index]
    }

    /// Hop the radio's current channel to the next BLE compliant frequency.
    ///
    /// Use this function after [`FakeBle::advertise()`] to comply with BLE specifications.
    /// This is not required, but it is recommended to avoid bandwidth pollution.
    pub fn hop_channel<R: BleRadio>(&mut self, radio: &mut R) -> Result<(), R::Error> {
        let index = BleChannels::next_index(self.channel_index);
        radio.set_channel(BLE_CHANNEL[index])?;
        self.channel_index = index;
        Ok(())
    }

    fn pa_level_len(&self) -> usize {
        if self.show_pa_level {
            Self::PA_LEVEL_LEN
        } else {
            0
        }
    }

    /// The bytes available for data after the name and (optionally) PA level chunks.
    fn budget(&self, pa_level_len: usize) -> isize {
        let name_len = self.name.as_ref().map_or(0, |name| name.len() + 2);
        Self::MAX_DATA_LEN as isize - name_len as isize - pa_level_len as isize
    }

    /// How many bytes are available in an advertisement payload?
    ///
    /// The `hypothetical` parameter shall be the data (already chunked) to be advertised.
    ///
    /// In addition to the given `hypothetical` payload length, this function also
    /// accounts for the current state of [`FakeBle::name()`] and
    /// [`FakeBle::show_pa_level()`].
    ///
    /// If the returned value is less than `0`, then the `hypothetical` payload will not
    /// be broadcasted.
    pub fn len_available(&self, hypothetical: &[u8]) -> isize {
        self.budget(self.pa_level_len()) - hypothetical.len() as isize
    }

    /// Whiten (or de-whiten) the given `buf` for the current channel.
    pub fn whiten(&self, buf: &mut [u8]) {
        whiten(buf, BleChannels::coefficient(self.channel_index));
    }

    /// Assemble an advertisement PDU (including its CRC) from the given (already chunked) `payload`.
    ///
    /// A PA level chunk is included if `pa_level` (in dBm) is given.
    /// The result is not whitened. See [`FakeBle::make_payload()`].
    pub fn assemble(&self, payload: &[u8], pa_level: Option<i8>) -> Result<Vec<u8>, BleConfigError> {
        let pa_level_len = pa_level.map_or(0, |_| Self::PA_LEVEL_LEN);
        let available = self.budget(pa_level_len) - payload.len() as isize;
        if available < 0 {
            return Err(BleConfigError::PayloadOverflow {
                overflow: available.unsigned_abs(),
            });
        }

        let mut buf = Vec::with_capacity(Self::MAX_FRAME_LEN);
        buf.push(PduHeader::adv_nonconn_ind().into_bits());
        // excludes the PDU header, this byte, and the CRC
        buf.push(0);
        buf.extend_from_slice(&self.mac_address);
        buf.extend_from_slice(&chunk(&[Self::PROFILE_FLAGS], FLAGS));
        if let Some(pa_level) = pa_level {
            buf.extend_from_slice(&chunk(&[pa_level as u8], TX_POWER));
        }
        if let Some(name) = &self.name {
            buf.extend_from_slice(&chunk(name, SHORTENED_NAME));
        }
        buf.extend_from_slice(payload);
        buf[1] = (buf.len() - 2) as u8;

        let crc = crc24_ble(&buf);
        buf.extend_from_slice(&crc);
        Ok(buf)
    }

    /// Create a buffer to be transmitted as a BLE advertisement.
    ///
    /// This is a helper method to [`FakeBle::advertise()`], but it is publicly exposed for
    /// advanced usage only (eg. FFI binding).
    ///
    /// The PDU is assembled with [`FakeBle::assemble()`], then whitened for the
    /// current channel, then the bits in each byte are reversed.
    pub fn make_payload(
        &self,
        payload: &[u8],
        pa_level: Option<i8>,
    ) -> Result<Vec<u8>, BleConfigError> {
        let mut buf = self.assemble(payload, pa_level)?;
        self.whiten(&mut buf);
        reverse_bits(&mut buf);
        Ok(buf)
    }

    /// Send a BLE advertisement.
    ///
    /// The given `buf` is packed as a single chunk of the given `data_type`
    /// (use `0xFF` for manufacturer specific data).
    /// If `buf` is empty, then the advertisement carries no data.
    ///
    /// See our convenient API to
    /// - advertise a Battery's remaining change level: [`BatteryService`](struct@crate::services::BatteryService)
    /// - advertise a Temperature measurement: [`TemperatureService`](struct@crate::services::TemperatureService)
    /// - advertise a URL: [`UrlService`](struct@crate::services::UrlService)
    ///
    /// These are best sent with [`FakeBle::advertise_chunks()`].
    ///
    /// The radio is left in TX mode.
    pub fn advertise<R: BleRadio>(
        &self,
        radio: &mut R,
        buf: &[u8],
        data_type: u8,
    ) -> Result<bool, FakeBleError<R::Error>> {
        if buf.is_empty() {
            self.transmit(radio, buf)
        } else {
            self.transmit(radio, &chunk(buf, data_type))
        }
    }

    /// Send a BLE advertisement composed of the given (already chunked) buffers.
    ///
    /// For a custom/proprietary BLE service, each buffer must adopt compliance with BLE specifications.
    /// For example, a buffer of `n` bytes shall be formed as follows:
    ///
    /// | index | value |
    /// |:------|:------|
    /// | `0` | `n - 1` |
    /// | `1` | `0xFF`  |
    /// | `2 ... n - 1` | custom data |
    ///
    /// The radio is left in TX mode.
    pub fn advertise_chunks<R: BleRadio>(
        &self,
        radio: &mut R,
        chunks: &[&[u8]],
    ) -> Result<bool, FakeBleError<R::Error>> {
        self.transmit(radio, &chunks.concat())
    }

    fn transmit<R: BleRadio>(
        &self,
        radio: &mut R,
        payload: &[u8],
    ) -> Result<bool, FakeBleError<R::Error>> {
        let available = self.len_available(payload);
        if available < 0 {
            return Err(BleConfigError::PayloadOverflow {
                overflow: available.unsigned_abs(),
            }
            .into());
        }
        let pa_level = if self.show_pa_level {
            Some(pa_level_dbm(radio.pa_level().map_err(FakeBleError::Radio)?))
        } else {
            None
        };
        let buf = self.make_payload(payload, pa_level)?;
        radio.set_listening(false).map_err(FakeBleError::Radio)?;
        radio.write(&buf).map_err(FakeBleError::Radio)
    }

    /// Check the radio for a received advertisement.
    ///
    /// If the radio has received a payload, then it is decoded (using the current
    /// channel) and queued. Payloads that are malformed or fail the CRC check are
    /// discarded.
    ///
    /// Returns `true` if there is a decoded advertisement waiting in the queue.
    /// The queue is not limited; use [`FakeBle::read()`] to drain it.
    pub fn available<R: BleRadio>(&mut self, radio: &mut R) -> Result<bool, R::Error> {
        if radio.available()? {
            let mut buf = [0u8; Self::MAX_FRAME_LEN];
            let len = radio.read(&mut buf)? as usize;
            let len = len.min(Self::MAX_FRAME_LEN);
            if let Some(payload) = BlePayload::from_bytes(&mut buf[..len], self.channel_index) {
                self.rx_queue.push_back(payload);
            }
        }
        Ok(!self.rx_queue.is_empty())
    }

    /// Pop the oldest decoded advertisement from the queue.
    ///
    /// Returns [`None`] if the queue is empty.
    /// Use [`FakeBle::available()`] to fill the queue.
    pub fn read(&mut self) -> Option<BlePayload> {
        self.rx_queue.pop_front()
    }

    /// The number of decoded advertisements waiting in the queue.
    pub fn rx_queue_len(&self) -> usize {
        self.rx_queue.len()
    }

    /// Print debugging information about the radio and the BLE settings.
    pub fn print_details<R: BleRadio>(&self, radio: &mut R) -> Result<(), R::Error> {
        radio.print_details()?;

        #[cfg(all(feature = "defmt", target_os = "none"))]
        {
            defmt::println!(
                "BLE device name___________{=[u8]:a}",
                self.name().unwrap_or_default()
            );
            defmt::println!("Broadcasting PA Level_____{=bool}", self.show_pa_level);
            defmt::println!("BLE channel_______________{=u8}", self.channel());
        }

        #[cfg(all(feature = "std", not(target_os = "none")))]
        {
            std::println!(
                "BLE device name___________{}",
                String::from_utf8_lossy(self.name().unwrap_or_default())
            );
            std::println!("Broadcasting PA Level_____{}", self.show_pa_level);
            std::println!("BLE channel_______________{}", self.channel());
        }

        Ok(())
    }
}
