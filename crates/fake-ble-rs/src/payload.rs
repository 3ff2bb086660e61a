use crate::{
    data_manipulation::{address_repr, crc24_ble, reverse_bits, whiten, SERVICE_DATA},
    services::ServiceData,
    BleChannels,
};
use alloc::{string::String, vec::Vec};
use bitfield_struct::bitfield;
use core::fmt::{Display, Formatter, Result};

/// Chunk type declaring the device's capabilities.
pub const FLAGS: u8 = 0x01;
/// Chunk type for the shortened local name of the device.
pub const SHORTENED_NAME: u8 = 0x08;
/// Chunk type for the complete local name of the device.
pub const COMPLETE_NAME: u8 = 0x09;
/// Chunk type for the transmitting power level (in dBm).
pub const TX_POWER: u8 = 0x0A;

/// The first byte of an advertising channel PDU.
#[bitfield(u8, order = Msb)]
#[derive(PartialEq, Eq)]
pub struct PduHeader {
    /// Is the receiver's address random?
    pub rx_add: bool,
    /// Is the advertiser's address random?
    pub tx_add: bool,
    /// Does the advertiser support the LE Channel Selection Algorithm #2?
    pub ch_sel: bool,
    #[bits(1)]
    _reserved: u8,
    /// The kind of advertisement.
    #[bits(4)]
    pub pdu_type: u8,
}

impl PduHeader {
    /// A non-connectable, non-scannable, undirected advertisement.
    pub const ADV_NONCONN_IND: u8 = 2;

    /// The header used by all advertisements sent from [`FakeBle`](struct@crate::FakeBle).
    ///
    /// The nRF24L01 can't receive scan requests or connections,
    /// and the MAC address is not a public (registered) address.
    pub const fn adv_nonconn_ind() -> Self {
        Self::new()
            .with_tx_add(true)
            .with_pdu_type(Self::ADV_NONCONN_IND)
    }
}

/// A BLE device name found in a received advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceName {
    Utf8(String),
    /// The name was not valid UTF-8.
    Raw(Vec<u8>),
}

impl DeviceName {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            DeviceName::Utf8(name) => name.as_bytes(),
            DeviceName::Raw(name) => name,
        }
    }
}

impl From<&[u8]> for DeviceName {
    fn from(value: &[u8]) -> Self {
        match core::str::from_utf8(value) {
            Ok(name) => DeviceName::Utf8(String::from(name)),
            Err(_) => DeviceName::Raw(value.to_vec()),
        }
    }
}

impl Display for DeviceName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            DeviceName::Utf8(name) => write!(f, "{name}"),
            DeviceName::Raw(name) => write!(f, "{}", address_repr(name, false, " ")),
        }
    }
}

/// A structure to represent received BLE data.
#[derive(Debug, Clone, PartialEq)]
pub struct BlePayload {
    /// The advertisement's PDU header.
    pub pdu_header: PduHeader,
    /// The transmitting BLE device's MAC address
    pub mac_address: [u8; 6],
    /// The transmitting device's name (if included).
    pub name: Option<DeviceName>,
    /// The transmitting device's PA Level (if included).
    pub pa_level: Option<i8>,
    /// The decoded service data and any chunks that could not be decoded.
    ///
    /// Chunks that are not recognized are kept as complete
    /// chunks in [`ServiceData::RawBytes`].
    pub data: Vec<ServiceData>,
}

impl BlePayload {
    /// The longest PDU (excluding the CRC) that fits in the radio's 32 byte payload.
    const MAX_PDU_LEN: usize = 30;
    /// The PDU header, length, and MAC address.
    const MIN_PDU_LEN: usize = 8;

    /// Create a [`BlePayload`] from a buffer received over the air.
    ///
    /// The given `buf` is de-whitened (in place) using the `channel_index` of
    /// [`BLE_CHANNEL`](value@crate::BLE_CHANNEL) on which it was received.
    ///
    /// Returns [`None`] if the declared length is implausible or the CRC does not match.
    pub fn from_bytes(buf: &mut [u8], channel_index: usize) -> Option<BlePayload> {
        reverse_bits(buf);
        whiten(buf, BleChannels::coefficient(channel_index));
        let end = Self::validate(buf)?;
        Some(Self::parse(&buf[..end]))
    }

    /// Check the length and CRC of a de-whitened PDU.
    ///
    /// Returns the length of the PDU excluding the CRC.
    fn validate(buf: &[u8]) -> Option<usize> {
        if buf.len() < 2 {
            return None;
        }
        let end = buf[1] as usize + 2;
        if !(Self::MIN_PDU_LEN..Self::MAX_PDU_LEN).contains(&end) || end + 3 > buf.len() {
            return None;
        }
        if buf[end..end + 3] != crc24_ble(&buf[..end]) {
            return None;
        }
        Some(end)
    }

    fn parse(buf: &[u8]) -> BlePayload {
        let mut mac_address = [0u8; 6];
        mac_address.copy_from_slice(&buf[2..8]);
        let mut result = BlePayload {
            pdu_header: PduHeader::from_bits(buf[0]),
            mac_address,
            name: None,
            pa_level: None,
            data: Vec::new(),
        };

        let mut index = Self::MIN_PDU_LEN;
        while index < buf.len() {
            let size = buf[index] as usize;
            let next = index + 1 + size;
            if size == 0 || next > buf.len() {
                // malformed; keep what's left as is
                result.data.push(ServiceData::RawBytes(buf[index..].to_vec()));
                break;
            }
            result.decode_chunk(&buf[index..next]);
            index = next;
        }
        result
    }

    /// Decode a single `chunk` (including its length and type bytes).
    fn decode_chunk(&mut self, chunk: &[u8]) {
        let body = &chunk[2..];
        match chunk[1] {
            FLAGS => (),
            TX_POWER if body.len() == 1 => self.pa_level = Some(body[0] as i8),
            SHORTENED_NAME | COMPLETE_NAME => self.name = Some(DeviceName::from(body)),
            SERVICE_DATA => self.data.push(
                ServiceData::from_service_buffer(body)
                    .unwrap_or_else(|| ServiceData::RawBytes(chunk.to_vec())),
            ),
            _ => self.data.push(ServiceData::RawBytes(chunk.to_vec())),
        }
    }
}

impl Display for BlePayload {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            "MAC address: {}",
            address_repr(&self.mac_address, true, ":")
        )?;
        if let Some(name) = &self.name {
            write!(f, "\nName: {name}")?;
        }
        if let Some(pa_level) = self.pa_level {
            write!(f, "\nPA level: {pa_level} dBm")?;
        }
        for data in &self.data {
            write!(f, "\n{data}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    extern crate std;
    use super::{BlePayload, DeviceName, PduHeader, COMPLETE_NAME, TX_POWER};
    use crate::{
        data_manipulation::{chunk, crc24_ble, reverse_bits, whiten},
        services::{prelude::*, BatteryService, ServiceData, TemperatureService, UrlService},
        test::LoopbackRadio,
        BleChannels, FakeBle,
    };
    use std::{string::ToString, vec, vec::Vec};

    const MAC: [u8; 6] = [0x01, 0x02, 0x03, 0xAB, 0xCD, 0xEF];

    /// Prepare a PDU for reception as the radio would receive it.
    fn over_the_air(pdu: &[u8], channel_index: usize) -> Vec<u8> {
        let mut buf = pdu.to_vec();
        buf.extend_from_slice(&crc24_ble(pdu));
        buf.resize(32, 0);
        whiten(&mut buf, BleChannels::coefficient(channel_index));
        reverse_bits(&mut buf);
        buf
    }

    fn pdu_with(chunks: &[u8]) -> Vec<u8> {
        let mut pdu = vec![0x42, (9 + chunks.len()) as u8];
        pdu.extend_from_slice(&MAC);
        pdu.extend_from_slice(&[2, 1, 5]);
        pdu.extend_from_slice(chunks);
        pdu
    }

    #[test]
    fn header() {
        let header = PduHeader::adv_nonconn_ind();
        assert_eq!(header.into_bits(), 0x42);
        assert!(header.tx_add());
        assert!(!header.rx_add());
        assert!(!header.ch_sel());
        assert_eq!(header.pdu_type(), PduHeader::ADV_NONCONN_IND);
        assert_eq!(PduHeader::from_bits(0x42), header);
    }

    #[test]
    fn round_trip() {
        let mut battery = BatteryService::new();
        battery.set_data(85);
        let mut temperature = TemperatureService::new();
        temperature.set_data(-4.25);
        let payload = [battery.chunk(), temperature.chunk()].concat();
        let mut radio = LoopbackRadio::default();
        let mut ble = FakeBle::with_mac_address(MAC);
        for _ in 0..3 {
            let mut frame = ble.make_payload(&payload, Some(-6)).unwrap();
            frame.resize(32, 0);
            let received = BlePayload::from_bytes(&mut frame, ble.channel_index()).unwrap();
            assert_eq!(received.pdu_header, PduHeader::adv_nonconn_ind());
            assert_eq!(received.mac_address, MAC);
            assert_eq!(received.name, None);
            assert_eq!(received.pa_level, Some(-6));
            assert_eq!(
                received.data,
                [
                    ServiceData::Battery(battery.clone()),
                    ServiceData::Temperature(temperature.clone())
                ]
            );
            ble.hop_channel(&mut radio).unwrap();
        }
    }

    #[test]
    fn url_round_trip() {
        let mut url = UrlService::new();
        url.set_data("http://www.google.com");
        let pdu = pdu_with(&url.chunk());
        let mut buf = over_the_air(&pdu, 1);
        let received = BlePayload::from_bytes(&mut buf, 1).unwrap();
        let [ServiceData::Url(decoded)] = received.data.as_slice() else {
            panic!("expected a single URL service");
        };
        assert_eq!(decoded.pa_level(), -25);
        assert_eq!(decoded.data().unwrap(), "http://www.google.com");
    }

    #[test]
    fn wrong_channel() {
        let pdu = pdu_with(&[]);
        let mut buf = over_the_air(&pdu, 0);
        assert!(BlePayload::from_bytes(&mut buf, 2).is_none());
        // a channel index far out of range is not a panic
        assert!(BlePayload::from_bytes(&mut [0u8; 32], 219).is_none());
    }

    #[test]
    fn bad_crc() {
        let pdu = pdu_with(&[]);
        let mut buf = pdu.clone();
        buf.extend_from_slice(&crc24_ble(&pdu));
        buf[10] ^= 0x10;
        whiten(&mut buf, BleChannels::coefficient(0));
        reverse_bits(&mut buf);
        assert!(BlePayload::from_bytes(&mut buf, 0).is_none());
    }

    #[test]
    fn bad_length() {
        // declared length exceeds the buffer
        let mut pdu = pdu_with(&[]);
        pdu[1] = 20;
        let mut buf = pdu.clone();
        buf.extend_from_slice(&crc24_ble(&pdu));
        whiten(&mut buf, BleChannels::coefficient(0));
        reverse_bits(&mut buf);
        assert!(BlePayload::from_bytes(&mut buf, 0).is_none());

        // declared length is too big for the radio
        let pdu = pdu_with(&[0xFF; 19]);
        let mut buf = over_the_air(&pdu, 0);
        assert!(BlePayload::from_bytes(&mut buf, 0).is_none());

        // declared length is too short for a MAC address
        let mut pdu = pdu_with(&[]);
        pdu[1] = 5;
        pdu.truncate(7);
        let mut buf = over_the_air(&pdu, 0);
        assert!(BlePayload::from_bytes(&mut buf, 0).is_none());

        assert!(BlePayload::from_bytes(&mut [0xFF], 0).is_none());
        assert!(BlePayload::from_bytes(&mut [], 0).is_none());
    }

    #[test]
    fn malformed_chunks() {
        // chunk size overruns the PDU
        let pdu = pdu_with(&[5, 0xFF, 1, 2]);
        let mut buf = over_the_air(&pdu, 0);
        let received = BlePayload::from_bytes(&mut buf, 0).unwrap();
        assert_eq!(received.data, [ServiceData::RawBytes(vec![5, 0xFF, 1, 2])]);

        // zero sized chunk stops parsing
        let pdu = pdu_with(&[0, 2, 0x0A, 0xFA]);
        let mut buf = over_the_air(&pdu, 0);
        let received = BlePayload::from_bytes(&mut buf, 0).unwrap();
        assert_eq!(received.pa_level, None);
        assert_eq!(received.data, [ServiceData::RawBytes(vec![0, 2, 0x0A, 0xFA])]);

        // TX power with an unexpected size
        let pdu = pdu_with(&[3, TX_POWER, 1, 2]);
        let mut buf = over_the_air(&pdu, 0);
        let received = BlePayload::from_bytes(&mut buf, 0).unwrap();
        assert_eq!(received.pa_level, None);
        assert_eq!(received.data, [ServiceData::RawBytes(vec![3, TX_POWER, 1, 2])]);
    }

    #[test]
    fn unknown_chunks() {
        let custom = chunk(b"\x34\x12", 0xFF);
        let unknown_uuid = chunk(b"\xFF\x0F\x01", 0x16);
        let short_service = chunk(b"\x0F", 0x16);
        let eddystone_header_only = chunk(b"\xAA\xFE\x10", 0x16);
        let chunks = [
            custom.clone(),
            unknown_uuid.clone(),
            short_service.clone(),
            eddystone_header_only.clone(),
        ]
        .concat();
        let pdu = pdu_with(&chunks);
        let mut buf = over_the_air(&pdu, 2);
        let received = BlePayload::from_bytes(&mut buf, 2).unwrap();
        assert_eq!(
            received.data,
            [
                ServiceData::RawBytes(custom),
                ServiceData::RawBytes(unknown_uuid),
                ServiceData::RawBytes(short_service),
                ServiceData::RawBytes(eddystone_header_only),
            ]
        );
    }

    #[test]
    fn names() {
        let pdu = pdu_with(&chunk(b"\xFF\xFE", COMPLETE_NAME));
        let mut buf = over_the_air(&pdu, 0);
        let received = BlePayload::from_bytes(&mut buf, 0).unwrap();
        let name = received.name.unwrap();
        assert_eq!(name, DeviceName::Raw(vec![0xFF, 0xFE]));
        assert_eq!(name.as_bytes(), [0xFF, 0xFE]);
        assert_eq!(name.to_string(), "FF FE");

        let pdu = pdu_with(&chunk(b"pico", COMPLETE_NAME));
        let mut buf = over_the_air(&pdu, 0);
        let received = BlePayload::from_bytes(&mut buf, 0).unwrap();
        assert_eq!(received.name, Some(DeviceName::Utf8("pico".to_string())));
    }

    #[test]
    fn display() {
        let mut battery = BatteryService::new();
        battery.set_data(42);
        let chunks = [chunk(b"ble", 0x08), chunk(&[0xF4], TX_POWER), battery.chunk()];
        let pdu = pdu_with(&chunks.concat());
        let mut buf = over_the_air(&pdu, 0);
        let received = BlePayload::from_bytes(&mut buf, 0).unwrap();
        assert_eq!(
            received.to_string(),
            "MAC address: EF:CD:AB:03:02:01\nName: ble\nPA level: -12 dBm\nBattery capacity remaining: 42%"
        );
    }
}
