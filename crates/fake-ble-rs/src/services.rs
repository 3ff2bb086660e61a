//! A module to contain all compatible BLE services.
//!
//! Each service is a [`ServiceBuffer`] (a 16-bit UUID followed by data) with a typed
//! interpretation of the data. Received service data is represented by [`ServiceData`].

use crate::data_manipulation::{address_repr, chunk, SERVICE_DATA};
use alloc::{string::String, vec::Vec};
use core::fmt::{Display, Formatter, Result};

/// The Temperature Service UUID number
pub const TEMPERATURE_UUID: u16 = 0x1809;
/// The Battery Service UUID number
pub const BATTERY_UUID: u16 = 0x180F;
/// The Eddystone Service UUID number
pub const EDDYSTONE_UUID: u16 = 0xFEAA;

/// Some common traits related to BLE service data structs.
pub mod prelude {
    use super::ServiceBuffer;
    use alloc::vec::Vec;

    /// A trait to define the buffer extraction of BLE services.
    pub trait AsBuffer {
        /// The underlying UUID and data.
        fn service(&self) -> &ServiceBuffer;

        /// Mutable access to the underlying UUID and data.
        fn service_mut(&mut self) -> &mut ServiceBuffer;

        /// The 16-bit service UUID.
        fn uuid(&self) -> u16 {
            self.service().uuid()
        }

        /// The service data as it appears in an advertisement (excluding the chunk header).
        fn buffer(&self) -> &[u8] {
            self.service().buffer()
        }

        /// The raw (encoded) data following the UUID.
        fn raw_data(&self) -> &[u8] {
            self.service().data()
        }

        /// Overwrite the data following the UUID with already encoded bytes.
        fn set_raw_data(&mut self, data: &[u8]) {
            self.service_mut().set_data(data);
        }

        /// The service data packed as a "Service Data - 16-bit UUID" chunk.
        fn chunk(&self) -> Vec<u8> {
            self.service().chunk()
        }
    }

    /// A trait to define the setter and getter of typed data for BLE services.
    pub trait ServiceValue<T> {
        fn set_data(&mut self, value: T);

        /// Returns [`None`] if the raw data cannot be interpreted as `T`.
        fn data(&self) -> Option<T>;
    }
}
use prelude::{AsBuffer, ServiceValue};

/// The framing shared by all service data: a little endian UUID, then a
/// service specific header, then the data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceBuffer {
    buf: Vec<u8>,
    header_len: usize,
}

impl ServiceBuffer {
    /// Create a service buffer with the given `uuid` and no data.
    pub fn new(uuid: u16) -> Self {
        Self::with_header(uuid, &[])
    }

    /// Create a service buffer whose UUID field is extended with `header`.
    pub fn with_header(uuid: u16, header: &[u8]) -> Self {
        let mut buf = Vec::with_capacity(header.len() + 4);
        buf.extend_from_slice(&uuid.to_le_bytes());
        buf.extend_from_slice(header);
        Self {
            header_len: buf.len(),
            buf,
        }
    }

    /// Reconstruct a service buffer from received bytes.
    ///
    /// Returns [`None`] if `buf` is too short to contain the UUID and `header_len` bytes.
    pub(crate) fn from_bytes(buf: &[u8], header_len: usize) -> Option<Self> {
        let header_len = header_len + 2;
        if buf.len() < header_len {
            return None;
        }
        Some(Self {
            buf: buf.to_vec(),
            header_len,
        })
    }

    /// The 16-bit service UUID.
    pub fn uuid(&self) -> u16 {
        u16::from_le_bytes([self.buf[0], self.buf[1]])
    }

    /// The bytes between the UUID and the data.
    pub fn header(&self) -> &[u8] {
        &self.buf[2..self.header_len]
    }

    pub(crate) fn header_mut(&mut self) -> &mut [u8] {
        &mut self.buf[2..self.header_len]
    }

    /// The data following the UUID (and header).
    pub fn data(&self) -> &[u8] {
        &self.buf[self.header_len..]
    }

    /// Replace the data following the UUID (and header).
    pub fn set_data(&mut self, data: &[u8]) {
        self.buf.truncate(self.header_len);
        self.buf.extend_from_slice(data);
    }

    /// The UUID, header, and data as a single buffer.
    pub fn buffer(&self) -> &[u8] {
        &self.buf
    }

    /// Pack this service as a "Service Data - 16-bit UUID" chunk.
    pub fn chunk(&self) -> Vec<u8> {
        chunk(&self.buf, SERVICE_DATA)
    }
}

/// A data service for broadcasting a battery's remaining charge (as a percentage).
///
/// Conforms to Battery Level format as defined in
/// [GATT Specifications Supplement](https://www.bluetooth.org/DocMan/handlers/DownloadDoc.ashx?doc_id=502132&vId=542989).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatteryService {
    service: ServiceBuffer,
}

impl Default for BatteryService {
    fn default() -> Self {
        Self::new()
    }
}

impl BatteryService {
    /// Create an instance of [`BatteryService`].
    pub fn new() -> Self {
        Self {
            service: ServiceBuffer::new(BATTERY_UUID),
        }
    }

    /// Encode a battery charge level (as integer percentage).
    pub const fn encode(value: u8) -> [u8; 1] {
        [value]
    }

    /// Decode a battery charge level (as integer percentage).
    pub fn decode(data: &[u8]) -> Option<u8> {
        data.first().copied()
    }
}

impl ServiceValue<u8> for BatteryService {
    /// Set the battery charge level (as integer percentage) data.
    fn set_data(&mut self, value: u8) {
        self.service.set_data(&Self::encode(value));
    }

    /// Get the battery charge level (as integer percentage) data.
    fn data(&self) -> Option<u8> {
        Self::decode(self.service.data())
    }
}

impl AsBuffer for BatteryService {
    fn service(&self) -> &ServiceBuffer {
        &self.service
    }

    fn service_mut(&mut self) -> &mut ServiceBuffer {
        &mut self.service
    }
}

impl Display for BatteryService {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self.data() {
            Some(value) => write!(f, "Battery capacity remaining: {value}%"),
            None => write!(f, "Battery capacity remaining: unknown"),
        }
    }
}

/// A data service that broadcasts a temperature (in Celsius)
///
/// Conforms to the Health Thermometer Measurement format as defined in
/// [GATT Specifications Supplement](https://www.bluetooth.org/DocMan/handlers/DownloadDoc.ashx?doc_id=502132&vId=542989).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemperatureService {
    service: ServiceBuffer,
}

impl Default for TemperatureService {
    fn default() -> Self {
        Self::new()
    }
}

impl TemperatureService {
    /// The exponent marker appended to the measurement (`10^-2`).
    const EXPONENT: u8 = 0xFE;

    /// Create an instance of [`TemperatureService`]
    pub fn new() -> Self {
        Self {
            service: ServiceBuffer::new(TEMPERATURE_UUID),
        }
    }

    /// Encode a temperature (in Celsius) as a 24-bit signed integer
    /// (hundredths of a degree) followed by the exponent marker.
    pub fn encode(value: f32) -> [u8; 4] {
        let scaled = value * 100.0;
        // round half away from zero; `as` saturates and truncates toward zero
        let half = if scaled < 0.0 { -0.5 } else { 0.5 };
        let scaled = (scaled + half) as i32;
        let buf = (scaled & 0xFFFFFF).to_le_bytes();
        [buf[0], buf[1], buf[2], Self::EXPONENT]
    }

    /// Decode a temperature (in Celsius) from the first 3 bytes of `data`.
    pub fn decode(data: &[u8]) -> Option<f32> {
        if data.len() < 3 {
            return None;
        }
        let sign = if data[2] & 0x80 > 0 { 0xFF } else { 0 };
        let value = i32::from_le_bytes([data[0], data[1], data[2], sign]);
        Some(value as f32 / 100.0)
    }
}

impl ServiceValue<f32> for TemperatureService {
    /// Set the temperature measurement (in Celsius) data.
    fn set_data(&mut self, value: f32) {
        self.service.set_data(&Self::encode(value));
    }

    /// Get the temperature measurement (in Celsius) data.
    fn data(&self) -> Option<f32> {
        Self::decode(self.service.data())
    }
}

impl AsBuffer for TemperatureService {
    fn service(&self) -> &ServiceBuffer {
        &self.service
    }

    fn service_mut(&mut self) -> &mut ServiceBuffer {
        &mut self.service
    }
}

impl Display for TemperatureService {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self.data() {
            Some(value) => write!(f, "Temperature: {value} C"),
            None => write!(f, "Temperature: unknown"),
        }
    }
}

/// A data service for broadcasting a URL.
///
/// Conforms to specifications defined by [Google's EddyStone][eddystone] data format.
///
/// [eddystone]: https://github.com/google/eddystone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlService {
    service: ServiceBuffer,
}

impl Default for UrlService {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlService {
    const CODEX_PREFIX: [&'static str; 4] = ["http://www.", "https://www.", "http://", "https://"];
    const CODEX_SUFFIX: [&'static str; 14] = [
        ".com/", ".org/", ".edu/", ".net/", ".info/", ".biz/", ".gov/", ".com", ".org", ".edu",
        ".net", ".info", ".biz", ".gov",
    ];
    /// The Eddystone frame type of a URL frame.
    const FRAME_TYPE: u8 = 0x10;
    /// The default PA level at 1 meter (found by testing with 0 dBm).
    const DEFAULT_PA_LEVEL: i8 = -25;

    /// Create an instance of [`UrlService`].
    pub fn new() -> Self {
        Self {
            service: ServiceBuffer::with_header(
                EDDYSTONE_UUID,
                &[Self::FRAME_TYPE, Self::DEFAULT_PA_LEVEL as u8],
            ),
        }
    }

    /// Set the predicted PA (Power Amplitude) level at 1 meter radius.
    pub fn set_pa_level(&mut self, level: i8) {
        self.service.header_mut()[1] = level as u8;
    }

    /// Get the predicted PA (Power Amplitude) level at 1 meter radius.
    pub fn pa_level(&self) -> i8 {
        self.service.header()[1] as i8
    }

    /// Set the URL to be broadcasted.
    pub fn set_data(&mut self, value: &str) {
        self.service.set_data(&Self::encode(value));
    }

    /// Get the URL to be broadcasted.
    ///
    /// Returns [`None`] if the decoded data is not valid UTF-8.
    pub fn data(&self) -> Option<String> {
        Self::decode(self.service.data())
    }

    /// Compress a URL using Eddystone's codex.
    ///
    /// A recognized scheme prefix is only replaced at the start of the URL.
    /// Recognized suffixes are replaced wherever they occur.
    /// Literal bytes that collide with the codex (`0x00` - `0x0D`) are not escaped.
    pub fn encode(value: &str) -> Vec<u8> {
        let mut result = Vec::with_capacity(value.len());
        let mut rest = value.as_bytes();
        if let Some((code, prefix)) = Self::find_code(&Self::CODEX_PREFIX, rest) {
            result.push(code);
            rest = &rest[prefix.len()..];
        }
        while let Some((&byte, tail)) = rest.split_first() {
            if let Some((code, suffix)) = Self::find_code(&Self::CODEX_SUFFIX, rest) {
                result.push(code);
                rest = &rest[suffix.len()..];
            } else {
                result.push(byte);
                rest = tail;
            }
        }
        result
    }

    /// Expand a URL compressed with Eddystone's codex.
    pub fn decode(data: &[u8]) -> Option<String> {
        let mut result = Vec::with_capacity(data.len() + 16);
        let mut rest = data;
        if let Some((&first, tail)) = data.split_first() {
            if let Some(prefix) = Self::CODEX_PREFIX.get(first as usize) {
                result.extend_from_slice(prefix.as_bytes());
                rest = tail;
            }
        }
        for byte in rest {
            match Self::CODEX_SUFFIX.get(*byte as usize) {
                Some(suffix) => result.extend_from_slice(suffix.as_bytes()),
                None => result.push(*byte),
            }
        }
        String::from_utf8(result).ok()
    }

    fn find_code(codex: &[&'static str], buf: &[u8]) -> Option<(u8, &'static str)> {
        codex
            .iter()
            .enumerate()
            .find(|(_, code)| buf.starts_with(code.as_bytes()))
            .map(|(index, code)| (index as u8, *code))
    }
}

impl AsBuffer for UrlService {
    fn service(&self) -> &ServiceBuffer {
        &self.service
    }

    fn service_mut(&mut self) -> &mut ServiceBuffer {
        &mut self.service
    }
}

impl Display for UrlService {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self.data() {
            Some(url) => write!(f, "Advertised URL: {url}"),
            None => write!(f, "Advertised URL: {}", address_repr(self.raw_data(), false, "")),
        }
    }
}

/// A decoded element of an advertisement's data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceData {
    Battery(BatteryService),
    Temperature(TemperatureService),
    Url(UrlService),
    /// A complete chunk (including its length and type bytes) that was not recognized,
    /// or the unparsed remainder of a malformed payload.
    RawBytes(Vec<u8>),
}

impl ServiceData {
    /// Interpret the body of a "Service Data - 16-bit UUID" chunk.
    ///
    /// Returns [`None`] if the UUID is not supported or the data is too short.
    pub fn from_service_buffer(buf: &[u8]) -> Option<Self> {
        if buf.len() < 2 {
            return None;
        }
        match u16::from_le_bytes([buf[0], buf[1]]) {
            BATTERY_UUID => Some(ServiceData::Battery(BatteryService {
                service: ServiceBuffer::from_bytes(buf, 0)?,
            })),
            TEMPERATURE_UUID => Some(ServiceData::Temperature(TemperatureService {
                service: ServiceBuffer::from_bytes(buf, 0)?,
            })),
            EDDYSTONE_UUID => Some(ServiceData::Url(UrlService {
                service: ServiceBuffer::from_bytes(buf, 2)?,
            })),
            _ => None,
        }
    }

    /// The bytes this element would occupy in an advertisement, excluding the chunk header.
    ///
    /// [`ServiceData::RawBytes`] are returned as is.
    pub fn buffer(&self) -> &[u8] {
        match self {
            ServiceData::Battery(s) => s.buffer(),
            ServiceData::Temperature(s) => s.buffer(),
            ServiceData::Url(s) => s.buffer(),
            ServiceData::RawBytes(buf) => buf,
        }
    }

    /// Pack this element as a chunk ready for
    /// [`FakeBle::advertise_chunks()`](fn@crate::FakeBle::advertise_chunks).
    pub fn chunk(&self) -> Vec<u8> {
        match self {
            ServiceData::RawBytes(buf) => buf.clone(),
            _ => chunk(self.buffer(), SERVICE_DATA),
        }
    }
}

impl From<BatteryService> for ServiceData {
    fn from(value: BatteryService) -> Self {
        ServiceData::Battery(value)
    }
}

impl From<TemperatureService> for ServiceData {
    fn from(value: TemperatureService) -> Self {
        ServiceData::Temperature(value)
    }
}

impl From<UrlService> for ServiceData {
    fn from(value: UrlService) -> Self {
        ServiceData::Url(value)
    }
}

impl Display for ServiceData {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            ServiceData::Battery(s) => s.fmt(f),
            ServiceData::Temperature(s) => s.fmt(f),
            ServiceData::Url(s) => s.fmt(f),
            ServiceData::RawBytes(buf) => write!(f, "{}", address_repr(buf, false, " ")),
        }
    }
}

#[cfg(test)]
mod test {
    extern crate std;
    use super::{
        prelude::{AsBuffer, ServiceValue},
        BatteryService, ServiceData, TemperatureService, UrlService, BATTERY_UUID,
        EDDYSTONE_UUID, TEMPERATURE_UUID,
    };
    use crate::data_manipulation::chunk;
    use std::string::ToString;

    #[test]
    fn battery_service() {
        let mut battery = BatteryService::default();
        assert_eq!(battery.data(), None);
        battery.set_data(85);
        assert_eq!(battery.data(), Some(85));
        assert_eq!(battery.uuid(), BATTERY_UUID);
        assert_eq!(battery.buffer(), b"\x0f\x18\x55");
        assert_eq!(chunk(battery.buffer(), 0x16), [3 + 1, 0x16, 0x0F, 0x18, 0x55]);
        assert_eq!(battery.chunk(), [0x04, 0x16, 0x0F, 0x18, 0x55]);
        assert_eq!(battery.to_string(), "Battery capacity remaining: 85%");
    }

    #[test]
    fn battery_every_value() {
        let mut battery = BatteryService::new();
        for value in 0..=u8::MAX {
            battery.set_data(value);
            assert_eq!(battery.data(), Some(value));
        }
    }

    #[test]
    fn raw_data_passes_through() {
        let mut battery = BatteryService::new();
        battery.set_raw_data(&[0x2A, 0x01]);
        assert_eq!(battery.raw_data(), [0x2A, 0x01]);
        assert_eq!(battery.data(), Some(42));
        assert_eq!(battery.buffer(), [0x0F, 0x18, 0x2A, 0x01]);
    }

    #[test]
    fn temperature_service() {
        let mut temp = TemperatureService::default();
        temp.set_data(45.5);
        assert_eq!(temp.data(), Some(45.5));
        assert_eq!(temp.uuid(), TEMPERATURE_UUID);
        assert_eq!(
            [0x07, 0x16, 0x09, 0x18, 0xC6, 0x11, 0x00, 0xFE],
            *temp.chunk()
        );
        assert_eq!(temp.to_string(), "Temperature: 45.5 C");
    }

    #[test]
    fn negative_temperature() {
        let mut temp = TemperatureService::new();
        temp.set_data(-12.34);
        // -1234 as a 24-bit two's complement
        assert_eq!(temp.raw_data(), [0x2E, 0xFB, 0xFF, 0xFE]);
        let value = temp.data().unwrap();
        assert!((value + 12.34).abs() < 0.01);
    }

    #[test]
    fn temperature_rounds() {
        for value in [23.45f32, -0.01, 0.0, 99.99, -40.5, 1234.56] {
            let decoded = TemperatureService::decode(&TemperatureService::encode(value)).unwrap();
            assert!((decoded - value).abs() < 0.01, "{value} decoded as {decoded}");
        }
        assert_eq!(TemperatureService::decode(&[0x01, 0x02]), None);
    }

    #[test]
    fn url_service() {
        let mut url = UrlService::default();
        assert_eq!(url.pa_level(), -25);
        url.set_data("https://www.foo.com/bar/bazz");
        url.set_pa_level(-20);
        assert_eq!(url.pa_level(), -20);
        assert_eq!(url.uuid(), EDDYSTONE_UUID);
        assert_eq!(
            [
                0x12, 0x16, 0xAA, 0xFE, 0x10, 0xEC, 0x01, 0x66, 0x6F, 0x6F, 0x00, 0x62, 0x61, 0x72,
                0x2F, 0x62, 0x61, 0x7A, 0x7A
            ],
            *url.chunk()
        );
        assert_eq!(url.data().unwrap(), "https://www.foo.com/bar/bazz");
        assert_eq!(url.to_string(), "Advertised URL: https://www.foo.com/bar/bazz");
    }

    #[test]
    fn url_codex_round_trip() {
        for expected in [
            "http://www.example.org",
            "https://nRF24.github.io",
            "http://a.info/b.biz",
            "https://www.x.gov/y.edu/z.net/",
            "no-scheme.com",
            "",
        ] {
            let encoded = UrlService::encode(expected);
            assert_eq!(UrlService::decode(&encoded).unwrap(), expected);
        }
        assert_eq!(UrlService::encode("http://www.google.com"), b"\x00google\x07");
        assert_eq!(UrlService::encode("https://abc.net/"), b"\x03abc\x03");
    }

    #[test]
    fn url_bad_utf8() {
        let mut url = UrlService::new();
        url.set_raw_data(&[0x02, 0xFF, 0xFE]);
        assert!(url.data().is_none());
        assert_eq!(url.to_string(), "Advertised URL: 02FFFE");
    }

    #[test]
    fn dispatch_by_uuid() {
        let mut battery = BatteryService::new();
        battery.set_data(50);
        let service = ServiceData::from_service_buffer(battery.buffer()).unwrap();
        assert_eq!(service, ServiceData::Battery(battery.clone()));
        assert_eq!(service.chunk(), battery.chunk());

        let mut url = UrlService::new();
        url.set_data("http://www.google.com");
        url.set_pa_level(-30);
        let Some(ServiceData::Url(decoded)) = ServiceData::from_service_buffer(url.buffer())
        else {
            panic!("URL service was not recognized");
        };
        assert_eq!(decoded.pa_level(), -30);
        assert_eq!(decoded.data().unwrap(), "http://www.google.com");

        // unknown UUID
        assert!(ServiceData::from_service_buffer(&[0xFF, 0x0F, 0xFF]).is_none());
        // too short for a UUID or an Eddystone header
        assert!(ServiceData::from_service_buffer(&[0x0F]).is_none());
        assert!(ServiceData::from_service_buffer(&[0xAA, 0xFE, 0x10]).is_none());
    }

    #[test]
    fn raw_bytes() {
        let raw = ServiceData::RawBytes([3, 0xFF, 0x01, 0x02].to_vec());
        assert_eq!(raw.chunk(), [3, 0xFF, 0x01, 0x02]);
        assert_eq!(raw.buffer(), [3, 0xFF, 0x01, 0x02]);
        assert_eq!(raw.to_string(), "03 FF 01 02");
    }
}
