use core::fmt::{Display, Formatter, Result};

/// Errors caused by a BLE configuration that cannot be broadcast.
///
/// These are caller mistakes. Nothing is truncated to make it fit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BleConfigError {
    /// The device name does not fit in an advertisement.
    NameTooLong {
        /// The length of the rejected name.
        length: usize,
        /// The maximum name length allowed by the current settings.
        max: usize,
    },
    /// There is not enough room to show the PA level with the current device name.
    NoRoomForPaLevel {
        /// The length of the current device name.
        name_length: usize,
    },
    /// The assembled advertisement exceeds the available space.
    PayloadOverflow {
        /// The number of bytes that do not fit.
        overflow: usize,
    },
}

impl Display for BleConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            BleConfigError::NameTooLong { length, max } => {
                write!(f, "name length ({length}) exceeds maximum ({max})")
            }
            BleConfigError::NoRoomForPaLevel { name_length } => write!(
                f,
                "there is not enough room to show the PA level with a {name_length} byte name"
            ),
            BleConfigError::PayloadOverflow { overflow } => write!(
                f,
                "payload length exceeds maximum buffer size by {overflow} bytes"
            ),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for BleConfigError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            BleConfigError::NameTooLong { length, max } => defmt::write!(
                fmt,
                "name length ({=usize}) exceeds maximum ({=usize})",
                *length,
                *max
            ),
            BleConfigError::NoRoomForPaLevel { name_length } => defmt::write!(
                fmt,
                "no room for PA level with a {=usize} byte name",
                *name_length
            ),
            BleConfigError::PayloadOverflow { overflow } => defmt::write!(
                fmt,
                "payload exceeds maximum buffer size by {=usize} bytes",
                *overflow
            ),
        }
    }
}

/// An collection of errors that [`FakeBle`](struct@crate::FakeBle) can report.
///
/// The `E` type is the error type of the [`BleRadio`](trait@crate::BleRadio) in use.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FakeBleError<E> {
    /// Represents a hardware malfunction reported by the radio.
    Radio(E),
    /// Represents a BLE configuration that cannot be broadcast.
    Config(BleConfigError),
}

impl<E> From<BleConfigError> for FakeBleError<E> {
    fn from(value: BleConfigError) -> Self {
        FakeBleError::Config(value)
    }
}

impl<E: Display> Display for FakeBleError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            FakeBleError::Radio(e) => write!(f, "radio error: {e}"),
            FakeBleError::Config(e) => write!(f, "{e}"),
        }
    }
}

#[cfg(feature = "defmt")]
impl<E: defmt::Format> defmt::Format for FakeBleError<E> {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            FakeBleError::Radio(e) => defmt::write!(fmt, "radio error: {}", e),
            FakeBleError::Config(e) => defmt::write!(fmt, "{}", e),
        }
    }
}
