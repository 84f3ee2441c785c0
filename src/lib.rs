//! # han_cosem
//!
//! A `no_std` decoder for the push messages Norwegian smart meters emit on their
//! HAN (Home Area Network) port.
//!
//! The meter continuously streams HDLC frames carrying a DLMS/COSEM
//! DataNotification. The three meter vendors on the market (Aidon, Kamstrup and
//! Kaifa) each lay the "same" list out differently, so the decoder detects the
//! vendor dialect from the list identifier embedded in the message and then
//! picks the matching message shape by the number of COSEM items it contains.
//!
//! ```text
//! bytes ─▶ FrameAssembler ─▶ LLC/APDU header ─▶ tokenize ─▶ resolve ─▶ extract ─▶ Measurement
//!            (HCS/FCS)                          (COSEM)     (dialect)   (scaling)
//! ```
//!
//! # Example
//!
//! ```
//! use han_cosem::HanParser;
//!
//! let mut parser = HanParser::new();
//!
//! // Bytes as they arrive from the serial port: a Kaifa list 1 frame.
//! let serial_bytes: &[u8] = &[
//!     0x7E, 0xA0, 0x27, 0x01, 0x02, 0x01, 0x10, 0x5A, 0x87, 0xE6, 0xE7, 0x00,
//!     0x0F, 0x40, 0x00, 0x00, 0x00, 0x09, 0x0C, 0x07, 0xE4, 0x01, 0x1E, 0x04,
//!     0x0D, 0x00, 0x0A, 0xFF, 0x80, 0x00, 0x00, 0x02, 0x01, 0x06, 0x00, 0x00,
//!     0x09, 0xC4, 0x44, 0xB8, 0x7E,
//! ];
//! let mut watts = None;
//! for &byte in serial_bytes {
//!     if let Some(measurement) = parser.feed_byte(byte) {
//!         watts = measurement.power.map(|power| power.active_import);
//!     }
//! }
//! assert_eq!(watts, Some(2500));
//! ```
//!
//! # Features
//!
//! - `std` (default) - implements `std::error::Error` for [`Error`]
//! - `serde` - `Serialize` for [`Measurement`] and the types it contains

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use core::fmt;

pub mod data;
pub mod data_notification;
pub mod dialect;
pub mod fcs;
pub mod field;
pub mod hdlc;
pub mod measurement;
pub mod obis_code;
pub mod parser;
pub mod statistics;
pub mod unit;

pub use data::{Date, DateTime, Time, Token, Tokens, tokenize};
pub use data_notification::{LongInvokeIdAndPriority, MsduHeader, parse_msdu};
pub use dialect::{CATALOG, Dialect, DialectId, FieldMapping, MessageShape, Resolution};
pub use fcs::{check_fcs, compute_fcs};
pub use field::{Field, FieldKind};
pub use hdlc::{FcsPolicy, FrameAssembler, HdlcFrame};
pub use measurement::{Energy, Line, Measurement, MeterIdentity, MeterText, Power, extract};
pub use obis_code::ObisCode;
pub use parser::{HanParser, ParserSettings};
pub use statistics::Statistics;
pub use unit::Unit;

/// Everything that can make the decoder drop a frame.
///
/// None of these are fatal: the parser resets and waits for the next flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Format field is not frame format type 3 without segmentation.
    InvalidFrameFormat,
    /// Declared frame length does not fit in the receive buffer.
    FrameTooLarge,
    /// An HDLC address did not terminate within 4 bytes.
    InvalidAddress,
    /// Header check sequence mismatch.
    HcsMismatch,
    /// Frame check sequence mismatch (only with [`FcsPolicy::Reject`]).
    FcsMismatch,
    /// No closing flag at the declared frame length.
    InvalidFlag,
    /// More bytes arrived than the receive buffer can hold.
    BufferOverflow,
    /// Information field is shorter than the LLC and APDU header.
    FrameTooShort,
    /// A COSEM element ended before its declared size.
    Incomplete,
    /// Malformed input that is not covered by a more specific variant.
    InvalidFormat,
    /// COSEM tag outside the supported subset.
    UnknownTag(u8),
    /// Arrays and structures nested deeper than the tokenizer supports.
    NestingTooDeep,
    /// No known list identifier was found in the message.
    UnknownDialect,
    /// No message shape has the given number of items.
    UnknownShape(usize),
    /// A mapped item position is beyond the end of the message.
    MissingItem(u16),
    /// The item at a mapped position cannot be decoded as the field requires.
    TypeMismatch(Field),
}

impl Error {
    /// Whether the error was raised while assembling the HDLC frame, as
    /// opposed to while decoding its content.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Self::InvalidFrameFormat
                | Self::FrameTooLarge
                | Self::InvalidAddress
                | Self::HcsMismatch
                | Self::FcsMismatch
                | Self::InvalidFlag
                | Self::BufferOverflow
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFrameFormat => write!(f, "wrong frame type"),
            Self::FrameTooLarge => write!(f, "length would overflow buffer"),
            Self::InvalidAddress => write!(f, "HDLC address not valid"),
            Self::HcsMismatch => write!(f, "invalid HCS CRC"),
            Self::FcsMismatch => write!(f, "invalid FCS CRC"),
            Self::InvalidFlag => write!(f, "no flag after declared packet length"),
            Self::BufferOverflow => write!(f, "buffer overflowed"),
            Self::FrameTooShort => write!(f, "too little data in the MSDU"),
            Self::Incomplete => write!(f, "COSEM element truncated"),
            Self::InvalidFormat => write!(f, "invalid format"),
            Self::UnknownTag(tag) => write!(f, "unknown COSEM tag 0x{tag:02x}"),
            Self::NestingTooDeep => write!(f, "COSEM nesting too deep"),
            Self::UnknownDialect => write!(f, "could not auto-detect meter type"),
            Self::UnknownShape(count) => write!(f, "no known list with {count} items"),
            Self::MissingItem(position) => write!(f, "item {position} missing from list"),
            Self::TypeMismatch(field) => write!(f, "item for {field} has the wrong type"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

pub type Result<T> = core::result::Result<T, Error>;

pub(crate) fn map_nom_error<I, O>(result: nom::IResult<I, O>) -> Result<(I, O)> {
    result.map_err(|err| match err {
        nom::Err::Incomplete(_) => Error::Incomplete,
        nom::Err::Error(e) | nom::Err::Failure(e) => match e.code {
            nom::error::ErrorKind::Eof => Error::Incomplete,
            _ => Error::InvalidFormat,
        },
    })
}
