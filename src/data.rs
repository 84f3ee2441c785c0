//! COSEM data as it appears in a HAN push message.
//!
//! The payload of a DataNotification starts with a length-prefixed extended
//! header (the notification date-time, often empty) followed by one
//! A-XDR encoded value, normally a structure of structures. [`tokenize`] walks
//! that value and flattens it into a list of [`Token`]s that borrow the frame.
//! Containers are kept in the list so the layout can be dumped, but positions
//! only count leaves.

#[cfg(feature = "serde")]
use alloc::string::ToString;
use alloc::vec::Vec;
use core::convert::TryFrom;
use core::fmt;

use log::trace;
use nom::{
    IResult, Parser,
    bytes::complete::take,
    error::ErrorKind,
    number::complete::{be_i16, be_u16, be_u32, i8, u8},
};
#[cfg(feature = "serde")]
use serde::{Serialize, Serializer};

use crate::{Error, Result, map_nom_error};

/// Deepest container nesting the tokenizer follows.
pub const MAX_DEPTH: usize = 10;

/// Size of an encoded date-time.
pub const DATE_TIME_SIZE: usize = 12;

/// Kaifa prefixes the extended header with a stray octet-string tag.
const KAIFA_HEADER_PREFIX: [u8; 2] = [0x09, 0x0C];

/// Tags understood by the tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[rustfmt::skip]
pub enum DataType {
  Array              =  1,
  Structure          =  2,
  DoubleLongUnsigned =  6,
  OctetString        =  9,
  VisibleString      = 10,
  Integer            = 15,
  Long               = 16,
  LongUnsigned       = 18,
  Enum               = 22,
}

impl TryFrom<u8> for DataType {
    type Error = u8;

    fn try_from(dt: u8) -> core::result::Result<Self, Self::Error> {
        Ok(match dt {
            0x01 => Self::Array,
            0x02 => Self::Structure,
            0x06 => Self::DoubleLongUnsigned,
            0x09 => Self::OctetString,
            0x0a => Self::VisibleString,
            0x0f => Self::Integer,
            0x10 => Self::Long,
            0x12 => Self::LongUnsigned,
            0x16 => Self::Enum,
            dt => return Err(dt),
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Date {
    pub(crate) year: u16,
    pub(crate) month: u8,
    pub(crate) day_of_month: u8,
    pub(crate) day_of_week: u8,
}

impl Date {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, (year, month, day_of_month, day_of_week)) =
            (be_u16, u8, u8, u8).parse(input)?;

        Ok((input, Self { year, month, day_of_month, day_of_week }))
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn day_of_month(&self) -> u8 {
        self.day_of_month
    }

    /// 1 is Monday, 0xFF when not specified.
    pub fn day_of_week(&self) -> u8 {
        self.day_of_week
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day_of_month)
    }
}

impl fmt::Debug for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Date(\"{}\")", self)
    }
}

#[cfg(feature = "serde")]
impl Serialize for Date {
    fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Time {
    pub(crate) hour: Option<u8>,
    pub(crate) minute: Option<u8>,
    pub(crate) second: Option<u8>,
    pub(crate) hundredth: Option<u8>,
}

impl Time {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (rest, (hour, minute, second, hundredth)) = (u8, u8, u8, u8).parse(input)?;

        let invalid = || nom::Err::Error(nom::error::Error::new(input, ErrorKind::Verify));

        let hour = match hour {
            0xff => None,
            0..=23 => Some(hour),
            _ => return Err(invalid()),
        };
        let minute = match minute {
            0xff => None,
            0..=59 => Some(minute),
            _ => return Err(invalid()),
        };
        let second = match second {
            0xff => None,
            0..=59 => Some(second),
            _ => return Err(invalid()),
        };
        let hundredth = match hundredth {
            0xff => None,
            0..=99 => Some(hundredth),
            _ => return Err(invalid()),
        };

        Ok((rest, Self { hour, minute, second, hundredth }))
    }

    pub fn hour(&self) -> Option<u8> {
        self.hour
    }

    pub fn minute(&self) -> Option<u8> {
        self.minute
    }

    pub fn second(&self) -> Option<u8> {
        self.second
    }

    pub fn hundredth(&self) -> Option<u8> {
        self.hundredth
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.hour.unwrap_or(0),
            self.minute.unwrap_or(0),
            self.second.unwrap_or(0),
        )?;

        if let Some(hundredth) = self.hundredth {
            write!(f, ".{:02}", hundredth)?;
        }

        Ok(())
    }
}

impl fmt::Debug for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Time(\"{}\")", self)
    }
}

#[cfg(feature = "serde")]
impl Serialize for Time {
    fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockStatus(pub(crate) u8);

impl ClockStatus {
    #[rustfmt::skip]
    const INVALID_VALUE_BIT:   u8 = 0b00000001;
    #[rustfmt::skip]
    const DOUBTFUL_VALUE_BIT:  u8 = 0b00000010;
    #[rustfmt::skip]
    const DIFFERENT_BASE_BIT:  u8 = 0b00000100;
    #[rustfmt::skip]
    const INVALID_STATUS_BIT:  u8 = 0b00001000;
    #[rustfmt::skip]
    const DAYLIGHT_SAVING_BIT: u8 = 0b10000000;

    pub fn invalid_value(&self) -> bool {
        (self.0 & Self::INVALID_VALUE_BIT) != 0
    }

    pub fn doubtful_value(&self) -> bool {
        (self.0 & Self::DOUBTFUL_VALUE_BIT) != 0
    }

    pub fn different_base(&self) -> bool {
        (self.0 & Self::DIFFERENT_BASE_BIT) != 0
    }

    pub fn invalid_status(&self) -> bool {
        (self.0 & Self::INVALID_STATUS_BIT) != 0
    }

    pub fn daylight_saving(&self) -> bool {
        (self.0 & Self::DAYLIGHT_SAVING_BIT) != 0
    }
}

/// DLMS date-time: date, time, deviation from UTC and clock status.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DateTime {
    pub(crate) date: Date,
    pub(crate) time: Time,
    pub(crate) offset_minutes: Option<i16>,
    pub(crate) clock_status: Option<ClockStatus>,
}

impl DateTime {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, date) = Date::parse(input)?;
        let (input, time) = Time::parse(input)?;
        let (input, offset_minutes) = be_i16(input)?;
        let offset_minutes = Some(offset_minutes).filter(|&b| b != 0x8000u16 as i16);
        let (input, clock_status) = u8(input)?;
        let clock_status = Some(clock_status).filter(|&b| b != 0xff).map(ClockStatus);

        Ok((input, Self { date, time, offset_minutes, clock_status }))
    }

    /// Parses an octet string that must hold exactly one date-time.
    ///
    /// # Examples
    ///
    /// ```
    /// use han_cosem::DateTime;
    ///
    /// let octets = [0x07, 0xE3, 0x0A, 0x1B, 0x07, 0x17, 0x00, 0x0A, 0xFF, 0x80, 0x00, 0x00];
    /// let clock = DateTime::from_octets(&octets).unwrap();
    /// assert_eq!(clock.to_string(), "2019-10-27T23:00:10");
    ///
    /// assert!(DateTime::from_octets(&octets[..11]).is_none());
    /// ```
    pub fn from_octets(octets: &[u8]) -> Option<Self> {
        if octets.len() != DATE_TIME_SIZE {
            return None;
        }
        Self::parse(octets).ok().map(|(_, date_time)| date_time)
    }

    pub fn date(&self) -> &Date {
        &self.date
    }

    pub fn time(&self) -> &Time {
        &self.time
    }

    /// Deviation of local time from UTC in minutes, if specified.
    pub fn offset_minutes(&self) -> Option<i16> {
        self.offset_minutes
    }

    pub fn clock_status(&self) -> Option<ClockStatus> {
        self.clock_status
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}T{}", self.date, self.time)?;

        if let Some(offset_minutes) = self.offset_minutes {
            if offset_minutes >= 0 {
                '-'.fmt(f)?;
            } else {
                '+'.fmt(f)?;
            };
            let offset_minutes = offset_minutes.abs();
            write!(f, "{:02}:{:02}", offset_minutes / 60, offset_minutes % 60)?;
        }

        Ok(())
    }
}

impl fmt::Debug for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DateTime(\"{}\")", self)
    }
}

#[cfg(feature = "serde")]
impl Serialize for DateTime {
    fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// One element of the COSEM payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// Array header with its element count.
    Array(u8),
    /// Structure header with its element count.
    Structure(u8),
    OctetString(&'a [u8]),
    VisibleString(&'a [u8]),
    Integer(i8),
    Long(i16),
    LongUnsigned(u16),
    DoubleLongUnsigned(u32),
    Enum(u8),
}

impl<'a> Token<'a> {
    fn parse(input: &'a [u8]) -> Result<(&'a [u8], Self)> {
        let (input, tag) = map_nom_error(u8(input))?;
        let data_type = DataType::try_from(tag).map_err(Error::UnknownTag)?;

        map_nom_error(match data_type {
            DataType::Array => u8(input).map(|(input, n)| (input, Token::Array(n))),
            DataType::Structure => u8(input).map(|(input, n)| (input, Token::Structure(n))),
            DataType::OctetString => {
                length_prefixed(input).map(|(input, s)| (input, Token::OctetString(s)))
            }
            DataType::VisibleString => {
                length_prefixed(input).map(|(input, s)| (input, Token::VisibleString(s)))
            }
            DataType::Integer => i8(input).map(|(input, n)| (input, Token::Integer(n))),
            DataType::Long => be_i16(input).map(|(input, n)| (input, Token::Long(n))),
            DataType::LongUnsigned => {
                be_u16(input).map(|(input, n)| (input, Token::LongUnsigned(n)))
            }
            DataType::DoubleLongUnsigned => {
                be_u32(input).map(|(input, n)| (input, Token::DoubleLongUnsigned(n)))
            }
            DataType::Enum => u8(input).map(|(input, n)| (input, Token::Enum(n))),
        })
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Self::Array(_) => DataType::Array,
            Self::Structure(_) => DataType::Structure,
            Self::OctetString(_) => DataType::OctetString,
            Self::VisibleString(_) => DataType::VisibleString,
            Self::Integer(_) => DataType::Integer,
            Self::Long(_) => DataType::Long,
            Self::LongUnsigned(_) => DataType::LongUnsigned,
            Self::DoubleLongUnsigned(_) => DataType::DoubleLongUnsigned,
            Self::Enum(_) => DataType::Enum,
        }
    }

    /// Everything but arrays and structures.
    pub fn is_leaf(&self) -> bool {
        !matches!(self, Self::Array(_) | Self::Structure(_))
    }

    /// Content of a string token.
    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        match *self {
            Self::OctetString(bytes) | Self::VisibleString(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Encoded size in bytes of a numeric token.
    pub fn width(&self) -> Option<usize> {
        match self {
            Self::Integer(_) | Self::Enum(_) => Some(1),
            Self::Long(_) | Self::LongUnsigned(_) => Some(2),
            Self::DoubleLongUnsigned(_) => Some(4),
            _ => None,
        }
    }
}

fn length_prefixed(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, length) = u8(input)?;
    take(length).parse(input)
}

/// The flattened COSEM payload of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokens<'a> {
    header: &'a [u8],
    body: &'a [u8],
    tokens: Vec<Token<'a>>,
    leaf_count: usize,
}

impl<'a> Tokens<'a> {
    /// Content of the extended header.
    pub fn header(&self) -> &'a [u8] {
        self.header
    }

    /// Raw bytes following the extended header.
    pub fn body(&self) -> &'a [u8] {
        self.body
    }

    /// All tokens in encoding order, containers included.
    pub fn tokens(&self) -> &[Token<'a>] {
        &self.tokens
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    pub fn leaves(&self) -> impl Iterator<Item = &Token<'a>> {
        self.tokens.iter().filter(|token| token.is_leaf())
    }

    /// Leaf at a 1-based position.
    pub fn leaf(&self, position: u16) -> Option<&Token<'a>> {
        let index = usize::from(position).checked_sub(1)?;
        self.leaves().nth(index)
    }

    /// The extended header as a date-time, when it is one.
    pub fn header_time(&self) -> Option<DateTime> {
        DateTime::from_octets(self.header)
    }
}

/// Splits a COSEM payload into header and tokens.
///
/// # Examples
///
/// ```
/// use han_cosem::{Token, tokenize};
///
/// // No header, a single double-long-unsigned.
/// let tokens = tokenize(&[0x00, 0x06, 0x00, 0x00, 0x0E, 0x90]).unwrap();
///
/// assert_eq!(tokens.leaf_count(), 1);
/// assert_eq!(tokens.leaf(1), Some(&Token::DoubleLongUnsigned(3728)));
/// ```
pub fn tokenize(payload: &[u8]) -> Result<Tokens<'_>> {
    trace!("COSEM payload ({} bytes): {:02x?}", payload.len(), payload);

    let input = if payload.starts_with(&KAIFA_HEADER_PREFIX) { &payload[1..] } else { payload };
    let (body, header) = map_nom_error(length_prefixed(input))?;
    trace!("extended header: {:02x?}", header);

    let mut tokens = Vec::new();
    // Elements still expected at each open container level.
    let mut levels: heapless::Vec<u8, MAX_DEPTH> = heapless::Vec::new();
    let mut leaf_count = 0;
    let mut input = body;

    while !input.is_empty() {
        let (rest, token) = Token::parse(input)?;
        input = rest;
        trace!("{:indent$}{:?}", "", token, indent = levels.len() * 2);
        tokens.push(token);

        match token {
            Token::Array(count) | Token::Structure(count) => {
                if count > 0 {
                    levels.push(count).map_err(|_| Error::NestingTooDeep)?;
                    continue;
                }
            }
            _ => leaf_count += 1,
        }

        // The element is complete; so is every container it completes.
        while let Some(remaining) = levels.last_mut() {
            *remaining -= 1;
            if *remaining > 0 {
                break;
            }
            levels.pop();
        }
    }

    Ok(Tokens { header, body, tokens, leaf_count })
}
