use core::fmt::{self, Debug, Display};

use nom::{IResult, Parser, number::complete::u8};
#[cfg(feature = "serde")]
use serde::{Serialize, Serializer};

/// An OBIS code, identifying a quantity within a meter.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObisCode {
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub f: u8,
}

impl ObisCode {
    pub const fn new(a: u8, b: u8, c: u8, d: u8, e: u8, f: u8) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, (a, b, c, d, e, f)) = (u8, u8, u8, u8, u8, u8).parse(input)?;
        Ok((input, Self::new(a, b, c, d, e, f)))
    }

    /// Reads a code from a 6-byte octet string, as meters send them in lists.
    pub fn from_octets(octets: &[u8]) -> Option<Self> {
        match Self::parse(octets) {
            Ok((rest, code)) if rest.is_empty() => Some(code),
            _ => None,
        }
    }
}

impl Display for ObisCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}:{}.{}.{}*{}", self.a, self.b, self.c, self.d, self.e, self.f)
    }
}

impl Debug for ObisCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ObisCode({})", self)
    }
}

#[cfg(feature = "serde")]
impl Serialize for ObisCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_remaining() {
        let input = [1, 0, 1, 7, 0, 255, 0x06, 0x00];
        let (remaining, code) = ObisCode::parse(&input).unwrap();

        assert_eq!(remaining, &[0x06, 0x00]);
        assert_eq!(code, ObisCode::new(1, 0, 1, 7, 0, 255));
    }

    #[test]
    fn test_parse_insufficient_input() {
        assert!(ObisCode::parse(&[1, 2, 3, 4, 5]).is_err());
    }

    #[test]
    fn test_from_octets() {
        // Meter id as Aidon lists it.
        assert_eq!(
            ObisCode::from_octets(&[0x00, 0x00, 0x60, 0x01, 0x00, 0xFF]),
            Some(ObisCode::new(0, 0, 96, 1, 0, 255))
        );
        assert_eq!(ObisCode::from_octets(&[0x00, 0x00, 0x60, 0x01, 0x00]), None);
        assert_eq!(ObisCode::from_octets(&[0x00, 0x00, 0x60, 0x01, 0x00, 0xFF, 0x00]), None);
    }

    #[test]
    fn test_display_format() {
        assert_eq!(format!("{}", ObisCode::new(1, 0, 1, 8, 0, 255)), "1-0:1.8.0*255");
        assert_eq!(format!("{}", ObisCode::new(1, 0, 32, 7, 0, 255)), "1-0:32.7.0*255");
        assert_eq!(format!("{:?}", ObisCode::new(0, 0, 1, 0, 0, 255)), "ObisCode(0-0:1.0.0*255)");
    }

    #[test]
    fn test_ordering() {
        let code1 = ObisCode::new(1, 0, 1, 8, 0, 255);
        let code2 = ObisCode::new(1, 0, 1, 8, 1, 255);
        let code3 = ObisCode::new(1, 0, 2, 8, 0, 255);

        assert!(code1 < code2);
        assert!(code2 < code3);
    }
}
