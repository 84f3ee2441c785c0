//! LLC header and DataNotification APDU header of a HAN frame.
//!
//! ```text
//! +-----------+----------+---------+-----------+------------------------------+-----------------
//! | Dest LSAP | Src LSAP | Quality | APDU tag  | Long-Invoke-Id-And-Priority  | COSEM payload ...
//! | 0xE6      | 0xE7     | 0x00    | 0x0F      | (4, big endian)              |
//! +-----------+----------+---------+-----------+------------------------------+-----------------
//! ```
//!
//! None of the values are validated; meters in the field disagree on several
//! of them.

use log::debug;
use nom::{
    IResult, Parser,
    number::complete::{be_u32, u8},
};

use crate::{Error, Result, map_nom_error};

/// APDU tag of a DataNotification.
pub const DATA_NOTIFICATION_TAG: u8 = 0x0F;

/// LLC header (3) + APDU tag (1) + Long-Invoke-Id-And-Priority (4).
pub const MSDU_HEADER_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongInvokeIdAndPriority(pub(crate) u32);

impl LongInvokeIdAndPriority {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, id) = be_u32(input)?;
        Ok((input, Self(id)))
    }

    pub fn invoke_id(&self) -> u32 {
        self.0 & 0x00ffffff
    }
}

/// Everything in the information field in front of the COSEM payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsduHeader {
    pub destination_lsap: u8,
    pub source_lsap: u8,
    pub llc_quality: u8,
    pub apdu_tag: u8,
    pub long_invoke_id_and_priority: LongInvokeIdAndPriority,
}

impl MsduHeader {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, (destination_lsap, source_lsap, llc_quality, apdu_tag)) =
            (u8, u8, u8, u8).parse(input)?;
        let (input, long_invoke_id_and_priority) = LongInvokeIdAndPriority::parse(input)?;

        Ok((
            input,
            Self {
                destination_lsap,
                source_lsap,
                llc_quality,
                apdu_tag,
                long_invoke_id_and_priority,
            },
        ))
    }

    pub fn is_data_notification(&self) -> bool {
        self.apdu_tag == DATA_NOTIFICATION_TAG
    }

    pub fn invoke_id(&self) -> u32 {
        self.long_invoke_id_and_priority.invoke_id()
    }
}

/// Splits an HDLC information field into its header and the COSEM payload.
///
/// # Examples
///
/// ```
/// use han_cosem::parse_msdu;
///
/// let information = [0xE6, 0xE7, 0x00, 0x0F, 0x40, 0x00, 0x00, 0x00, 0x00, 0x01];
/// let (header, payload) = parse_msdu(&information).unwrap();
///
/// assert!(header.is_data_notification());
/// assert_eq!(payload, &[0x00, 0x01]);
/// ```
pub fn parse_msdu(information: &[u8]) -> Result<(MsduHeader, &[u8])> {
    if information.len() < MSDU_HEADER_SIZE {
        return Err(Error::FrameTooShort);
    }

    let (payload, header) = map_nom_error(MsduHeader::parse(information))?;

    debug!(
        "LLC {:02x} {:02x} {:02x}, APDU tag 0x{:02x}, invoke id {}",
        header.destination_lsap,
        header.source_lsap,
        header.llc_quality,
        header.apdu_tag,
        header.invoke_id()
    );
    if !header.is_data_notification() {
        debug!("APDU tag 0x{:02x} is not a DataNotification, decoding anyway", header.apdu_tag);
    }

    Ok((header, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_invoke_id_parse() {
        let input = [0x00, 0x00, 0x00, 0x01, 0xFF];
        let (remaining, id) = LongInvokeIdAndPriority::parse(&input).unwrap();

        assert_eq!(remaining, &[0xFF]);
        assert_eq!(id.0, 1);
    }

    #[test]
    fn test_invoke_id_extraction() {
        // Invoke ID is the lower 24 bits
        let id = LongInvokeIdAndPriority(0x12345678);
        assert_eq!(id.invoke_id(), 0x00345678);

        let id = LongInvokeIdAndPriority(0xFFFFFFFF);
        assert_eq!(id.invoke_id(), 0x00FFFFFF);
    }

    #[test]
    fn test_parse_msdu() {
        // Aidon push: confirmed, invoke id 0.
        let information = [0xE6, 0xE7, 0x00, 0x0F, 0x40, 0x00, 0x00, 0x00, 0x00, 0x01, 0x01];
        let (header, payload) = parse_msdu(&information).unwrap();

        assert_eq!(header.destination_lsap, 0xE6);
        assert_eq!(header.source_lsap, 0xE7);
        assert_eq!(header.llc_quality, 0x00);
        assert!(header.is_data_notification());
        assert_eq!(header.invoke_id(), 0);
        assert_eq!(payload, &[0x00, 0x01, 0x01]);
    }

    #[test]
    fn test_parse_msdu_exactly_header() {
        let information = [0xE6, 0xE7, 0x00, 0x0F, 0x00, 0x00, 0x00, 0x07];
        let (header, payload) = parse_msdu(&information).unwrap();

        assert_eq!(header.invoke_id(), 7);
        assert!(payload.is_empty());
    }

    #[test]
    fn test_parse_msdu_too_short() {
        let information = [0xE6, 0xE7, 0x00, 0x0F, 0x40, 0x00, 0x00];
        assert_eq!(parse_msdu(&information).unwrap_err(), Error::FrameTooShort);
        assert_eq!(parse_msdu(&[]).unwrap_err(), Error::FrameTooShort);
    }

    #[test]
    fn test_parse_msdu_other_apdu_is_not_rejected() {
        // Kamstrup sends the same LLC bytes; some firmware uses other LSAPs.
        let information = [0xE6, 0xE6, 0x00, 0xDB, 0x00, 0x00, 0x00, 0x00, 0x02];
        let (header, payload) = parse_msdu(&information).unwrap();

        assert!(!header.is_data_notification());
        assert_eq!(payload, &[0x02]);
    }
}
