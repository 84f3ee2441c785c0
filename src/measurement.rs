//! Decoded measurements.
//!
//! [`extract`] looks up every field of the resolved shape by position, decodes
//! it according to its [`FieldKind`] and scales it to the fixed units of
//! [`Measurement`]: W, var, V, mA, Wh and varh.

use core::fmt;

use log::debug;
#[cfg(feature = "serde")]
use serde::{Serialize, Serializer};

use crate::data::{DateTime, Token, Tokens};
use crate::dialect::{DialectId, Resolution};
use crate::field::{Field, FieldKind};
use crate::obis_code::ObisCode;
use crate::unit::Unit;
use crate::{Error, Result};

/// Longest meter id or model kept, in bytes.
pub const METER_TEXT_CAPACITY: usize = 19;

/// Meter id or model as sent by the meter, truncated to
/// [`METER_TEXT_CAPACITY`] bytes.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct MeterText(heapless::Vec<u8, METER_TEXT_CAPACITY>);

impl MeterText {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let kept = &bytes[..bytes.len().min(METER_TEXT_CAPACITY)];
        Self(heapless::Vec::from_slice(kept).unwrap_or_default())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// `None` if the meter sent something that is not UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.0).ok()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MeterText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(text) => text.fmt(f),
            None => self.0.iter().try_for_each(|byte| write!(f, "{byte:02x}")),
        }
    }
}

impl fmt::Debug for MeterText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MeterText(\"{}\")", self)
    }
}

#[cfg(feature = "serde")]
impl Serialize for MeterText {
    fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.as_str() {
            Some(text) => serializer.serialize_str(text),
            None => serializer.serialize_bytes(&self.0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct MeterIdentity {
    pub meter_id: MeterText,
    pub meter_model: MeterText,
}

/// Instantaneous power in W and var.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Power {
    pub active_import: u32,
    pub active_export: u32,
    pub reactive_import: u32,
    pub reactive_export: u32,
}

/// Phase voltages in V and currents in mA.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Line {
    pub voltage_l1: u32,
    pub voltage_l2: u32,
    pub voltage_l3: u32,
    pub current_l1: i32,
    pub current_l2: i32,
    pub current_l3: i32,
    /// The list carries L2 or L3 quantities.
    pub three_phase: bool,
}

/// Accumulated energy in Wh and varh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Energy {
    pub active_import: u32,
    pub active_export: u32,
    pub reactive_import: u32,
    pub reactive_export: u32,
}

/// Everything decoded from one message. Groups are `None` when the list
/// carried none of their fields.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Measurement {
    pub identity: Option<MeterIdentity>,
    pub power: Option<Power>,
    pub line: Option<Line>,
    pub energy: Option<Energy>,
    /// Meter clock item, or the notification date-time when there is none.
    pub timestamp: Option<DateTime>,
    pub dialect: Option<DialectId>,
    /// Name of the matched list.
    pub shape: &'static str,
}

/// Decodes the fields of `resolution.shape` from `tokens`.
///
/// # Examples
///
/// ```
/// use han_cosem::{CATALOG, extract, tokenize};
/// use han_cosem::dialect::resolve;
///
/// let tokens = tokenize(&[0x00, 0x06, 0x00, 0x00, 0x0E, 0x90]).unwrap();
/// let resolution = resolve(CATALOG, &tokens, &mut None).unwrap();
/// let measurement = extract(&tokens, &resolution).unwrap();
///
/// assert_eq!(measurement.power.unwrap().active_import, 3728);
/// assert!(measurement.line.is_none());
/// ```
pub fn extract(tokens: &Tokens<'_>, resolution: &Resolution) -> Result<Measurement> {
    let mut groups = Groups::default();

    for mapping in resolution.shape.fields {
        let field = mapping.field;
        let token = tokens.leaf(mapping.position).ok_or(Error::MissingItem(mapping.position))?;
        let exponent = mapping.exponent.saturating_add(field.unit_offset());
        let code = listed_obis(tokens, mapping.position).unwrap_or_else(|| field.obis_code());

        match listed_unit(tokens, mapping.position) {
            Some(unit) if Some(unit) != field.unit() => {
                debug!("{} ({}) is listed in {}, ignoring the unit", field, code, unit)
            }
            _ => {}
        }

        match field.kind() {
            FieldKind::Unsigned => {
                // The fixed list 1 shapes only ever carry a double-long-unsigned.
                if resolution.dialect.is_none() && token.width() != Some(4) {
                    debug!("{} ({}) is not 4 bytes wide: {:?}", field, code, token);
                    return Err(Error::TypeMismatch(field));
                }
                let value = decode_unsigned(token, exponent).ok_or(Error::TypeMismatch(field))?;
                log_value(field, code, value);
                groups.set_unsigned(field, value);
            }
            FieldKind::Signed => {
                let value = decode_signed(token, exponent).ok_or(Error::TypeMismatch(field))?;
                log_value(field, code, value);
                groups.set_signed(field, value);
            }
            FieldKind::Text => {
                let bytes = token.as_bytes().ok_or(Error::TypeMismatch(field))?;
                let text = MeterText::from_bytes(bytes);
                debug!("{} ({}) = {}", field, code, text);
                groups.set_text(field, text);
            }
            FieldKind::Clock => {
                let octets = token.as_bytes().ok_or(Error::TypeMismatch(field))?;
                match DateTime::from_octets(octets) {
                    Some(date_time) => {
                        debug!("{} ({}) = {}", field, code, date_time);
                        groups.clock = Some(date_time);
                    }
                    None => debug!("{} ({}) does not parse: {:02x?}", field, code, octets),
                }
            }
        }
    }

    if let Some(line) = groups.line.as_mut() {
        line.three_phase = resolution.shape.fields.iter().any(|m| m.field.is_polyphase());
    }

    Ok(Measurement {
        identity: groups.identity,
        power: groups.power,
        line: groups.line,
        energy: groups.energy,
        timestamp: groups.clock.or_else(|| tokens.header_time()),
        dialect: resolution.dialect,
        shape: resolution.shape.name,
    })
}

/// Groups filled in by [`extract`], created on their first field.
#[derive(Default)]
struct Groups {
    identity: Option<MeterIdentity>,
    power: Option<Power>,
    line: Option<Line>,
    energy: Option<Energy>,
    clock: Option<DateTime>,
}

impl Groups {
    fn identity(&mut self) -> &mut MeterIdentity {
        self.identity.get_or_insert_with(MeterIdentity::default)
    }

    fn power(&mut self) -> &mut Power {
        self.power.get_or_insert_with(Power::default)
    }

    fn line(&mut self) -> &mut Line {
        self.line.get_or_insert_with(Line::default)
    }

    fn energy(&mut self) -> &mut Energy {
        self.energy.get_or_insert_with(Energy::default)
    }

    #[rustfmt::skip]
    fn set_unsigned(&mut self, field: Field, value: u32) {
        match field {
            Field::ActivePowerImport    => self.power().active_import = value,
            Field::ActivePowerExport    => self.power().active_export = value,
            Field::ReactivePowerImport  => self.power().reactive_import = value,
            Field::ReactivePowerExport  => self.power().reactive_export = value,
            Field::VoltageL1            => self.line().voltage_l1 = value,
            Field::VoltageL2            => self.line().voltage_l2 = value,
            Field::VoltageL3            => self.line().voltage_l3 = value,
            Field::ActiveEnergyImport   => self.energy().active_import = value,
            Field::ActiveEnergyExport   => self.energy().active_export = value,
            Field::ReactiveEnergyImport => self.energy().reactive_import = value,
            Field::ReactiveEnergyExport => self.energy().reactive_export = value,
            _ => {}
        }
    }

    fn set_signed(&mut self, field: Field, value: i32) {
        match field {
            Field::CurrentL1 => self.line().current_l1 = value,
            Field::CurrentL2 => self.line().current_l2 = value,
            Field::CurrentL3 => self.line().current_l3 = value,
            _ => {}
        }
    }

    fn set_text(&mut self, field: Field, text: MeterText) {
        match field {
            Field::MeterId => self.identity().meter_id = text,
            Field::MeterModel => self.identity().meter_model = text,
            _ => {}
        }
    }
}

fn log_value<T: fmt::Display>(field: Field, code: ObisCode, value: T) {
    let prefix = if field.unit_offset() == 3 { "m" } else { "" };
    match field.unit() {
        Some(unit) => debug!("{} ({}) = {} {}{}", field, code, value, prefix, unit),
        None => debug!("{} ({}) = {}", field, code, value),
    }
}

/// OBIS code the meter lists right before the item at `position`. Aidon and
/// Kamstrup send one in front of every value, Kaifa never does.
pub(crate) fn listed_obis(tokens: &Tokens<'_>, position: u16) -> Option<ObisCode> {
    let previous = tokens.leaf(position.checked_sub(1)?)?;
    previous.as_bytes().and_then(ObisCode::from_octets)
}

/// Unit of the `{scaler, unit}` structure following the value at `position`,
/// as Aidon registers carry it.
pub(crate) fn listed_unit(tokens: &Tokens<'_>, position: u16) -> Option<Unit> {
    let scaler = tokens.leaf(position.checked_add(1)?)?;
    let unit = tokens.leaf(position.checked_add(2)?)?;
    match (scaler, unit) {
        (Token::Integer(_), Token::Enum(unit)) => Unit::try_from(*unit).ok(),
        _ => None,
    }
}

/// Raw bits of a numeric token, zero-extended: signed tokens are
/// reinterpreted, not sign-extended.
fn raw_unsigned(token: &Token<'_>) -> Option<u32> {
    Some(match *token {
        Token::Integer(n) => n as u8 as u32,
        Token::Enum(n) => n as u32,
        Token::Long(n) => n as u16 as u32,
        Token::LongUnsigned(n) => n as u32,
        Token::DoubleLongUnsigned(n) => n,
        _ => return None,
    })
}

/// Signed value of a numeric token. Unsigned tokens with the top bit of their
/// width set decode as 0, the way meter firmware has always been read.
fn raw_signed(token: &Token<'_>) -> Option<i32> {
    Some(match *token {
        Token::Integer(n) => n as i32,
        Token::Long(n) => n as i32,
        Token::Enum(n) if n & 0x80 == 0 => n as i32,
        Token::LongUnsigned(n) if n & 0x8000 == 0 => n as i32,
        Token::DoubleLongUnsigned(n) if n & 0x8000_0000 == 0 => n as i32,
        Token::Enum(_) | Token::LongUnsigned(_) | Token::DoubleLongUnsigned(_) => {
            debug!("{:?} does not fit a signed value, using 0", token);
            0
        }
        _ => return None,
    })
}

pub(crate) fn decode_unsigned(token: &Token<'_>, exponent: i8) -> Option<u32> {
    raw_unsigned(token).map(|value| scale_unsigned(value, exponent))
}

pub(crate) fn decode_signed(token: &Token<'_>, exponent: i8) -> Option<i32> {
    raw_signed(token).map(|value| scale_signed(value, exponent))
}

/// Applies a power of ten: truncating division for negative exponents,
/// wrapping multiplication for positive ones.
pub(crate) fn scale_unsigned(mut value: u32, exponent: i8) -> u32 {
    for _ in 0..exponent.unsigned_abs() {
        if exponent < 0 {
            value /= 10;
        } else {
            value = value.wrapping_mul(10);
        }
    }
    value
}

/// Same as [`scale_unsigned`], division truncating toward zero.
pub(crate) fn scale_signed(mut value: i32, exponent: i8) -> i32 {
    for _ in 0..exponent.unsigned_abs() {
        if exponent < 0 {
            value /= 10;
        } else {
            value = value.wrapping_mul(10);
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tokenize;
    use crate::dialect::{CATALOG, FieldMapping, MessageShape, SINGLE_VALUE, resolve};
    use alloc::vec;
    use alloc::vec::Vec;

    fn resolution(shape: &'static MessageShape) -> Resolution {
        Resolution { dialect: None, shape, detected: false }
    }

    /// Kaifa list 2 1-phase with the given current and voltage items.
    fn kaifa_1p(current: &[u8], voltage: &[u8]) -> Vec<u8> {
        let mut payload = vec![0x00, 0x02, 0x09];
        payload.extend_from_slice(&[0x09, 0x07]);
        payload.extend_from_slice(b"KFM_001");
        payload.extend_from_slice(&[0x09, 0x10]);
        payload.extend_from_slice(b"6970631400000000");
        payload.extend_from_slice(&[0x09, 0x07]);
        payload.extend_from_slice(b"MA105H2");
        payload.extend_from_slice(&[0x06, 0x00, 0x00, 0x04, 0xD2]); // P+ 1234 W
        payload.extend_from_slice(&[0x06, 0x00, 0x00, 0x00, 0x00]);
        payload.extend_from_slice(&[0x06, 0x00, 0x00, 0x00, 0x00]);
        payload.extend_from_slice(&[0x06, 0x00, 0x00, 0x00, 0x64]); // Q- 100 var
        payload.extend_from_slice(current);
        payload.extend_from_slice(voltage);
        payload
    }

    #[test]
    fn test_single_value() {
        let tokens = tokenize(&[0x00, 0x06, 0x00, 0x00, 0x0E, 0x90]).unwrap();
        let measurement = extract(&tokens, &resolution(&SINGLE_VALUE)).unwrap();

        assert_eq!(measurement.power, Some(Power { active_import: 3728, ..Default::default() }));
        assert_eq!(measurement.identity, None);
        assert_eq!(measurement.line, None);
        assert_eq!(measurement.energy, None);
        assert_eq!(measurement.timestamp, None);
        assert_eq!(measurement.shape, "list 1");
    }

    #[test]
    fn test_single_value_must_be_double_long() {
        for payload in [&[0x00, 0x12, 0x0E, 0x90][..], &[0x00, 0x16, 0x64], &[0x00, 0x09, 0x00]] {
            let tokens = tokenize(payload).unwrap();

            assert_eq!(
                extract(&tokens, &resolution(&SINGLE_VALUE)).unwrap_err(),
                Error::TypeMismatch(Field::ActivePowerImport)
            );
        }
    }

    #[test]
    fn test_listed_obis_and_unit() {
        // Aidon register {1-0:1.7.0*255, 3000, {0, W}}.
        let payload = [
            0x00, 0x01, 0x01, 0x02, 0x03, 0x09, 0x06, 0x01, 0x00, 0x01, 0x07, 0x00, 0xFF, 0x06,
            0x00, 0x00, 0x0B, 0xB8, 0x02, 0x02, 0x0F, 0x00, 0x16, 0x1B,
        ];
        let tokens = tokenize(&payload).unwrap();

        assert_eq!(listed_obis(&tokens, 2), Some(ObisCode::new(1, 0, 1, 7, 0, 255)));
        assert_eq!(listed_unit(&tokens, 2), Some(Unit::Watt));
        assert_eq!(listed_obis(&tokens, 1), None);
        assert_eq!(listed_unit(&tokens, 3), None);
    }

    #[test]
    fn test_kaifa_lists_no_obis_or_unit() {
        let payload = kaifa_1p(&[0x06, 0x00, 0x00, 0x16, 0x2E], &[0x06, 0x00, 0x00, 0x09, 0x32]);
        let tokens = tokenize(&payload).unwrap();

        assert_eq!(listed_obis(&tokens, 2), None);
        assert_eq!(listed_obis(&tokens, 4), None);
        assert_eq!(listed_unit(&tokens, 4), None);
    }

    #[test]
    fn test_kaifa_single_phase() {
        let payload = kaifa_1p(&[0x06, 0x00, 0x00, 0x16, 0x2E], &[0x06, 0x00, 0x00, 0x09, 0x32]);
        let tokens = tokenize(&payload).unwrap();
        let resolution = resolve(CATALOG, &tokens, &mut None).unwrap();

        let measurement = extract(&tokens, &resolution).unwrap();

        assert_eq!(measurement.dialect, Some(DialectId::Kaifa));
        let identity = measurement.identity.unwrap();
        assert_eq!(identity.meter_id.as_str(), Some("6970631400000000"));
        assert_eq!(identity.meter_model.as_str(), Some("MA105H2"));
        let power = measurement.power.unwrap();
        assert_eq!(power.active_import, 1234);
        assert_eq!(power.reactive_export, 100);
        let line = measurement.line.unwrap();
        // 5678 mA, 0x0932 decivolts.
        assert_eq!(line.current_l1, 5678);
        assert_eq!(line.voltage_l1, 235);
        assert!(!line.three_phase);
        assert_eq!(measurement.energy, None);
    }

    #[test]
    fn test_long_unsigned_voltage() {
        let payload = kaifa_1p(&[0x06, 0x00, 0x00, 0x00, 0x01], &[0x12, 0x09, 0x32]);
        let tokens = tokenize(&payload).unwrap();
        let resolution = resolve(CATALOG, &tokens, &mut None).unwrap();

        let line = extract(&tokens, &resolution).unwrap().line.unwrap();

        assert_eq!(line.voltage_l1, 235);
    }

    #[test]
    fn test_signed_current() {
        let payload = kaifa_1p(&[0x10, 0xFE, 0x0C], &[0x12, 0x09, 0x32]);
        let tokens = tokenize(&payload).unwrap();
        let resolution = resolve(CATALOG, &tokens, &mut None).unwrap();

        let line = extract(&tokens, &resolution).unwrap().line.unwrap();

        assert_eq!(line.current_l1, -500);
    }

    #[test]
    fn test_unsigned_current_with_top_bit_is_zero() {
        let payload = kaifa_1p(&[0x06, 0x80, 0x00, 0x00, 0x01], &[0x12, 0x09, 0x32]);
        let tokens = tokenize(&payload).unwrap();
        let resolution = resolve(CATALOG, &tokens, &mut None).unwrap();

        let line = extract(&tokens, &resolution).unwrap().line.unwrap();

        assert_eq!(line.current_l1, 0);
    }

    #[test]
    fn test_type_mismatch() {
        // Voltage item is a string.
        let payload = kaifa_1p(&[0x06, 0x00, 0x00, 0x00, 0x01], &[0x0A, 0x01, b'x']);
        let tokens = tokenize(&payload).unwrap();
        let resolution = resolve(CATALOG, &tokens, &mut None).unwrap();

        assert_eq!(
            extract(&tokens, &resolution).unwrap_err(),
            Error::TypeMismatch(Field::VoltageL1)
        );
    }

    #[test]
    fn test_text_from_number_is_type_mismatch() {
        static SHAPE: MessageShape = MessageShape {
            name: "id",
            leaf_count: 1,
            fields: &[FieldMapping { field: Field::MeterId, position: 1, exponent: 0 }],
        };
        let tokens = tokenize(&[0x00, 0x12, 0x00, 0x01]).unwrap();

        assert_eq!(
            extract(&tokens, &resolution(&SHAPE)).unwrap_err(),
            Error::TypeMismatch(Field::MeterId)
        );
    }

    #[test]
    fn test_missing_item() {
        static SHAPE: MessageShape = MessageShape {
            name: "short",
            leaf_count: 2,
            fields: &[FieldMapping { field: Field::VoltageL1, position: 3, exponent: 0 }],
        };
        let tokens = tokenize(&[0x00, 0x12, 0x00, 0x01, 0x12, 0x00, 0x02]).unwrap();

        assert_eq!(extract(&tokens, &resolution(&SHAPE)).unwrap_err(), Error::MissingItem(3));
    }

    #[test]
    fn test_clock_and_header_time() {
        static SHAPE: MessageShape = MessageShape {
            name: "clock",
            leaf_count: 1,
            fields: &[FieldMapping { field: Field::MeterClock, position: 1, exponent: 0 }],
        };
        let header = [0x07, 0xE3, 0x0A, 0x1B, 0x07, 0x17, 0x00, 0x0A, 0xFF, 0x80, 0x00, 0x00];
        let clock = [0x07, 0xE3, 0x0A, 0x1B, 0x07, 0x17, 0x00, 0x00, 0xFF, 0x80, 0x00, 0x00];

        let mut payload = vec![0x0C];
        payload.extend_from_slice(&header);
        payload.extend_from_slice(&[0x09, 0x0C]);
        payload.extend_from_slice(&clock);
        let tokens = tokenize(&payload).unwrap();
        let measurement = extract(&tokens, &resolution(&SHAPE)).unwrap();
        assert_eq!(measurement.timestamp, DateTime::from_octets(&clock));

        // An unparsable clock item falls back to the header.
        let mut payload = vec![0x0C];
        payload.extend_from_slice(&header);
        payload.extend_from_slice(&[0x09, 0x0B]);
        payload.extend_from_slice(&clock[..11]);
        let tokens = tokenize(&payload).unwrap();
        let measurement = extract(&tokens, &resolution(&SHAPE)).unwrap();
        assert_eq!(measurement.timestamp, DateTime::from_octets(&header));
    }

    #[test]
    fn test_meter_text_truncates() {
        let text = MeterText::from_bytes(b"7359992890941742ABCDEF");
        assert_eq!(text.as_bytes().len(), METER_TEXT_CAPACITY);
        assert_eq!(text.as_str(), Some("7359992890941742ABC"));

        let text = MeterText::from_bytes(&[0xFF, 0x01]);
        assert_eq!(text.as_str(), None);
        assert_eq!(format!("{}", text), "ff01");
        assert!(MeterText::default().is_empty());
    }

    #[test]
    fn test_scale_unsigned() {
        assert_eq!(scale_unsigned(0x0932, -1), 235);
        assert_eq!(scale_unsigned(1999, -3), 1);
        assert_eq!(scale_unsigned(42, 0), 42);
        assert_eq!(scale_unsigned(12, 2), 1200);
        // Wraps like 32-bit firmware arithmetic.
        assert_eq!(scale_unsigned(500_000_000, 1), 705_032_704);
    }

    #[test]
    fn test_scale_signed() {
        assert_eq!(scale_signed(-15, -1), -1);
        assert_eq!(scale_signed(-7, -1), 0);
        assert_eq!(scale_signed(-5, 2), -500);
        assert_eq!(scale_signed(123, 0), 123);
    }

    #[test]
    fn test_decode_reinterprets_bits() {
        assert_eq!(decode_unsigned(&Token::Long(-1), 0), Some(0xFFFF));
        assert_eq!(decode_unsigned(&Token::Integer(-1), 0), Some(0xFF));
        assert_eq!(decode_signed(&Token::Enum(0x7F), 0), Some(127));
        assert_eq!(decode_signed(&Token::Enum(0x80), 0), Some(0));
        assert_eq!(decode_signed(&Token::LongUnsigned(0x8001), 0), Some(0));
        assert_eq!(decode_signed(&Token::DoubleLongUnsigned(0x7FFF_FFFF), 0), Some(i32::MAX));
        assert_eq!(decode_unsigned(&Token::OctetString(&[1]), 0), None);
        assert_eq!(decode_signed(&Token::Structure(1), 0), None);
    }
}
