//! Meter dialects and the lists each of them sends.
//!
//! Every vendor pushes the same logical lists (power every few seconds,
//! voltages and currents every few seconds, energy once an hour) but lays
//! them out differently. A [`Dialect`] is recognised by the list identifier
//! string somewhere in the message body; within a dialect the number of leaf
//! items selects the [`MessageShape`], which in turn says where each
//! [`Field`] lives and how it is scaled.
//!
//! Two lists carry no list identifier at all and are recognised by their leaf
//! count alone: the single-value power list (Kaifa, Kamstrup) and Aidon's
//! four-item power list.

use core::fmt;

use log::{debug, warn};
#[cfg(feature = "serde")]
use serde::Serialize;

use crate::data::Tokens;
use crate::field::Field::{self, *};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum DialectId {
    Aidon,
    Kamstrup,
    Kaifa,
}

impl DialectId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aidon => "Aidon",
            Self::Kamstrup => "Kamstrup",
            Self::Kaifa => "Kaifa",
        }
    }
}

impl fmt::Display for DialectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

/// Where a field sits in a list and how it is scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMapping {
    pub field: Field,
    /// 1-based position among the leaf items, after the extended header.
    pub position: u16,
    /// Power of ten the raw value is multiplied with.
    pub exponent: i8,
}

const fn map(field: Field, position: u16, exponent: i8) -> FieldMapping {
    FieldMapping { field, position, exponent }
}

#[derive(Debug, PartialEq, Eq)]
pub struct MessageShape {
    pub name: &'static str,
    pub leaf_count: usize,
    pub fields: &'static [FieldMapping],
}

#[derive(Debug, PartialEq, Eq)]
pub struct Dialect {
    pub id: DialectId,
    /// Byte string identifying the dialect, found anywhere in the message body.
    pub list_id: &'static [u8],
    /// At most one shape per leaf count.
    pub shapes: &'static [MessageShape],
}

impl Dialect {
    pub fn shape(&self, leaf_count: usize) -> Option<&'static MessageShape> {
        self.shapes.iter().find(|shape| shape.leaf_count == leaf_count)
    }

    /// Whether the list identifier occurs in `body`.
    pub fn matches(&self, body: &[u8]) -> bool {
        contains_pattern(body, self.list_id)
    }

    pub fn list_id_str(&self) -> &'static str {
        core::str::from_utf8(self.list_id).unwrap_or("?")
    }
}

/// The shape picked for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// `None` for the lists without a list identifier.
    pub dialect: Option<DialectId>,
    pub shape: &'static MessageShape,
    /// Whether the dialect was detected by this message rather than remembered.
    pub detected: bool,
}

/// Naive substring search; an empty needle never matches.
pub fn contains_pattern(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// Picks the shape for a tokenized message.
///
/// `session` is the dialect remembered from earlier messages. It is updated in
/// place: set when a dialect is detected, cleared when the remembered list
/// identifier disappears or the dialect has no shape for the leaf count. In
/// the latter case the message fails and the next one is detected afresh.
///
/// # Examples
///
/// ```
/// use han_cosem::{CATALOG, tokenize};
/// use han_cosem::dialect::resolve;
///
/// let tokens = tokenize(&[0x00, 0x06, 0x00, 0x00, 0x0E, 0x90]).unwrap();
/// let mut session = None;
///
/// let resolution = resolve(CATALOG, &tokens, &mut session).unwrap();
/// assert_eq!(resolution.shape.name, "list 1");
/// assert_eq!(resolution.dialect, None);
/// ```
pub fn resolve(
    catalog: &'static [Dialect],
    tokens: &Tokens<'_>,
    session: &mut Option<DialectId>,
) -> Result<Resolution> {
    let leaf_count = tokens.leaf_count();

    match leaf_count {
        0 | 1 => return Ok(Resolution { dialect: None, shape: &SINGLE_VALUE, detected: false }),
        2 | 3 => return Err(Error::UnknownShape(leaf_count)),
        4 => return Ok(Resolution { dialect: None, shape: &AIDON_SHORT, detected: false }),
        _ => {}
    }

    let body = tokens.body();

    let remembered = match session.and_then(|id| catalog.iter().find(|d| d.id == id)) {
        Some(dialect) if dialect.matches(body) => Some(dialect),
        Some(dialect) => {
            warn!("list id {} no longer found, forgetting meter type", dialect.list_id_str());
            *session = None;
            None
        }
        None => None,
    };

    let (dialect, detected) = match remembered {
        Some(dialect) => (dialect, false),
        None => {
            let dialect =
                catalog.iter().find(|d| d.matches(body)).ok_or(Error::UnknownDialect)?;
            debug!("Found meter type {} ({})", dialect.id, dialect.list_id_str());
            *session = Some(dialect.id);
            (dialect, true)
        }
    };

    let Some(shape) = dialect.shape(leaf_count) else {
        warn!("{} has no list with {} items, forgetting meter type", dialect.id, leaf_count);
        *session = None;
        return Err(Error::UnknownShape(leaf_count));
    };

    debug!("{} {} ({} items)", dialect.id, shape.name, leaf_count);
    Ok(Resolution { dialect: Some(dialect.id), shape, detected })
}

/// Kaifa and Kamstrup list 1: a bare active power value.
pub static SINGLE_VALUE: MessageShape = MessageShape {
    name: "list 1",
    leaf_count: 1,
    fields: &[map(ActivePowerImport, 1, 0)],
};

/// Aidon list 1: OBIS code, active power, scaler and unit.
pub static AIDON_SHORT: MessageShape = MessageShape {
    name: "Aidon list 1",
    leaf_count: 4,
    fields: &[map(ActivePowerImport, 2, 0)],
};

// ============================================================================
// Aidon
// ============================================================================

// Registers are {OBIS, value, {scaler, unit}}; the clock is {OBIS, value}.

#[rustfmt::skip]
static AIDON_LIST2_1P: [FieldMapping; 8] = [
    map(MeterId,              4,  0),
    map(MeterModel,           6,  0),
    map(ActivePowerImport,    8,  0),
    map(ActivePowerExport,   12,  0),
    map(ReactivePowerImport, 16,  0),
    map(ReactivePowerExport, 20,  0),
    map(CurrentL1,           24, -1),
    map(VoltageL1,           28, -1),
];

#[rustfmt::skip]
static AIDON_LIST2_3P_IT: [FieldMapping; 11] = [
    map(MeterId,              4,  0),
    map(MeterModel,           6,  0),
    map(ActivePowerImport,    8,  0),
    map(ActivePowerExport,   12,  0),
    map(ReactivePowerImport, 16,  0),
    map(ReactivePowerExport, 20,  0),
    map(CurrentL1,           24, -1),
    map(CurrentL3,           28, -1),
    map(VoltageL1,           32, -1),
    map(VoltageL2,           36, -1),
    map(VoltageL3,           40, -1),
];

#[rustfmt::skip]
static AIDON_LIST2_3P_TN: [FieldMapping; 12] = [
    map(MeterId,              4,  0),
    map(MeterModel,           6,  0),
    map(ActivePowerImport,    8,  0),
    map(ActivePowerExport,   12,  0),
    map(ReactivePowerImport, 16,  0),
    map(ReactivePowerExport, 20,  0),
    map(CurrentL1,           24, -1),
    map(CurrentL2,           28, -1),
    map(CurrentL3,           32, -1),
    map(VoltageL1,           36, -1),
    map(VoltageL2,           40, -1),
    map(VoltageL3,           44, -1),
];

#[rustfmt::skip]
static AIDON_LIST3_1P: [FieldMapping; 13] = [
    map(MeterId,               4,  0),
    map(MeterModel,            6,  0),
    map(ActivePowerImport,     8,  0),
    map(ActivePowerExport,    12,  0),
    map(ReactivePowerImport,  16,  0),
    map(ReactivePowerExport,  20,  0),
    map(CurrentL1,            24, -1),
    map(VoltageL1,            28, -1),
    map(MeterClock,           32,  0),
    map(ActiveEnergyImport,   34,  1),
    map(ActiveEnergyExport,   38,  1),
    map(ReactiveEnergyImport, 42,  1),
    map(ReactiveEnergyExport, 46,  1),
];

#[rustfmt::skip]
static AIDON_LIST3_3P_IT: [FieldMapping; 16] = [
    map(MeterId,               4,  0),
    map(MeterModel,            6,  0),
    map(ActivePowerImport,     8,  0),
    map(ActivePowerExport,    12,  0),
    map(ReactivePowerImport,  16,  0),
    map(ReactivePowerExport,  20,  0),
    map(CurrentL1,            24, -1),
    map(CurrentL3,            28, -1),
    map(VoltageL1,            32, -1),
    map(VoltageL2,            36, -1),
    map(VoltageL3,            40, -1),
    map(MeterClock,           44,  0),
    map(ActiveEnergyImport,   46,  1),
    map(ActiveEnergyExport,   50,  1),
    map(ReactiveEnergyImport, 54,  1),
    map(ReactiveEnergyExport, 58,  1),
];

#[rustfmt::skip]
static AIDON_LIST3_3P_TN: [FieldMapping; 17] = [
    map(MeterId,               4,  0),
    map(MeterModel,            6,  0),
    map(ActivePowerImport,     8,  0),
    map(ActivePowerExport,    12,  0),
    map(ReactivePowerImport,  16,  0),
    map(ReactivePowerExport,  20,  0),
    map(CurrentL1,            24, -1),
    map(CurrentL2,            28, -1),
    map(CurrentL3,            32, -1),
    map(VoltageL1,            36, -1),
    map(VoltageL2,            40, -1),
    map(VoltageL3,            44, -1),
    map(MeterClock,           48,  0),
    map(ActiveEnergyImport,   50,  1),
    map(ActiveEnergyExport,   54,  1),
    map(ReactiveEnergyImport, 58,  1),
    map(ReactiveEnergyExport, 62,  1),
];

static AIDON_SHAPES: [MessageShape; 6] = [
    MessageShape { name: "list 2 1-phase", leaf_count: 30, fields: &AIDON_LIST2_1P },
    MessageShape { name: "list 2 3-phase IT", leaf_count: 42, fields: &AIDON_LIST2_3P_IT },
    MessageShape { name: "list 2 3-phase TN", leaf_count: 46, fields: &AIDON_LIST2_3P_TN },
    MessageShape { name: "list 3 1-phase", leaf_count: 48, fields: &AIDON_LIST3_1P },
    MessageShape { name: "list 3 3-phase IT", leaf_count: 60, fields: &AIDON_LIST3_3P_IT },
    MessageShape { name: "list 3 3-phase TN", leaf_count: 64, fields: &AIDON_LIST3_3P_TN },
];

// ============================================================================
// Kamstrup
// ============================================================================

// List id first, then {OBIS, value} pairs. Currents in 10 mA, energy in 10 Wh.

#[rustfmt::skip]
static KAMSTRUP_LIST2_1P: [FieldMapping; 8] = [
    map(MeterId,              3,  0),
    map(MeterModel,           5,  0),
    map(ActivePowerImport,    7,  0),
    map(ActivePowerExport,    9,  0),
    map(ReactivePowerImport, 11,  0),
    map(ReactivePowerExport, 13,  0),
    map(CurrentL1,           15, -2),
    map(VoltageL1,           17,  0),
];

#[rustfmt::skip]
static KAMSTRUP_LIST2_3P: [FieldMapping; 12] = [
    map(MeterId,              3,  0),
    map(MeterModel,           5,  0),
    map(ActivePowerImport,    7,  0),
    map(ActivePowerExport,    9,  0),
    map(ReactivePowerImport, 11,  0),
    map(ReactivePowerExport, 13,  0),
    map(CurrentL1,           15, -2),
    map(CurrentL2,           17, -2),
    map(CurrentL3,           19, -2),
    map(VoltageL1,           21,  0),
    map(VoltageL2,           23,  0),
    map(VoltageL3,           25,  0),
];

#[rustfmt::skip]
static KAMSTRUP_LIST3_1P: [FieldMapping; 13] = [
    map(MeterId,               3,  0),
    map(MeterModel,            5,  0),
    map(ActivePowerImport,     7,  0),
    map(ActivePowerExport,     9,  0),
    map(ReactivePowerImport,  11,  0),
    map(ReactivePowerExport,  13,  0),
    map(CurrentL1,            15, -2),
    map(VoltageL1,            17,  0),
    map(MeterClock,           19,  0),
    map(ActiveEnergyImport,   21,  1),
    map(ActiveEnergyExport,   23,  1),
    map(ReactiveEnergyImport, 25,  1),
    map(ReactiveEnergyExport, 27,  1),
];

#[rustfmt::skip]
static KAMSTRUP_LIST3_3P: [FieldMapping; 17] = [
    map(MeterId,               3,  0),
    map(MeterModel,            5,  0),
    map(ActivePowerImport,     7,  0),
    map(ActivePowerExport,     9,  0),
    map(ReactivePowerImport,  11,  0),
    map(ReactivePowerExport,  13,  0),
    map(CurrentL1,            15, -2),
    map(CurrentL2,            17, -2),
    map(CurrentL3,            19, -2),
    map(VoltageL1,            21,  0),
    map(VoltageL2,            23,  0),
    map(VoltageL3,            25,  0),
    map(MeterClock,           27,  0),
    map(ActiveEnergyImport,   29,  1),
    map(ActiveEnergyExport,   31,  1),
    map(ReactiveEnergyImport, 33,  1),
    map(ReactiveEnergyExport, 35,  1),
];

static KAMSTRUP_SHAPES: [MessageShape; 4] = [
    MessageShape { name: "list 2 1-phase", leaf_count: 17, fields: &KAMSTRUP_LIST2_1P },
    MessageShape { name: "list 2 3-phase", leaf_count: 25, fields: &KAMSTRUP_LIST2_3P },
    MessageShape { name: "list 3 1-phase", leaf_count: 27, fields: &KAMSTRUP_LIST3_1P },
    MessageShape { name: "list 3 3-phase", leaf_count: 35, fields: &KAMSTRUP_LIST3_3P },
];

// ============================================================================
// Kaifa
// ============================================================================

// A flat structure of values. Currents in mA, voltages in 0.1 V.

#[rustfmt::skip]
static KAIFA_LIST2_1P: [FieldMapping; 8] = [
    map(MeterId,             2,  0),
    map(MeterModel,          3,  0),
    map(ActivePowerImport,   4,  0),
    map(ActivePowerExport,   5,  0),
    map(ReactivePowerImport, 6,  0),
    map(ReactivePowerExport, 7,  0),
    map(CurrentL1,           8, -3),
    map(VoltageL1,           9, -1),
];

#[rustfmt::skip]
static KAIFA_LIST2_3P: [FieldMapping; 12] = [
    map(MeterId,              2,  0),
    map(MeterModel,           3,  0),
    map(ActivePowerImport,    4,  0),
    map(ActivePowerExport,    5,  0),
    map(ReactivePowerImport,  6,  0),
    map(ReactivePowerExport,  7,  0),
    map(CurrentL1,            8, -3),
    map(CurrentL2,            9, -3),
    map(CurrentL3,           10, -3),
    map(VoltageL1,           11, -1),
    map(VoltageL2,           12, -1),
    map(VoltageL3,           13, -1),
];

#[rustfmt::skip]
static KAIFA_LIST3_1P: [FieldMapping; 13] = [
    map(MeterId,               2,  0),
    map(MeterModel,            3,  0),
    map(ActivePowerImport,     4,  0),
    map(ActivePowerExport,     5,  0),
    map(ReactivePowerImport,   6,  0),
    map(ReactivePowerExport,   7,  0),
    map(CurrentL1,             8, -3),
    map(VoltageL1,             9, -1),
    map(MeterClock,           10,  0),
    map(ActiveEnergyImport,   11,  0),
    map(ActiveEnergyExport,   12,  0),
    map(ReactiveEnergyImport, 13,  0),
    map(ReactiveEnergyExport, 14,  0),
];

#[rustfmt::skip]
static KAIFA_LIST3_3P: [FieldMapping; 17] = [
    map(MeterId,               2,  0),
    map(MeterModel,            3,  0),
    map(ActivePowerImport,     4,  0),
    map(ActivePowerExport,     5,  0),
    map(ReactivePowerImport,   6,  0),
    map(ReactivePowerExport,   7,  0),
    map(CurrentL1,             8, -3),
    map(CurrentL2,             9, -3),
    map(CurrentL3,            10, -3),
    map(VoltageL1,            11, -1),
    map(VoltageL2,            12, -1),
    map(VoltageL3,            13, -1),
    map(MeterClock,           14,  0),
    map(ActiveEnergyImport,   15,  0),
    map(ActiveEnergyExport,   16,  0),
    map(ReactiveEnergyImport, 17,  0),
    map(ReactiveEnergyExport, 18,  0),
];

static KAIFA_SHAPES: [MessageShape; 4] = [
    MessageShape { name: "list 2 1-phase", leaf_count: 9, fields: &KAIFA_LIST2_1P },
    MessageShape { name: "list 2 3-phase", leaf_count: 13, fields: &KAIFA_LIST2_3P },
    MessageShape { name: "list 3 1-phase", leaf_count: 14, fields: &KAIFA_LIST3_1P },
    MessageShape { name: "list 3 3-phase", leaf_count: 18, fields: &KAIFA_LIST3_3P },
];

/// The built-in catalog, searched in order.
pub static CATALOG: &[Dialect] = &[
    Dialect { id: DialectId::Aidon, list_id: b"AIDON_V0001", shapes: &AIDON_SHAPES },
    Dialect { id: DialectId::Kamstrup, list_id: b"Kamstrup_V0001", shapes: &KAMSTRUP_SHAPES },
    Dialect { id: DialectId::Kaifa, list_id: b"KFM_001", shapes: &KAIFA_SHAPES },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tokenize;
    use alloc::vec;
    use alloc::vec::Vec;

    /// Payload with an empty header and a structure of `leaves` items, the
    /// first one a visible string with `list_id`.
    fn payload(list_id: &[u8], leaves: usize) -> Vec<u8> {
        let mut payload = vec![0x00, 0x02, leaves as u8, 0x0A, list_id.len() as u8];
        payload.extend_from_slice(list_id);
        for _ in 1..leaves {
            payload.extend_from_slice(&[0x12, 0x00, 0x01]);
        }
        payload
    }

    #[test]
    fn test_leaf_counts_unique_within_dialect() {
        for dialect in CATALOG {
            for (i, shape) in dialect.shapes.iter().enumerate() {
                for other in &dialect.shapes[i + 1..] {
                    assert_ne!(shape.leaf_count, other.leaf_count, "{} {}", dialect.id, shape.name);
                }
            }
        }
    }

    #[test]
    fn test_dialect_shapes_do_not_shadow_fixed_shapes() {
        for dialect in CATALOG {
            for shape in dialect.shapes {
                assert!(shape.leaf_count > 4, "{} {}", dialect.id, shape.name);
            }
        }
    }

    #[test]
    fn test_positions_within_leaf_count() {
        let all_shapes = CATALOG
            .iter()
            .flat_map(|d| d.shapes.iter())
            .chain([&SINGLE_VALUE, &AIDON_SHORT]);

        for shape in all_shapes {
            let mut positions: Vec<u16> = shape.fields.iter().map(|m| m.position).collect();
            for &position in &positions {
                let in_range = position >= 1 && usize::from(position) <= shape.leaf_count;
                assert!(in_range, "{}", shape.name);
            }
            positions.sort_unstable();
            positions.dedup();
            assert_eq!(positions.len(), shape.fields.len(), "{}", shape.name);
        }
    }

    #[test]
    fn test_contains_pattern() {
        assert!(contains_pattern(b"xxAIDON_V0001", b"AIDON_V0001"));
        assert!(contains_pattern(b"AIDON_V0001", b"AIDON_V0001"));
        assert!(contains_pattern(b"KFM_001yy", b"KFM_001"));
        assert!(!contains_pattern(b"AIDON_V000", b"AIDON_V0001"));
        assert!(!contains_pattern(b"", b"KFM_001"));
        assert!(!contains_pattern(b"abc", b""));
    }

    #[test]
    fn test_resolve_fixed_shapes() {
        let mut session = Some(DialectId::Kamstrup);

        let tokens = tokenize(&[0x00, 0x06, 0x00, 0x00, 0x0E, 0x90]).unwrap();
        let resolution = resolve(CATALOG, &tokens, &mut session).unwrap();
        assert_eq!(resolution.shape, &SINGLE_VALUE);
        assert_eq!(resolution.dialect, None);

        let payload_bytes = payload(b"x", 4);
        let tokens = tokenize(&payload_bytes).unwrap();
        let resolution = resolve(CATALOG, &tokens, &mut session).unwrap();
        assert_eq!(resolution.shape, &AIDON_SHORT);

        // Fixed shapes leave the session alone.
        assert_eq!(session, Some(DialectId::Kamstrup));
    }

    #[test]
    fn test_resolve_two_or_three_items() {
        let mut session = None;
        for leaves in [2, 3] {
            let payload_bytes = payload(b"KFM_001", leaves);
            let tokens = tokenize(&payload_bytes).unwrap();
            assert_eq!(
                resolve(CATALOG, &tokens, &mut session).unwrap_err(),
                Error::UnknownShape(leaves)
            );
        }
    }

    #[test]
    fn test_resolve_detects_and_remembers() {
        let mut session = None;
        let payload_bytes = payload(b"KFM_001", 13);
        let tokens = tokenize(&payload_bytes).unwrap();

        let resolution = resolve(CATALOG, &tokens, &mut session).unwrap();
        assert_eq!(resolution.dialect, Some(DialectId::Kaifa));
        assert_eq!(resolution.shape.name, "list 2 3-phase");
        assert!(resolution.detected);
        assert_eq!(session, Some(DialectId::Kaifa));

        let payload_bytes = payload(b"KFM_001", 18);
        let tokens = tokenize(&payload_bytes).unwrap();
        let resolution = resolve(CATALOG, &tokens, &mut session).unwrap();
        assert_eq!(resolution.shape.name, "list 3 3-phase");
        assert!(!resolution.detected);
    }

    #[test]
    fn test_resolve_unknown_dialect() {
        let mut session = None;
        let payload_bytes = payload(b"ACME_V1", 13);
        let tokens = tokenize(&payload_bytes).unwrap();

        assert_eq!(resolve(CATALOG, &tokens, &mut session).unwrap_err(), Error::UnknownDialect);
        assert_eq!(session, None);
    }

    #[test]
    fn test_list_id_is_case_sensitive() {
        let mut session = None;
        let payload_bytes = payload(b"Kfm_001", 13);
        let tokens = tokenize(&payload_bytes).unwrap();

        assert_eq!(resolve(CATALOG, &tokens, &mut session).unwrap_err(), Error::UnknownDialect);
        assert_eq!(session, None);
    }

    #[test]
    fn test_resolve_remembered_dialect_gone() {
        let mut session = Some(DialectId::Aidon);
        let payload_bytes = payload(b"Kamstrup_V0001", 25);
        let tokens = tokenize(&payload_bytes).unwrap();

        let resolution = resolve(CATALOG, &tokens, &mut session).unwrap();

        assert_eq!(resolution.dialect, Some(DialectId::Kamstrup));
        assert!(resolution.detected);
        assert_eq!(session, Some(DialectId::Kamstrup));
    }

    #[test]
    fn test_resolve_unknown_shape_forgets_dialect() {
        let mut session = Some(DialectId::Aidon);
        let payload_bytes = payload(b"AIDON_V0001", 43);
        let tokens = tokenize(&payload_bytes).unwrap();

        assert_eq!(resolve(CATALOG, &tokens, &mut session).unwrap_err(), Error::UnknownShape(43));
        assert_eq!(session, None);
    }

    #[test]
    fn test_resolve_custom_catalog() {
        static SHAPES: [MessageShape; 1] = [MessageShape {
            name: "power only",
            leaf_count: 5,
            fields: &[map(ActivePowerImport, 5, 0)],
        }];
        static CUSTOM: [Dialect; 1] =
            [Dialect { id: DialectId::Kaifa, list_id: b"KFM_TEST", shapes: &SHAPES }];

        let mut session = None;
        let payload_bytes = payload(b"KFM_TEST", 5);
        let tokens = tokenize(&payload_bytes).unwrap();
        let resolution = resolve(&CUSTOM, &tokens, &mut session).unwrap();

        assert_eq!(resolution.shape.name, "power only");
        assert_eq!(resolve(CATALOG, &tokens, &mut session).unwrap_err(), Error::UnknownDialect);
    }
}
