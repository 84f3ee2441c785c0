//! The quantities a HAN list can carry.

use core::fmt;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::obis_code::ObisCode;
use crate::unit::Unit;

/// How the item behind a field is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Unsigned,
    /// Currents may be negative on some meters.
    Signed,
    Text,
    Clock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Field {
    MeterId,
    MeterModel,
    MeterClock,
    ActivePowerImport,
    ActivePowerExport,
    ReactivePowerImport,
    ReactivePowerExport,
    CurrentL1,
    CurrentL2,
    CurrentL3,
    VoltageL1,
    VoltageL2,
    VoltageL3,
    ActiveEnergyImport,
    ActiveEnergyExport,
    ReactiveEnergyImport,
    ReactiveEnergyExport,
}

impl Field {
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::MeterId | Self::MeterModel => FieldKind::Text,
            Self::MeterClock => FieldKind::Clock,
            Self::CurrentL1 | Self::CurrentL2 | Self::CurrentL3 => FieldKind::Signed,
            _ => FieldKind::Unsigned,
        }
    }

    /// Extra power of ten applied on top of the list's exponent.
    ///
    /// Currents are reported in mA.
    pub fn unit_offset(&self) -> i8 {
        match self {
            Self::CurrentL1 | Self::CurrentL2 | Self::CurrentL3 => 3,
            _ => 0,
        }
    }

    /// Only set for quantities of the second and third phase.
    pub fn is_polyphase(&self) -> bool {
        matches!(self, Self::CurrentL2 | Self::CurrentL3 | Self::VoltageL2 | Self::VoltageL3)
    }

    #[rustfmt::skip]
    pub fn obis_code(&self) -> ObisCode {
        match self {
            Self::MeterId              => ObisCode::new(0, 0, 96, 1, 0, 255),
            Self::MeterModel           => ObisCode::new(0, 0, 96, 1, 7, 255),
            Self::MeterClock           => ObisCode::new(0, 0,  1, 0, 0, 255),
            Self::ActivePowerImport    => ObisCode::new(1, 0,  1, 7, 0, 255),
            Self::ActivePowerExport    => ObisCode::new(1, 0,  2, 7, 0, 255),
            Self::ReactivePowerImport  => ObisCode::new(1, 0,  3, 7, 0, 255),
            Self::ReactivePowerExport  => ObisCode::new(1, 0,  4, 7, 0, 255),
            Self::CurrentL1            => ObisCode::new(1, 0, 31, 7, 0, 255),
            Self::CurrentL2            => ObisCode::new(1, 0, 51, 7, 0, 255),
            Self::CurrentL3            => ObisCode::new(1, 0, 71, 7, 0, 255),
            Self::VoltageL1            => ObisCode::new(1, 0, 32, 7, 0, 255),
            Self::VoltageL2            => ObisCode::new(1, 0, 52, 7, 0, 255),
            Self::VoltageL3            => ObisCode::new(1, 0, 72, 7, 0, 255),
            Self::ActiveEnergyImport   => ObisCode::new(1, 0,  1, 8, 0, 255),
            Self::ActiveEnergyExport   => ObisCode::new(1, 0,  2, 8, 0, 255),
            Self::ReactiveEnergyImport => ObisCode::new(1, 0,  3, 8, 0, 255),
            Self::ReactiveEnergyExport => ObisCode::new(1, 0,  4, 8, 0, 255),
        }
    }

    /// Physical unit of the quantity, `None` for text and clock fields.
    pub fn unit(&self) -> Option<Unit> {
        Some(match self {
            Self::MeterId | Self::MeterModel | Self::MeterClock => return None,
            Self::ActivePowerImport | Self::ActivePowerExport => Unit::Watt,
            Self::ReactivePowerImport | Self::ReactivePowerExport => Unit::Var,
            Self::CurrentL1 | Self::CurrentL2 | Self::CurrentL3 => Unit::Ampere,
            Self::VoltageL1 | Self::VoltageL2 | Self::VoltageL3 => Unit::Volt,
            Self::ActiveEnergyImport | Self::ActiveEnergyExport => Unit::WattHour,
            Self::ReactiveEnergyImport | Self::ReactiveEnergyExport => Unit::VarHour,
        })
    }

    #[rustfmt::skip]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MeterId              => "meter id",
            Self::MeterModel           => "meter model",
            Self::MeterClock           => "meter clock",
            Self::ActivePowerImport    => "active power import",
            Self::ActivePowerExport    => "active power export",
            Self::ReactivePowerImport  => "reactive power import",
            Self::ReactivePowerExport  => "reactive power export",
            Self::CurrentL1            => "current L1",
            Self::CurrentL2            => "current L2",
            Self::CurrentL3            => "current L3",
            Self::VoltageL1            => "voltage L1",
            Self::VoltageL2            => "voltage L2",
            Self::VoltageL3            => "voltage L3",
            Self::ActiveEnergyImport   => "active energy import",
            Self::ActiveEnergyExport   => "active energy export",
            Self::ReactiveEnergyImport => "reactive energy import",
            Self::ReactiveEnergyExport => "reactive energy export",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}
