use core::fmt;

use derive_try_from_primitive::TryFromPrimitive;
#[cfg(feature = "serde")]
use serde::{Serialize, Serializer};

/// DLMS units of the quantities a HAN list carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
#[non_exhaustive]
#[rustfmt::skip]
pub enum Unit {
  Watt           = 27,
  Var            = 29,
  WattHour       = 30,
  VarHour        = 32,
  Ampere         = 33,
  Volt           = 35,
}

impl Unit {
    #[rustfmt::skip]
    pub fn as_str(&self) -> &'static str {
    match self {
      Self::Watt           => "W",
      Self::Var            => "var",
      Self::WattHour       => "Wh",
      Self::VarHour        => "varh",
      Self::Ampere         => "A",
      Self::Volt           => "V",
    }
  }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

#[cfg(feature = "serde")]
impl Serialize for Unit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
