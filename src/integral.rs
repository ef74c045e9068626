use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Integral type descriptor for on-wire fields and callback parameters.
///
/// All multi-byte fields are big-endian on the wire, except the CRC tail
/// which Modbus RTU transmits little-endian.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum Integral {
    U8,
    U16,
    U32,
    S8,
    S16,
    S32,
    F32,
    #[serde(rename = "crc")]
    Crc16,
}

impl Integral {
    /// Gets the width in bits.
    pub const fn bits(&self) -> u32 {
        match self {
            Integral::U8 | Integral::S8 => 8,
            Integral::U16 | Integral::S16 | Integral::Crc16 => 16,
            Integral::U32 | Integral::S32 | Integral::F32 => 32,
        }
    }

    /// Gets the width in bytes.
    pub const fn size(&self) -> usize {
        (self.bits() / 8) as usize
    }

    pub const fn is_signed(&self) -> bool {
        matches!(self, Integral::S8 | Integral::S16 | Integral::S32)
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Integral::F32)
    }

    /// Gets whether the field is little-endian on the wire (CRC tail only).
    pub const fn little_endian(&self) -> bool {
        matches!(self, Integral::Crc16)
    }

    /// Smallest representable value. Meaningful for integer types only.
    pub const fn min(&self) -> i64 {
        if self.is_signed() {
            -(1i64 << (self.bits() - 1))
        } else {
            0
        }
    }

    /// Largest representable value. Meaningful for integer types only.
    pub const fn max(&self) -> i64 {
        if self.is_signed() {
            (1i64 << (self.bits() - 1)) - 1
        } else {
            (1i64 << self.bits()) - 1
        }
    }

    /// Gets whether `value` is representable.
    ///
    /// Float fields carry no integer literals, so every value is rejected.
    pub const fn contains(&self, value: i64) -> bool {
        if self.is_float() {
            false
        } else {
            self.min() <= value && value <= self.max()
        }
    }

    /// Host-side C type name used in generated prototypes.
    pub const fn ctype(&self) -> &'static str {
        match self {
            Integral::U8 => "uint8_t",
            Integral::U16 | Integral::Crc16 => "uint16_t",
            Integral::U32 => "uint32_t",
            Integral::S8 => "int8_t",
            Integral::S16 => "int16_t",
            Integral::S32 => "int32_t",
            Integral::F32 => "float",
        }
    }
}

impl From<Integral> for &'static str {
    fn from(ty: Integral) -> Self {
        match ty {
            Integral::U8 => "u8",
            Integral::U16 => "u16",
            Integral::U32 => "u32",
            Integral::S8 => "s8",
            Integral::S16 => "s16",
            Integral::S32 => "s32",
            Integral::F32 => "f32",
            Integral::Crc16 => "crc",
        }
    }
}

impl TryFrom<&str> for Integral {
    type Error = Error;

    fn try_from(name: &str) -> Result<Self> {
        match name {
            "u8" => Ok(Self::U8),
            "u16" => Ok(Self::U16),
            "u32" => Ok(Self::U32),
            "s8" => Ok(Self::S8),
            "s16" => Ok(Self::S16),
            "s32" => Ok(Self::S32),
            "f32" => Ok(Self::F32),
            "crc" => Ok(Self::Crc16),
            _ => Err(Error::failure(format!("unknown integral type: `{name}`"))),
        }
    }
}

crate::impl_str_display!(Integral);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(Integral::U8.size(), 1);
        assert_eq!(Integral::S16.size(), 2);
        assert_eq!(Integral::U32.size(), 4);
        assert_eq!(Integral::F32.size(), 4);
        assert_eq!(Integral::Crc16.size(), 2);
    }

    #[test]
    fn test_ranges() {
        assert_eq!(Integral::U8.max(), 0xff);
        assert_eq!(Integral::U16.max(), 0xffff);
        assert_eq!(Integral::U32.max(), 0xffff_ffff);
        assert_eq!(Integral::S8.min(), -128);
        assert_eq!(Integral::S8.max(), 127);
        assert_eq!(Integral::S16.min(), -32768);

        assert!(Integral::U8.contains(0xff));
        assert!(!Integral::U8.contains(0x100));
        assert!(Integral::S8.contains(-128));
        assert!(!Integral::S8.contains(-129));
        assert!(!Integral::U16.contains(-1));
        assert!(!Integral::F32.contains(0));
    }

    #[test]
    fn test_endianness() {
        assert!(Integral::Crc16.little_endian());
        assert!(!Integral::U16.little_endian());
    }

    #[test]
    fn test_names() -> crate::Result<()> {
        assert_eq!(<&'static str>::from(Integral::U16), "u16");
        assert_eq!(Integral::try_from("s32")?, Integral::S32);
        assert_eq!(Integral::try_from("crc")?, Integral::Crc16);
        assert!(Integral::try_from("u64").is_err());

        assert_eq!(Integral::S8.ctype(), "int8_t");
        assert_eq!(Integral::Crc16.ctype(), "uint16_t");

        Ok(())
    }
}
