use serde::{Deserialize, Serialize};

use crate::{Error, Matcher, Result};

/// Modbus RTU function codes supported by generated slaves.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum FunctionCode {
    ReadCoils = 0x01,
    ReadDiscreteInputs = 0x02,
    ReadHoldingRegisters = 0x03,
    ReadInputRegisters = 0x04,
    WriteSingleCoil = 0x05,
    WriteSingleRegister = 0x06,
    WriteMultipleCoils = 0x0f,
    WriteMultipleRegisters = 0x10,
    ReadWriteMultipleRegisters = 0x17,
}

impl FunctionCode {
    /// Gets the on-wire code byte.
    pub const fn code(&self) -> u8 {
        *self as u8
    }

    /// Creates the 8-bit exact matcher for the code byte, aliased with the
    /// upper-case code name so derived state names read naturally.
    pub fn matcher(&self) -> Matcher {
        Matcher::function_code(*self)
    }
}

impl From<FunctionCode> for u8 {
    fn from(code: FunctionCode) -> Self {
        code as u8
    }
}

impl TryFrom<u8> for FunctionCode {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self> {
        match byte {
            0x01 => Ok(Self::ReadCoils),
            0x02 => Ok(Self::ReadDiscreteInputs),
            0x03 => Ok(Self::ReadHoldingRegisters),
            0x04 => Ok(Self::ReadInputRegisters),
            0x05 => Ok(Self::WriteSingleCoil),
            0x06 => Ok(Self::WriteSingleRegister),
            0x0f => Ok(Self::WriteMultipleCoils),
            0x10 => Ok(Self::WriteMultipleRegisters),
            0x17 => Ok(Self::ReadWriteMultipleRegisters),
            _ => Err(Error::failure(format!("unknown function code: {byte:#04x}"))),
        }
    }
}

impl From<FunctionCode> for &'static str {
    fn from(code: FunctionCode) -> Self {
        match code {
            FunctionCode::ReadCoils => "READ_COILS",
            FunctionCode::ReadDiscreteInputs => "READ_DISCRETE_INPUTS",
            FunctionCode::ReadHoldingRegisters => "READ_HOLDING_REGISTERS",
            FunctionCode::ReadInputRegisters => "READ_INPUT_REGISTERS",
            FunctionCode::WriteSingleCoil => "WRITE_SINGLE_COIL",
            FunctionCode::WriteSingleRegister => "WRITE_SINGLE_REGISTER",
            FunctionCode::WriteMultipleCoils => "WRITE_MULTIPLE_COILS",
            FunctionCode::WriteMultipleRegisters => "WRITE_MULTIPLE_REGISTERS",
            FunctionCode::ReadWriteMultipleRegisters => "READ_WRITE_MULTIPLE_REGISTERS",
        }
    }
}

crate::impl_str_display!(FunctionCode);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_values() {
        assert_eq!(FunctionCode::ReadCoils.code(), 0x01);
        assert_eq!(FunctionCode::ReadDiscreteInputs.code(), 0x02);
        assert_eq!(FunctionCode::ReadHoldingRegisters.code(), 0x03);
        assert_eq!(FunctionCode::ReadInputRegisters.code(), 0x04);
        assert_eq!(FunctionCode::WriteSingleCoil.code(), 0x05);
        assert_eq!(FunctionCode::WriteSingleRegister.code(), 0x06);
        assert_eq!(FunctionCode::WriteMultipleCoils.code(), 0x0f);
        assert_eq!(FunctionCode::WriteMultipleRegisters.code(), 0x10);
        assert_eq!(FunctionCode::ReadWriteMultipleRegisters.code(), 0x17);
    }

    #[test]
    fn test_from_byte() -> Result<()> {
        assert_eq!(FunctionCode::try_from(0x0f)?, FunctionCode::WriteMultipleCoils);
        assert!(FunctionCode::try_from(0x07).is_err());

        Ok(())
    }

    #[test]
    fn test_names() {
        assert_eq!(
            <&'static str>::from(FunctionCode::ReadWriteMultipleRegisters),
            "READ_WRITE_MULTIPLE_REGISTERS"
        );
        assert_eq!(format!("{}", FunctionCode::ReadCoils), "READ_COILS");
    }
}
