use std::{fmt, result};

use serde::{Deserialize, Serialize};

use crate::Integral;

pub type Result<T> = result::Result<T, Error>;

/// Diagnostic categories raised while compiling a slave specification.
///
/// Every compile-time diagnostic is fatal; the emitter is never reached once
/// one has been raised.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum ErrorKind {
    /// The specification declares no callbacks.
    MissingCallbacks = 0,
    /// A command names a callback absent from the callback table.
    UnknownCallback,
    /// A callback name is not a valid C identifier.
    InvalidCallbackName,
    /// A device address key could not be parsed.
    MalformedDeviceAddress,
    /// A device address exceeds the RTU limit of 255.
    DeviceAddressTooLarge,
    /// A captured field cannot be converted to its callback parameter.
    UnfittableArgument,
    /// Two commands terminate on the same concrete byte path.
    DuplicatePath,
    /// A matcher literal lies outside its type's representable range.
    BadMatcherLiteral,
    /// Generic failure (I/O, JSON, or internal).
    Failure = 0xff,
}

impl From<ErrorKind> for &'static str {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::MissingCallbacks => "missing callbacks",
            ErrorKind::UnknownCallback => "unknown callback",
            ErrorKind::InvalidCallbackName => "invalid callback name",
            ErrorKind::MalformedDeviceAddress => "malformed device address",
            ErrorKind::DeviceAddressTooLarge => "device address too large",
            ErrorKind::UnfittableArgument => "unfittable argument",
            ErrorKind::DuplicatePath => "duplicate path",
            ErrorKind::BadMatcherLiteral => "bad matcher literal",
            ErrorKind::Failure => "failure",
        }
    }
}

crate::impl_str_display!(ErrorKind);

/// Compile-time diagnostic for the slave specification.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    /// Creates an [Error] with an explicit kind and message.
    pub fn new<S>(kind: ErrorKind, message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a generic failure [Error].
    pub fn failure<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self::new(ErrorKind::Failure, message)
    }

    pub fn missing_callbacks() -> Self {
        Self::new(
            ErrorKind::MissingCallbacks,
            "the specification declares no callbacks",
        )
    }

    pub fn unknown_callback(name: &str) -> Self {
        Self::new(
            ErrorKind::UnknownCallback,
            format!("`{name}` is not declared in the callbacks section"),
        )
    }

    pub fn invalid_callback_name(name: &str) -> Self {
        Self::new(
            ErrorKind::InvalidCallbackName,
            format!("`{name}` is not a valid C function name"),
        )
    }

    pub fn malformed_device_address(key: &str) -> Self {
        Self::new(
            ErrorKind::MalformedDeviceAddress,
            format!("cannot parse a device address from `{key}`"),
        )
    }

    pub fn device_address_too_large(address: u64) -> Self {
        Self::new(
            ErrorKind::DeviceAddressTooLarge,
            format!("device address {address} must be < 256"),
        )
    }

    pub fn unfittable_argument(callback: &str, param: &str) -> Self {
        Self::new(
            ErrorKind::UnfittableArgument,
            format!("cannot fit the captured field into {param} in `{callback}`"),
        )
    }

    pub fn duplicate_path(callback: &str) -> Self {
        Self::new(
            ErrorKind::DuplicatePath,
            format!("the command for callback `{callback}` duplicates an existing command path"),
        )
    }

    pub fn bad_matcher_literal(value: i64, ty: Integral) -> Self {
        Self::new(
            ErrorKind::BadMatcherLiteral,
            format!("value {value} does not fit in {ty}"),
        )
    }

    /// Gets the diagnostic kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Gets the diagnostic message.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::failure(format!("I/O error: {err}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::failure(format!("JSON error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_names() {
        assert_eq!(
            <&'static str>::from(ErrorKind::UnknownCallback),
            "unknown callback"
        );
        assert_eq!(
            <&'static str>::from(&ErrorKind::DuplicatePath),
            "duplicate path"
        );
    }

    #[test]
    fn test_error_display_names_offender() {
        let err = Error::unknown_callback("on_missing");

        assert_eq!(err.kind(), ErrorKind::UnknownCallback);
        assert!(err.message().contains("on_missing"));
        assert_eq!(
            format!("{err}"),
            "unknown callback: `on_missing` is not declared in the callbacks section"
        );
    }
}
