use serde::{Deserialize, Serialize};

use crate::{Error, FunctionCode, Integral, Matcher, Result};

/// One typed, optionally named callback parameter.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(from = "ParameterRepr", into = "ParameterRepr")]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Parameter {
    ty: Integral,
    name: Option<String>,
}

impl Parameter {
    /// Creates a positional parameter.
    pub fn new(ty: Integral) -> Self {
        Self { ty, name: None }
    }

    /// Creates a named parameter.
    pub fn named<S>(ty: Integral, name: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            ty,
            name: Some(name.into()),
        }
    }

    pub fn ty(&self) -> Integral {
        self.ty
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Configuration form of a parameter: `"u8"` or `["u16", "qty"]`.
#[derive(Clone, Deserialize, Serialize)]
#[serde(untagged)]
enum ParameterRepr {
    Bare(Integral),
    Named(Integral, String),
}

impl From<ParameterRepr> for Parameter {
    fn from(repr: ParameterRepr) -> Self {
        match repr {
            ParameterRepr::Bare(ty) => Self::new(ty),
            ParameterRepr::Named(ty, name) => Self::named(ty, name),
        }
    }
}

impl From<Parameter> for ParameterRepr {
    fn from(param: Parameter) -> Self {
        match param.name {
            None => Self::Bare(param.ty),
            Some(name) => Self::Named(param.ty, name),
        }
    }
}

/// A callback prototype: name plus ordered parameter list.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Callback {
    name: String,
    params: Vec<Parameter>,
}

impl Callback {
    pub fn new<S>(name: S, params: Vec<Parameter>) -> Self
    where
        S: Into<String>,
    {
        Self {
            name: name.into(),
            params,
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn params(&self) -> &[Parameter] {
        self.params.as_slice()
    }
}

/// One slave command: function code, field constraints, and the callback
/// dispatched when a full frame matches.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Command {
    function: FunctionCode,
    #[serde(default)]
    fields: Vec<Matcher>,
    callback: String,
}

impl Command {
    pub fn new<S>(function: FunctionCode, fields: Vec<Matcher>, callback: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            function,
            fields,
            callback: callback.into(),
        }
    }

    pub fn function(&self) -> FunctionCode {
        self.function
    }

    pub fn fields(&self) -> &[Matcher] {
        self.fields.as_slice()
    }

    pub fn callback(&self) -> &str {
        self.callback.as_str()
    }

    /// Frame bytes needed by the command: address + function code + fields +
    /// the two CRC bytes.
    pub fn frame_size(&self) -> usize {
        2 + self.fields.iter().map(Matcher::size).sum::<usize>() + 2
    }
}

/// One declared slave device: its address key and command list.
///
/// The address accepts decimal or `0x`-prefixed hex, with an optional
/// `device@` prefix (the configuration-key form); it is parsed during
/// compilation so malformed keys surface as diagnostics.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Device {
    address: String,
    commands: Vec<Command>,
}

impl Device {
    pub fn new<S>(address: S, commands: Vec<Command>) -> Self
    where
        S: Into<String>,
    {
        Self {
            address: address.into(),
            commands,
        }
    }

    pub fn address(&self) -> &str {
        self.address.as_str()
    }

    pub fn commands(&self) -> &[Command] {
        self.commands.as_slice()
    }

    /// Parses the address key into a slave address byte.
    pub fn parse_address(&self) -> Result<u8> {
        parse_device_address(self.address())
    }
}

/// Parses a device address key: optional `device@` prefix, then a decimal or
/// `0x`-prefixed hex number no larger than 255.
pub fn parse_device_address(key: &str) -> Result<u8> {
    let digits = key.strip_prefix("device@").unwrap_or(key);

    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        digits.parse::<u64>()
    }
    .map_err(|_| Error::malformed_device_address(key))?;

    if value > 0xff {
        Err(Error::device_address_too_large(value))
    } else {
        Ok(value as u8)
    }
}

/// Top-level slave specification: buffer-size hint, emitter namespace,
/// callback table, and declared devices.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(from = "SpecificationRepr", into = "SpecificationRepr")]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Specification {
    buffer_size: Option<usize>,
    namespace: Option<String>,
    callbacks: Vec<Callback>,
    devices: Vec<Device>,
}

impl Specification {
    /// Creates an empty specification.
    pub fn new() -> Self {
        Self {
            buffer_size: None,
            namespace: None,
            callbacks: Vec::new(),
            devices: Vec::new(),
        }
    }

    /// Sets the minimum frame buffer reservation.
    pub fn set_buffer_size(&mut self, size: usize) {
        self.buffer_size = Some(size);
    }

    /// Sets the namespace of the generated code.
    pub fn set_namespace<S>(&mut self, namespace: S)
    where
        S: Into<String>,
    {
        self.namespace = Some(namespace.into());
    }

    /// Declares a callback prototype.
    pub fn add_callback<S>(&mut self, name: S, params: Vec<Parameter>)
    where
        S: Into<String>,
    {
        self.callbacks.push(Callback::new(name, params));
    }

    /// Declares a device and its commands.
    pub fn add_device<S>(&mut self, address: S, commands: Vec<Command>)
    where
        S: Into<String>,
    {
        self.devices.push(Device::new(address, commands));
    }

    pub fn buffer_size(&self) -> Option<usize> {
        self.buffer_size
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn callbacks(&self) -> &[Callback] {
        self.callbacks.as_slice()
    }

    pub fn devices(&self) -> &[Device] {
        self.devices.as_slice()
    }
}

crate::impl_default!(Specification);

/// Configuration form of a specification; callbacks load from a name -> params
/// mapping, in declaration order.
#[derive(Clone, Deserialize, Serialize)]
struct SpecificationRepr {
    #[serde(default)]
    buffer_size: Option<usize>,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default, with = "callback_map")]
    callbacks: Vec<(String, Vec<Parameter>)>,
    #[serde(default)]
    devices: Vec<Device>,
}

/// Reads the `callbacks` mapping straight into a vector of entries, keeping
/// the declaration order a sorted map would destroy.
mod callback_map {
    use std::fmt;

    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};

    use super::Parameter;

    type Entries = Vec<(String, Vec<Parameter>)>;

    pub(super) fn serialize<S>(entries: &Entries, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(entries.len()))?;

        for (name, params) in entries {
            map.serialize_entry(name, params)?;
        }

        map.end()
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Entries, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = Entries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of callback names to parameter lists")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Entries::with_capacity(access.size_hint().unwrap_or(0));

                while let Some(entry) = access.next_entry()? {
                    entries.push(entry);
                }

                Ok(entries)
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

impl From<SpecificationRepr> for Specification {
    fn from(repr: SpecificationRepr) -> Self {
        Self {
            buffer_size: repr.buffer_size,
            namespace: repr.namespace,
            callbacks: repr
                .callbacks
                .into_iter()
                .map(|(name, params)| Callback::new(name, params))
                .collect(),
            devices: repr.devices,
        }
    }
}

impl From<Specification> for SpecificationRepr {
    fn from(spec: Specification) -> Self {
        Self {
            buffer_size: spec.buffer_size,
            namespace: spec.namespace,
            callbacks: spec
                .callbacks
                .into_iter()
                .map(|callback| (callback.name, callback.params))
                .collect(),
            devices: spec.devices,
        }
    }
}
