use serde::{Deserialize, Serialize};

use crate::{Error, FunctionCode, Integral, Result};

/// Value constraint shape attached to one on-wire field.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum Shape {
    /// Accepts every value of the field type.
    #[default]
    Any,
    /// Accepts exactly one value.
    Exact(i64),
    /// Accepts any value in the list.
    OneOf(Vec<i64>),
    /// Accepts any value in the inclusive range.
    Range(i64, i64),
    /// Synthetic two-byte terminal; the CRC is validated by the runtime,
    /// never by a generated predicate.
    CrcTerminal,
}

impl Shape {
    pub fn is_any(&self) -> bool {
        matches!(self, Shape::Any)
    }

    pub fn is_crc_terminal(&self) -> bool {
        matches!(self, Shape::CrcTerminal)
    }
}

/// Value constraint for one on-wire field.
///
/// Carries the field type, the constraint [Shape], an optional alias used to
/// name callback arguments and derive state names, and the frame byte
/// position assigned during compilation.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Matcher {
    #[serde(rename = "type")]
    ty: Integral,
    #[serde(rename = "match", default)]
    shape: Shape,
    #[serde(default)]
    alias: Option<String>,
    #[serde(default)]
    pos: usize,
}

impl Matcher {
    /// Creates a matcher accepting every value of `ty`.
    pub fn any(ty: Integral) -> Self {
        Self {
            ty,
            shape: Shape::Any,
            alias: None,
            pos: 0,
        }
    }

    /// Creates a matcher accepting exactly `value`.
    pub fn exact(ty: Integral, value: i64) -> Result<Self> {
        let matcher = Self {
            ty,
            shape: Shape::Exact(value),
            alias: None,
            pos: 0,
        };

        matcher.validate()?;

        Ok(matcher)
    }

    /// Creates a matcher accepting any of `values`.
    pub fn one_of(ty: Integral, values: &[i64]) -> Result<Self> {
        let matcher = Self {
            ty,
            shape: Shape::OneOf(values.into()),
            alias: None,
            pos: 0,
        };

        matcher.validate()?;

        Ok(matcher)
    }

    /// Creates a matcher accepting the inclusive range `[lo, hi]`.
    pub fn range(ty: Integral, lo: i64, hi: i64) -> Result<Self> {
        let matcher = Self {
            ty,
            shape: Shape::Range(lo, hi),
            alias: None,
            pos: 0,
        };

        matcher.validate()?;

        Ok(matcher)
    }

    /// Creates the synthetic CRC terminal matcher.
    pub fn crc() -> Self {
        Self {
            ty: Integral::Crc16,
            shape: Shape::CrcTerminal,
            alias: None,
            pos: 0,
        }
    }

    /// Creates the 8-bit exact matcher for a function-code byte.
    pub fn function_code(code: FunctionCode) -> Self {
        Self {
            ty: Integral::U8,
            shape: Shape::Exact(code.code() as i64),
            alias: Some(<&'static str>::from(code).into()),
            pos: 0,
        }
    }

    /// Attaches an alias used to name arguments and derive state names.
    pub fn with_alias<S>(mut self, alias: S) -> Self
    where
        S: Into<String>,
    {
        self.alias = Some(alias.into());
        self
    }

    pub fn ty(&self) -> Integral {
        self.ty
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Frame position: the count of frame bytes consumed once this matcher
    /// has matched. Assigned by the compiler.
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Gets the number of on-wire bytes the matcher consumes.
    pub fn size(&self) -> usize {
        self.ty.size()
    }

    /// Checks every literal against the type's representable range.
    ///
    /// Deserialized specifications bypass the checked constructors, so the
    /// compiler re-runs this before building the trie.
    pub fn validate(&self) -> Result<()> {
        match &self.shape {
            Shape::Any | Shape::CrcTerminal => Ok(()),
            Shape::Exact(value) => self.check(*value),
            Shape::OneOf(values) => values.iter().try_for_each(|value| self.check(*value)),
            Shape::Range(lo, hi) => {
                self.check(*lo)?;
                self.check(*hi)?;

                if lo > hi {
                    Err(Error::new(
                        crate::ErrorKind::BadMatcherLiteral,
                        format!("range [{lo}, {hi}] is reversed"),
                    ))
                } else {
                    Ok(())
                }
            }
        }
    }

    fn check(&self, value: i64) -> Result<()> {
        if self.ty.contains(value) {
            Ok(())
        } else {
            Err(Error::bad_matcher_literal(value, self.ty))
        }
    }

    /// Prefix-merge equality: same type, shape, and literal values.
    ///
    /// Alias and frame position are naming concerns and do not participate.
    pub fn same_match(&self, other: &Self) -> bool {
        self.ty == other.ty && self.shape == other.shape
    }

    /// Gets whether `param` can losslessly receive every value this matcher
    /// admits.
    ///
    /// A parameter at least as wide as the field always fits. A narrower
    /// parameter fits only when every admitted value is representable, which
    /// an unconstrained field can never guarantee.
    pub fn fits(&self, param: Integral) -> bool {
        if param.size() >= self.size() {
            return true;
        }

        match &self.shape {
            Shape::Any | Shape::CrcTerminal => false,
            Shape::Exact(value) => param.contains(*value),
            Shape::OneOf(values) => values.iter().all(|value| param.contains(*value)),
            Shape::Range(lo, hi) => param.contains(*lo) && param.contains(*hi),
        }
    }

    /// Renders the acceptance predicate over the decoded field value `c`.
    ///
    /// Returns `None` for shapes with no runtime check ([Shape::Any] and
    /// [Shape::CrcTerminal]).
    pub fn predicate(&self) -> Option<String> {
        match &self.shape {
            Shape::Any | Shape::CrcTerminal => None,
            Shape::Exact(value) => Some(format!("c == {value}")),
            Shape::OneOf(values) => Some(
                values
                    .iter()
                    .map(|value| format!("c == {}", hex_literal(*value)))
                    .collect::<Vec<String>>()
                    .join(" || "),
            ),
            Shape::Range(lo, hi) => {
                if *lo == 0 && !self.ty.is_signed() {
                    Some(format!("c <= {hi}"))
                } else {
                    Some(format!("c >= {lo} && c <= {hi}"))
                }
            }
        }
    }
}

fn hex_literal(value: i64) -> String {
    if value < 0 {
        format!("-{:#x}", value.unsigned_abs())
    } else {
        format!("{value:#x}")
    }
}

crate::matcher_ctors!(
    u8 => U8,
    u16 => U16,
    u32 => U32,
    s8 => S8,
    s16 => S16,
    s32 => S32,
);
