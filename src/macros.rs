/// Implements [Default](core::default::Default) for a named type with a `new()` function.
#[macro_export]
macro_rules! impl_default {
    ($name:ident) => {
        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

/// Implements [Display](std::fmt::Display) for a named enum through its
/// `From<$name> for &'static str` conversion, along with the by-reference
/// variant of the conversion.
#[macro_export]
macro_rules! impl_str_display {
    ($name:ident) => {
        impl From<&$name> for &'static str {
            fn from(v: &$name) -> Self {
                (*v).into()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", <&'static str>::from(self))
            }
        }
    };
}

/// Generates the typed convenience constructors on [Matcher](crate::Matcher)
/// for a list of `config-name => Integral-variant` pairs.
#[macro_export]
macro_rules! matcher_ctors {
    ($($ty:ident => $var:ident),+ $(,)?) => {
        impl $crate::Matcher {
            ::paste::paste! {
                $(
                    #[doc = "Creates an unconstrained `" $ty "` matcher."]
                    pub fn [<$ty _any>]() -> $crate::Matcher {
                        $crate::Matcher::any($crate::Integral::$var)
                    }

                    #[doc = "Creates a `" $ty "` matcher accepting exactly `value`."]
                    pub fn [<$ty _exact>](value: i64) -> $crate::Result<$crate::Matcher> {
                        $crate::Matcher::exact($crate::Integral::$var, value)
                    }

                    #[doc = "Creates an inclusive `" $ty "` range matcher over `[lo, hi]`."]
                    pub fn [<$ty _range>](lo: i64, hi: i64) -> $crate::Result<$crate::Matcher> {
                        $crate::Matcher::range($crate::Integral::$var, lo, hi)
                    }

                    #[doc = "Creates a `" $ty "` matcher accepting any of `values`."]
                    pub fn [<$ty _one_of>](values: &[i64]) -> $crate::Result<$crate::Matcher> {
                        $crate::Matcher::one_of($crate::Integral::$var, values)
                    }
                )+
            }
        }
    };
}
