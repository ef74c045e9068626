//! # Modbus RTU slave datagram parser generator
//!
//! This crate compiles a declarative description of one or more Modbus RTU
//! slave devices into C++ source for a byte-at-a-time datagram parser. The
//! generated state machine validates incoming frames against the declared
//! commands, accumulates the CRC, and dispatches the matching callback with
//! typed arguments extracted from the frame buffer.
//!
//! The pipeline has three stages:
//!
//! 1. A [Specification] gathers callback prototypes and per-device command
//!    lists, each command being a function code plus field [Matcher]s.
//! 2. [compile] merges every command into a single prefix-shared state trie,
//!    checks that each captured field fits its callback parameter, and binds
//!    parameters to frame byte offsets.
//! 3. [Emitter] renders the compiled [Program] through a fixed code
//!    template, producing the state enum, the per-character dispatch body,
//!    and the callback invocations.
//!
//! ```rust
//! use rtugen::{compile, Command, Emitter, FunctionCode, Integral, Matcher, Parameter, Specification};
//!
//! let mut spec = Specification::new();
//! spec.set_namespace("console");
//! spec.add_callback(
//!     "on_read_leds",
//!     vec![
//!         Parameter::named(Integral::U8, "addr"),
//!         Parameter::named(Integral::U8, "qty"),
//!     ],
//! );
//! spec.add_device(
//!     "device@37",
//!     vec![Command::new(
//!         FunctionCode::ReadCoils,
//!         vec![
//!             Matcher::u16_range(0, 11)?.with_alias("from"),
//!             Matcher::u16_range(1, 12)?.with_alias("qty"),
//!         ],
//!         "on_read_leds",
//!     )],
//! );
//!
//! let program = compile(&spec)?;
//! let code = Emitter::new().render(&program);
//!
//! assert!(code.contains("namespace console {"));
//! assert!(code.contains("void on_read_leds(uint8_t addr, uint8_t qty);"));
//! # Ok::<(), rtugen::Error>(())
//! ```
//!
//! Specifications can also be loaded from JSON through [cli::load_spec]; the
//! `rtugen` binary wraps the whole pipeline behind `-o`/`--output` and
//! `-t`/`--tab-size` options.
//!
//! All compile-time diagnostics are fatal and carry the offending identifier;
//! see [ErrorKind] for the full set.

/// Command-line driver: argument surface, JSON loader, output writing
pub mod cli;
/// Trie compiler turning a specification into a state graph
pub mod compiler;
/// Template renderer for the compiled state graph
pub mod emitter;
/// Library error types
pub mod error;
/// Modbus RTU function codes
pub mod function_code;
/// Integral type descriptors for fields and parameters
pub mod integral;
/// Logging convenience helpers
pub mod logging;
mod macros;
/// Field value constraints
pub mod matcher;
/// The slave specification data model
pub mod spec;
/// State arena for the compiled trie
pub mod state;

pub use compiler::*;
pub use emitter::*;
pub use error::*;
pub use function_code::*;
pub use integral::*;
pub use logging::*;
pub use matcher::*;
pub use spec::*;
pub use state::*;

/// Namespace of the generated code when none is configured.
pub const DEFAULT_NAMESPACE: &str = "slave";
/// Indentation width of the generated code when none is configured.
pub const DEFAULT_TAB_SIZE: usize = 4;
/// Smallest possible frame: address byte, function code, and the CRC pair.
pub const MIN_FRAME: usize = 4;
