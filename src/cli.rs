use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;

use crate::{compile, Emitter, LogLevel, Result, Specification};

/// Exit code for success.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for any diagnostic.
pub const EXIT_FAILURE: i32 = 1;

/// Command-line surface of the generator.
#[derive(Debug, Parser)]
#[command(name = "rtugen")]
#[command(about = "Generate the C++ datagram parser for a Modbus RTU slave")]
#[command(version)]
pub struct Args {
    /// Slave specification file (JSON)
    #[arg(value_name = "SPEC")]
    pub spec: PathBuf,

    /// Output file name; defaults to standard output
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Set the tab size (0-8)
    #[arg(short, long, default_value_t = 4, value_parser = clap::value_parser!(u8).range(0..=8))]
    pub tab_size: u8,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parses the command line, runs the compiler, and writes the output.
///
/// Returns the process exit code; every diagnostic prints a single
/// human-readable line on stderr.
pub fn run() -> i32 {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(LogLevel::from_verbosity(args.verbose).into())
        .init();

    match generate(&args) {
        Ok(()) => EXIT_SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            EXIT_FAILURE
        }
    }
}

/// Loads a JSON specification file.
pub fn load_spec<P>(path: P) -> Result<Specification>
where
    P: AsRef<Path>,
{
    let raw = fs::read_to_string(path)?;

    Ok(serde_json::from_str(raw.as_str())?)
}

fn generate(args: &Args) -> Result<()> {
    let spec = load_spec(&args.spec)?;
    let program = compile(&spec)?;
    let code = Emitter::with_tab_size(args.tab_size as usize).render(&program);

    match args.output.as_deref() {
        Some(path) => {
            log::info!("writing generated parser to {}", path.display());
            fs::write(path, code)?;
        }
        None => print!("{code}"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "rtugen",
            "datagram.json",
            "-o",
            "datagram.hpp",
            "--tab-size",
            "2",
            "-vv",
        ])
        .expect("valid command line");

        assert_eq!(args.spec, PathBuf::from("datagram.json"));
        assert_eq!(args.output.as_deref(), Some(Path::new("datagram.hpp")));
        assert_eq!(args.tab_size, 2);
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_tab_size_bounds() {
        assert!(Args::try_parse_from(["rtugen", "spec.json", "-t", "8"]).is_ok());
        assert!(Args::try_parse_from(["rtugen", "spec.json", "-t", "9"]).is_err());
    }

    #[test]
    fn test_missing_spec_file() {
        let err = load_spec("no-such-spec.json").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Failure);
    }
}
