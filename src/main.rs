use std::process;

fn main() {
    process::exit(rtugen::cli::run());
}
