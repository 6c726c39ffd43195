use clap::Parser;
use liveness_check::{cli, error::exit_code_for};

fn main() {
    let argv = cli::normalize_legacy_flags(std::env::args_os());
    let args = cli::Args::parse_from(argv);
    match cli::dispatch(args) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            // logging may not be up yet when config validation fails
            eprintln!("error: {err:#}");
            std::process::exit(exit_code_for(&err));
        }
    }
}
