//! # OSS Host Daemon
//!
//! Main entry point for the simulated kernel.

use ossd::{init_tracing, CliArgs, CliError, HostRuntime, USAGE};
use std::env;
use std::process;

fn main() {
    // Everything is dropped, and so torn down, before the process exits.
    let code = run();
    process::exit(code);
}

fn run() -> i32 {
    let config = match CliArgs::parse_from_args(env::args_os()).and_then(CliArgs::into_config) {
        Ok(config) => config,
        Err(CliError::HelpRequested) => {
            print!("{}", USAGE);
            return 1;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprint!("{}", USAGE);
            return 1;
        }
    };

    init_tracing(config.verbose);

    let mut runtime = match HostRuntime::new(config) {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to create runtime: {}", e);
            return 1;
        }
    };

    if let Err(e) = runtime.install_interrupt_handler() {
        eprintln!("{}", e);
        return 1;
    }

    match runtime.run() {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("Runtime error: {}", e);
            1
        }
    }
}
