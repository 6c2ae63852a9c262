//! sitepipe - front-end asset pipeline command-line tool

use std::process::ExitCode;

use sitepipe::cli;

fn main() -> ExitCode {
    cli::run()
}
