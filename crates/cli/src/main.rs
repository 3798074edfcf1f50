use std::process::ExitCode;

fn main() -> ExitCode {
    configurator_cli::run()
}
