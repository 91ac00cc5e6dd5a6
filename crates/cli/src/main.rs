use std::process::ExitCode;

fn main() -> ExitCode {
    intake_cli::run()
}
