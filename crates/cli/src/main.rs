use std::process::ExitCode;

fn main() -> ExitCode {
    cierre_cli::run()
}
