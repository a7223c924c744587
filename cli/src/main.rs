use std::process::ExitCode;

fn main() -> ExitCode {
    zsnap::library::cli::run()
}
