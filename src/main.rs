use std::process::ExitCode;

fn main() -> ExitCode {
    sutra_test::cli::run()
}
