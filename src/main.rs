use std::process::ExitCode;

fn main() -> ExitCode {
    dayboard::run()
}
