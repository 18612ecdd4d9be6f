//! swcp utility - main entrypoint
// (c) 2024 Ross Younger

fn main() -> std::process::ExitCode {
    swcp::main(std::env::args_os())
}
