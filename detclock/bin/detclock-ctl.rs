#![forbid(unsafe_code)]

fn main() -> std::io::Result<std::process::ExitCode> {
    detclock::ctl_main()
}
