mod cli;
pub mod config;
mod ctl;
pub mod tracing;

pub use ctl::main as ctl_main;

pub(crate) mod exitcode {
    /// An internal software error has been detected.  This
    /// should be limited to non-operating system related
    /// errors as possible.
    pub const SOFTWARE: u8 = 70;

    /// Something was found in an unconfigured or misconfigured state.
    pub const CONFIG: u8 = 78;
}
