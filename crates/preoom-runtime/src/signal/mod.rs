//! Signal handling for the supervisor
//!
//! Relay-class signals and SIGCHLD are blocked and consumed with
//! `sigtimedwait` on the supervising thread.

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        pub use unix::*;
    }
}
