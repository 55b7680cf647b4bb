pub mod common;
pub mod watch;
