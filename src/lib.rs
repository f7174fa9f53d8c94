#![warn(clippy::pedantic)]
// Noisy doc/signature lints; would require annotating every pub function
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
// Style preference: keeping format!("{}", x) over format!("{x}") for readability with complex exprs
#![allow(clippy::uninlined_format_args)]
// Millisecond arithmetic in the poll backoff
#![allow(clippy::cast_possible_truncation)]
// Module structure: pairing::PairingController and friends
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod pairing;
pub mod session;
pub(crate) mod utils;

pub use errors::{PairingError, PairingResult};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
