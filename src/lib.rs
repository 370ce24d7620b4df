//! punctprep - launcher for the punctuation/capitalization data-preparation tool
//!
//! Holds the fixed invocation used to generate punctuation and capitalization
//! labels from WMT/TED corpora, and runs the external preparation program with
//! it, passing the program's exit status straight through.

pub mod cli;
pub mod config;
pub mod error;
pub mod invocation;
pub mod launcher;

pub use config::Config;
pub use error::{PrepError, Result};
pub use invocation::{InvocationConfig, TestRatio};
pub use launcher::{Launcher, ProgramConfig};
