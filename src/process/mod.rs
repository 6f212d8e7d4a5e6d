mod error;
#[cfg(test)]
pub mod mock;
mod runner;

pub use error::ProcessError;
pub use runner::{ProcessCommand, ProcessOutput, ProcessRunner, TokioProcessRunner};
