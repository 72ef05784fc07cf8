//! External batch jobs: the line protocol and the process runner.

pub mod protocol;
pub mod runner;

pub use protocol::{read_transcript, BatchEvent, ProtocolReader, Transcript};
pub use runner::BatchRunner;
