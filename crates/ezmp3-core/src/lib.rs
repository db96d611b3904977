//! ezmp3-core: acquire a video's audio track and convert it to MP3

pub mod acquirer;
pub mod config;
pub mod converter;
pub mod error;
pub mod job;
pub mod probe;
pub mod segment;

pub use acquirer::{AcquiredAudio, Acquirer, SourceUrl};
pub use config::Config;
pub use converter::{Backend, Conversion, Converter};
pub use error::{JobError, Result};
pub use job::{Delivery, Job, JobPaths, JobStage};
