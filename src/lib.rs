pub mod backend;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod jpeg_quality;
pub mod metadata;
pub mod pipeline;
pub mod progress;
pub mod render;
pub mod report;
pub mod shutdown;
pub mod util;
pub mod wizard;
