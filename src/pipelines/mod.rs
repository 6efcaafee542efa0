//! Built-in pipeline stages.
//!
//! - [`MapPipeline`] / [`FilterPipeline`]: closure-based transform and drop stages.
//! - [`JsonLinesWriterPipeline`]: sink writing one JSON object per line.
//! - [`ConsoleWriterPipeline`]: sink logging each record; the crawler
//!   installs it when no stage was configured.

pub mod console_writer;
pub mod json_lines_writer;
pub mod map;

pub use console_writer::ConsoleWriterPipeline;
pub use json_lines_writer::JsonLinesWriterPipeline;
pub use map::{FilterPipeline, MapPipeline};
