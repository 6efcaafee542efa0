//! Sink stage that logs every record.

use crate::error::PipelineError;
use crate::pipeline::{Next, Pipeline};
use crate::spider::ScrapedItem;
use async_trait::async_trait;
use tracing::info;

/// Logs each record at `info` level and ends the chain.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleWriterPipeline;

impl ConsoleWriterPipeline {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl<I: ScrapedItem> Pipeline<I> for ConsoleWriterPipeline {
    fn name(&self) -> &str {
        "console_writer"
    }

    async fn process_item(&self, item: I, _next: Next<'_, I>) -> Result<(), PipelineError> {
        info!("Item: {:?}", item);
        Ok(())
    }
}
