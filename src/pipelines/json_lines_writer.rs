//! Sink stage that serializes every record as one line of JSON.

use crate::error::PipelineError;
use crate::pipeline::{Next, Pipeline};
use crate::spider::ScrapedItem;
use async_trait::async_trait;
use std::io::{Stdout, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// Writes each record as a JSON object followed by `\n`.
///
/// This is a terminal stage: it never calls `next`.
pub struct JsonLinesWriterPipeline<W: Write + Send + 'static> {
    writer: Arc<Mutex<W>>,
}

impl JsonLinesWriterPipeline<Stdout> {
    /// Writes to standard output.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send + 'static> JsonLinesWriterPipeline<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    /// Shared handle to the underlying writer, e.g. to read back an
    /// in-memory buffer.
    pub fn handle(&self) -> Arc<Mutex<W>> {
        Arc::clone(&self.writer)
    }
}

#[async_trait]
impl<I, W> Pipeline<I> for JsonLinesWriterPipeline<W>
where
    I: ScrapedItem,
    W: Write + Send + 'static,
{
    fn name(&self) -> &str {
        "json_lines_writer"
    }

    async fn process_item(&self, item: I, _next: Next<'_, I>) -> Result<(), PipelineError> {
        let mut line = serde_json::to_vec(&item)?;
        line.push(b'\n');
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(&line)?;
        Ok(())
    }

    async fn close(&self) -> Result<(), PipelineError> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineChain;

    #[derive(Debug, serde::Serialize)]
    struct Listing {
        title: String,
        link: String,
    }

    #[tokio::test]
    async fn writes_one_object_per_line() {
        let sink = JsonLinesWriterPipeline::new(Vec::<u8>::new());
        let output = sink.handle();
        let chain = PipelineChain::new(vec![Box::new(sink) as Box<dyn Pipeline<Listing>>]);

        for n in 1..=2 {
            chain
                .process(Listing {
                    title: format!("t{}", n),
                    link: format!("http://example.test/{}", n),
                })
                .await
                .unwrap();
        }
        chain.close().await.unwrap();

        let written = String::from_utf8(output.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"{"title":"t1","link":"http://example.test/1"}"#,
                r#"{"title":"t2","link":"http://example.test/2"}"#,
            ]
        );
    }
}
