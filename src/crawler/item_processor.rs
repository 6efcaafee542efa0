//! Contains the item processor for the crawler.
//! This module runs scraped items through the pipeline chain, one at a time.

use crate::pipeline::PipelineChain;
use crate::spider::ScrapedItem;
use crate::stats::StatCollector;
use kanal::AsyncReceiver;
use log::{error, trace};
use std::sync::Arc;

/// Spawns the single consumer of the item stream.
///
/// The task ends once every sender is gone and the buffered items have been
/// pipelined, which is what makes the drain lossless.
pub(crate) fn spawn_item_processor_task<I: ScrapedItem>(
    item_rx: AsyncReceiver<I>,
    chain: Arc<PipelineChain<I>>,
    stats: Arc<StatCollector>,
) -> tokio::task::JoinHandle<()> {
    trace!(
        "Starting item processor with pipelines: {:?}",
        chain.names()
    );
    tokio::spawn(async move {
        while let Ok(item) = item_rx.recv().await {
            trace!("Received item for processing");
            match chain.process(item).await {
                Ok(()) => stats.increment_items_processed(),
                Err(e) => {
                    error!("Pipeline error: {}", e);
                    stats.increment_items_failed();
                }
            }
        }
        trace!("Item stream closed and drained, item processor finished");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::pipeline::{Next, Pipeline};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Collect(Arc<Mutex<Vec<usize>>>);

    #[async_trait]
    impl Pipeline<usize> for Collect {
        fn name(&self) -> &str {
            "collect"
        }

        async fn process_item(&self, item: usize, _: Next<'_, usize>) -> Result<(), PipelineError> {
            if item % 1000 == 999 {
                return Err(PipelineError::Stage {
                    stage: "collect".into(),
                    message: "rejected".into(),
                });
            }
            self.0.lock().unwrap().push(item);
            Ok(())
        }
    }

    #[tokio::test]
    async fn backlog_is_drained_after_senders_drop() {
        let (item_tx, item_rx) = kanal::unbounded_async();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain = Arc::new(PipelineChain::new(vec![
            Box::new(Collect(Arc::clone(&seen))) as Box<dyn Pipeline<usize>>,
        ]));
        let stats = Arc::new(StatCollector::new());

        for i in 0..8000 {
            item_tx.send(i).await.unwrap();
        }
        let consumer = spawn_item_processor_task(item_rx, chain, Arc::clone(&stats));
        drop(item_tx);
        consumer.await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 7992);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        let summary = stats.snapshot();
        assert_eq!(summary.items_processed, 7992);
        assert_eq!(summary.items_failed, 8);
    }
}
