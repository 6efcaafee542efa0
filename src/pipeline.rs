//! Trait for defining item processing pipelines.
//!
//! A pipeline is an ordered list of stages. Every stage receives the record
//! as left by the stages before it together with a [`Next`] handle to the
//! rest of the chain, and decides what happens next:
//! - call `next.run(item)` once to pass the record on,
//! - return without calling it to drop the record,
//! - call it more than once to duplicate the record.
//!
//! The last stage is the sink that externalizes the record; its `next` is a
//! no-op. Stages run strictly in order for one record, and the crawler feeds
//! records through the chain from a single task, so stage state needs no
//! locking against other records of the same crawl.

use crate::error::PipelineError;
use crate::spider::ScrapedItem;
use async_trait::async_trait;
use tracing::{debug, error, trace};

/// The `Pipeline` trait defines the contract for one stage of the chain.
#[async_trait]
pub trait Pipeline<I: ScrapedItem>: Send + Sync + 'static {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Processes a single record and decides whether to call `next`.
    async fn process_item(&self, item: I, next: Next<'_, I>) -> Result<(), PipelineError>;

    /// Called once after the last record went through the chain.
    ///
    /// This method can be used to flush writers or release resources.
    async fn close(&self) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// Handle to the remainder of the chain after the current stage.
pub struct Next<'a, I: ScrapedItem> {
    rest: &'a [Box<dyn Pipeline<I>>],
}

impl<I: ScrapedItem> Clone for Next<'_, I> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<I: ScrapedItem> Copy for Next<'_, I> {}

impl<'a, I: ScrapedItem> Next<'a, I> {
    /// Passes `item` to the following stage.
    pub async fn run(self, item: I) -> Result<(), PipelineError> {
        match self.rest.split_first() {
            Some((stage, rest)) => {
                trace!("Record entering stage '{}'", stage.name());
                stage.process_item(item, Next { rest }).await
            }
            None => {
                trace!("Record reached the end of the chain");
                Ok(())
            }
        }
    }
}

/// An ordered sequence of stages, built once before the crawl.
pub struct PipelineChain<I: ScrapedItem> {
    stages: Vec<Box<dyn Pipeline<I>>>,
}

impl<I: ScrapedItem> PipelineChain<I> {
    pub fn new(stages: Vec<Box<dyn Pipeline<I>>>) -> Self {
        Self { stages }
    }

    /// Runs one record through every stage, head to tail.
    pub async fn process(&self, item: I) -> Result<(), PipelineError> {
        Next {
            rest: &self.stages,
        }
        .run(item)
        .await
    }

    /// Closes every stage in chain order. All stages are closed even when
    /// one fails; the first error is returned.
    pub async fn close(&self) -> Result<(), PipelineError> {
        let mut first_error = None;
        for stage in &self.stages {
            match stage.close().await {
                Ok(()) => debug!("Pipeline '{}' closed", stage.name()),
                Err(e) => {
                    error!("Failed to close pipeline '{}': {}", stage.name(), e);
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
