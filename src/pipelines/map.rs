//! Closure-based stages for small per-record transformations.

use crate::error::PipelineError;
use crate::pipeline::{Next, Pipeline};
use crate::spider::ScrapedItem;
use async_trait::async_trait;
use tracing::trace;

/// Applies a function to every record, then forwards it.
///
/// ```rust,ignore
/// let trim = MapPipeline::new("trim", |mut item: Listing| {
///     item.title = item.title.trim().to_string();
///     item
/// });
/// ```
pub struct MapPipeline<F> {
    name: String,
    f: F,
}

impl<F> MapPipeline<F> {
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<I, F> Pipeline<I> for MapPipeline<F>
where
    I: ScrapedItem,
    F: Fn(I) -> I + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn process_item(&self, item: I, next: Next<'_, I>) -> Result<(), PipelineError> {
        next.run((self.f)(item)).await
    }
}

/// Forwards records matching a predicate and drops the rest.
pub struct FilterPipeline<F> {
    name: String,
    predicate: F,
}

impl<F> FilterPipeline<F> {
    pub fn new(name: impl Into<String>, predicate: F) -> Self {
        Self {
            name: name.into(),
            predicate,
        }
    }
}

#[async_trait]
impl<I, F> Pipeline<I> for FilterPipeline<F>
where
    I: ScrapedItem,
    F: Fn(&I) -> bool + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn process_item(&self, item: I, next: Next<'_, I>) -> Result<(), PipelineError> {
        if (self.predicate)(&item) {
            next.run(item).await
        } else {
            trace!("Pipeline '{}' dropped record {:?}", self.name, item);
            Ok(())
        }
    }
}
