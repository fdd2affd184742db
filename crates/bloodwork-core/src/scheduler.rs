use std::collections::BTreeMap;

use futures::StreamExt;
use futures::stream;

use crate::models::{ExtractionOutput, PageText};
use crate::processor::PageProcessor;
use crate::traits::PageExtractor;

/// Fans pages out across a bounded set of concurrent workers and reassembles
/// the results in page order.
///
/// Results are collected by a single owner loop as each page finishes, so
/// the results map and progress counter have no shared writers.
#[derive(Clone)]
pub struct ExtractionScheduler<E: PageExtractor> {
    processor: PageProcessor<E>,
    workers: usize,
}

impl<E: PageExtractor> ExtractionScheduler<E> {
    /// `workers` is normally the size of the key pool: every call needs a
    /// lease anyway, so more in-flight pages than keys only queue on the pool.
    pub fn new(processor: PageProcessor<E>, workers: usize) -> Self {
        Self {
            processor,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Process every page and return the successful documents in ascending
    /// page order, together with the pages that failed permanently.
    ///
    /// `on_progress(completed, total)` is called once per finished page,
    /// whether it succeeded or not.
    pub async fn run<F>(&self, pages: Vec<PageText>, on_progress: F) -> ExtractionOutput
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        let total = pages.len();
        if total == 0 {
            tracing::warn!("No pages to process");
            return ExtractionOutput::default();
        }

        tracing::info!(total, workers = self.workers, "Starting page extraction");

        let mut in_flight = stream::iter(pages)
            .map(|page| {
                let processor = self.processor.clone();
                async move {
                    let result = processor.process(&page).await;
                    (page.page_number, result)
                }
            })
            .buffer_unordered(self.workers);

        let mut results: BTreeMap<usize, Option<serde_json::Value>> = BTreeMap::new();
        while let Some((page_number, result)) = in_flight.next().await {
            results.insert(page_number, result);
            on_progress(results.len(), total);
            tracing::debug!(page = page_number, completed = results.len(), total, "Page finished");
        }

        let mut output = ExtractionOutput {
            total_pages: total,
            ..Default::default()
        };
        for (page_number, result) in results {
            match result {
                Some(value) => output.documents.push(value),
                None => output.failed_pages.push(page_number),
            }
        }

        if output.is_partial() {
            tracing::warn!(
                failed = ?output.failed_pages,
                extracted = output.documents.len(),
                total,
                "Some pages could not be extracted"
            );
        } else {
            tracing::info!(total, "All pages extracted");
        }

        output
    }
}
