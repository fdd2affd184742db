use std::time::Duration;

use crate::models::PageText;
use crate::traits::PageExtractor;

/// Per-page retry policy: a fixed number of total attempts with a fixed
/// pause between them.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Wraps a [`PageExtractor`] with bounded retry.
///
/// Call failures and unparseable responses count the same: each is one
/// failed attempt.
#[derive(Clone)]
pub struct PageProcessor<E: PageExtractor> {
    extractor: E,
    retry: RetryConfig,
}

impl<E: PageExtractor> PageProcessor<E> {
    pub fn new(extractor: E, retry: RetryConfig) -> Self {
        Self { extractor, retry }
    }

    /// Extract `page`, retrying until an attempt succeeds or the attempts
    /// run out. `None` means the page failed permanently.
    pub async fn process(&self, page: &PageText) -> Option<serde_json::Value> {
        let max_attempts = self.retry.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.extractor.extract_page(page).await {
                Ok(value) => return Some(value),
                Err(e) if attempt < max_attempts => {
                    tracing::warn!(
                        page = page.page_number,
                        attempt,
                        max_attempts,
                        transient = e.is_transient(),
                        error = %e,
                        "Page extraction failed, retrying"
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(e) => {
                    tracing::error!(
                        page = page.page_number,
                        attempts = max_attempts,
                        error = %e,
                        "Page extraction failed permanently"
                    );
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::extractor::{ExtractionSettings, StructuredExtractor};
    use crate::keys::{KeyManager, KeyQuota};
    use crate::testutil::{MockCompletionClient, MockPageExtractor};

    fn page(n: usize) -> PageText {
        PageText::new(n, "WBC 7.2")
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_page_is_attempted_three_times() {
        let extractor = MockPageExtractor::new().failing_page(1);
        let processor = PageProcessor::new(extractor.clone(), RetryConfig::default());

        assert!(processor.process(&page(1)).await.is_none());
        assert_eq!(extractor.attempts_for(1), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn third_attempt_result_is_kept() {
        let extractor = MockPageExtractor::new().with_script(
            1,
            vec![
                Err(AppError::Timeout(120)),
                Err(AppError::MalformedResponse("no braces".into())),
                Ok(serde_json::json!({"attempt": 3})),
            ],
        );
        let processor = PageProcessor::new(extractor.clone(), RetryConfig::default());

        let value = processor.process(&page(1)).await.unwrap();
        assert_eq!(value, serde_json::json!({"attempt": 3}));
        assert_eq!(extractor.attempts_for(1), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn success_does_not_retry() {
        let extractor = MockPageExtractor::new();
        let processor = PageProcessor::new(extractor.clone(), RetryConfig::default());

        assert!(processor.process(&page(4)).await.is_some());
        assert_eq!(extractor.attempts_for(4), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_between_attempts() {
        let extractor = MockPageExtractor::new().failing_page(1);
        let processor = PageProcessor::new(extractor, RetryConfig::default());

        let start = tokio::time::Instant::now();
        processor.process(&page(1)).await;
        // Two pauses: after the first and second failures, not after the last.
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_tries_once() {
        let extractor = MockPageExtractor::new();
        let processor = PageProcessor::new(
            extractor.clone(),
            RetryConfig {
                max_attempts: 0,
                delay: Duration::ZERO,
            },
        );

        assert!(processor.process(&page(1)).await.is_some());
        assert_eq!(extractor.attempts_for(1), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_object_reply_exhausts_attempts() {
        let client = MockCompletionClient::new("Sure: {}");
        let keys = KeyManager::new(vec!["key-0".into()], KeyQuota::default()).unwrap();
        let extractor = StructuredExtractor::new(client.clone(), keys, ExtractionSettings::default());
        let processor = PageProcessor::new(extractor, RetryConfig::default());

        assert!(processor.process(&page(1)).await.is_none());
        assert_eq!(client.call_count(), 3);
    }
}
