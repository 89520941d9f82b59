//! Consumer-facing voucher access: cache first, source on miss.

use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::cache::{InvalidationScope, PageResult, PaginationCache, QueryWindow, ScalarCache};
use crate::document::{parse_sanitized, Document};
use crate::error::{Result, ValidationError};
use crate::models::config::{PrefetchConfig, VouchConfig};
use crate::models::voucher::SalesSummary;
use crate::prefetch::{lock, FetchedPage, PrefetchScheduler};
use crate::source::{DocumentSource, SourceRequest};
use crate::voucher::VoucherEngine;

/// Element carrying the size of the whole result set, when the source reports it.
pub const TOTAL_COUNT_NODE: &str = "TOTALCOUNT";

/// Paginated, cached access to reconstructed vouchers.
pub struct VoucherService<S: DocumentSource> {
    source: Arc<S>,
    engine: Arc<VoucherEngine>,
    pages: Arc<Mutex<PaginationCache>>,
    scalars: Mutex<ScalarCache<SalesSummary>>,
    prefetch: PrefetchScheduler,
    prefetch_config: PrefetchConfig,
}

impl<S: DocumentSource> VoucherService<S> {
    pub fn new(source: S, config: &VouchConfig) -> Self {
        let engine = VoucherEngine::with_allowed_types(config.extraction.allowed_types.iter().cloned());
        Self::with_engine(source, engine, config)
    }

    pub fn with_engine(source: S, engine: VoucherEngine, config: &VouchConfig) -> Self {
        let pages = Arc::new(Mutex::new(PaginationCache::new(
            config.cache.ttl(),
            config.cache.max_entries,
        )));
        Self {
            source: Arc::new(source),
            engine: Arc::new(engine),
            prefetch: PrefetchScheduler::new(Arc::clone(&pages)),
            pages,
            scalars: Mutex::new(ScalarCache::new(
                config.cache.scalar_ttl(),
                config.cache.scalar_max_entries,
            )),
            prefetch_config: config.prefetch.clone(),
        }
    }

    pub fn engine(&self) -> &VoucherEngine {
        &self.engine
    }

    pub fn prefetcher(&self) -> &PrefetchScheduler {
        &self.prefetch
    }

    /// Fetch one page of vouchers.
    ///
    /// Served from the cache when the page is complete and fresh; otherwise
    /// fetched from the source, reconstructed and written back. Neighbouring
    /// pages are prefetched in the background either way.
    pub async fn get_page(&self, window: &QueryWindow, page: u32) -> Result<PageResult> {
        if page == 0 {
            return Err(ValidationError::InvalidPage(page).into());
        }

        let cached = lock(&self.pages).get_page(window, page);
        if let Some(result) = cached {
            debug!("Page {} of {} served from cache", page, window.cache_key());
            self.schedule_prefetch(window, page, result.total_count);
            return Ok(result);
        }

        info!("Fetching page {} for {}", page, window.company_name());
        let fetched = fetch_page(self.source.as_ref(), &self.engine, window, page).await?;

        let vouchers = fetched.vouchers.clone();
        let total_count = fetched.store_in(&mut lock(&self.pages), window, page);
        let result = PageResult::new(window, page, vouchers, total_count);

        self.schedule_prefetch(window, page, total_count);
        Ok(result)
    }

    /// Aggregate over every cached voucher of the window.
    ///
    /// Memoized per window and fill level, so a summary is recomputed once
    /// more pages arrive.
    pub fn summary(&self, window: &QueryWindow) -> SalesSummary {
        let filled = lock(&self.pages).filled_count(window);
        let key = format!("summary|{}|{}", window.cache_key(), filled);

        let memo = lock(&self.scalars).get(&key);
        if let Some(summary) = memo {
            return summary;
        }

        let vouchers = lock(&self.pages).populated(window);
        let summary = SalesSummary::from_vouchers(&vouchers);
        lock(&self.scalars).insert(key, summary.clone());
        summary
    }

    /// Drop cached pages and aggregates for a date range and company.
    pub fn invalidate(&self, from_date: &str, to_date: &str, company_name: &str) -> usize {
        let scope = InvalidationScope::new(from_date, to_date, company_name);
        let pages = lock(&self.pages).invalidate(&scope);
        let scalars = lock(&self.scalars).invalidate_matching(&scope);
        info!(
            "Invalidated {} page windows and {} aggregates for {}",
            pages, scalars, company_name
        );
        pages + scalars
    }

    /// Drop everything cached.
    pub fn clear(&self) {
        lock(&self.pages).clear();
        lock(&self.scalars).clear();
    }

    fn schedule_prefetch(&self, window: &QueryWindow, page: u32, total_count: usize) {
        if !self.prefetch_config.enabled || self.prefetch_config.radius == 0 {
            return;
        }

        let source = Arc::clone(&self.source);
        let engine = Arc::clone(&self.engine);
        let target = window.clone();
        self.prefetch.prefetch_around(
            window,
            move |page| {
                let source = Arc::clone(&source);
                let engine = Arc::clone(&engine);
                let window = target.clone();
                async move { fetch_page(source.as_ref(), &engine, &window, page).await }
            },
            page,
            window.total_pages(total_count),
            self.prefetch_config.radius,
        );
    }
}

/// Request, sanitize, parse and reconstruct one page from the source.
pub async fn fetch_page<S: DocumentSource>(
    source: &S,
    engine: &VoucherEngine,
    window: &QueryWindow,
    page: u32,
) -> Result<FetchedPage> {
    let request = SourceRequest::new(window.clone(), page).with_voucher_types(engine.allowed_types());
    let raw = source.fetch_raw(&request).await?;

    let doc = parse_sanitized(&raw)?;
    let mut vouchers = engine.reconstruct(&doc);
    vouchers.truncate(window.page_size());

    Ok(FetchedPage {
        vouchers,
        total_count: reported_total(&doc),
    })
}

fn reported_total(doc: &Document) -> Option<usize> {
    doc.find_all(&[TOTAL_COUNT_NODE])
        .first()
        .and_then(|node| node.text.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{TransportError, VouchError};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::future::{ready, Future};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockSource {
        pages: HashMap<u32, String>,
        calls: AtomicUsize,
    }

    impl MockSource {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl DocumentSource for MockSource {
        fn fetch_raw(
            &self,
            request: &SourceRequest,
        ) -> impl Future<Output = std::result::Result<String, TransportError>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ready(
                self.pages
                    .get(&request.page)
                    .cloned()
                    .ok_or_else(|| TransportError::Unreachable("connection refused".to_string())),
            )
        }
    }

    fn voucher_xml(n: usize, voucher_type: &str) -> String {
        format!(
            "<VOUCHER REMOTEID=\"v-{n}\"><DATE>20240402</DATE><VOUCHERNUMBER>INV-{n}</VOUCHERNUMBER>\
             <VOUCHERTYPENAME>{voucher_type}</VOUCHERTYPENAME><PARTYLEDGERNAME>Acme</PARTYLEDGERNAME>\
             <AMOUNT>100</AMOUNT></VOUCHER>"
        )
    }

    fn envelope(body: &str, total: Option<usize>) -> String {
        let total = total.map(|t| format!("<TOTALCOUNT>{t}</TOTALCOUNT>")).unwrap_or_default();
        format!("<ENVELOPE>{total}<BODY><DATA>{body}</DATA></BODY></ENVELOPE>")
    }

    /// Five tax invoices split into pages of two.
    fn five_vouchers() -> MockSource {
        let mut source = MockSource::default();
        for page in 1..=3u32 {
            let start = (page as usize - 1) * 2;
            let body: String = (start..(start + 2).min(5))
                .map(|n| voucher_xml(n, "Tax Invoice"))
                .collect();
            source.pages.insert(page, envelope(&body, Some(5)));
        }
        source
    }

    fn config(prefetch: bool) -> VouchConfig {
        let mut config = VouchConfig::default();
        config.prefetch.enabled = prefetch;
        config
    }

    fn window() -> QueryWindow {
        QueryWindow::new("20240401", "20240430", "Acme", 2).unwrap()
    }

    async fn settle<S: DocumentSource>(service: &VoucherService<S>) {
        while service.prefetcher().in_flight() > 0 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let service = VoucherService::new(five_vouchers(), &config(false));
        let w = window();

        let first = service.get_page(&w, 1).await.unwrap();
        assert!(!first.from_cache);
        assert_eq!(first.total_count, 5);
        assert!(first.has_more);
        let ids: Vec<&str> = first.vouchers.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["v-0", "v-1"]);

        let second = service.get_page(&w, 1).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.vouchers, first.vouchers);
        assert_eq!(service.source.calls(), 1);
    }

    #[tokio::test]
    async fn test_last_page_is_short() {
        let service = VoucherService::new(five_vouchers(), &config(false));
        let last = service.get_page(&window(), 3).await.unwrap();
        assert_eq!(last.vouchers.len(), 1);
        assert!(!last.has_more);
    }

    #[tokio::test]
    async fn test_page_zero_is_rejected_before_fetching() {
        let service = VoucherService::new(five_vouchers(), &config(false));
        let err = service.get_page(&window(), 0).await.unwrap_err();
        assert!(matches!(err, VouchError::Validation(ValidationError::InvalidPage(0))));
        assert_eq!(service.source.calls(), 0);
    }

    #[tokio::test]
    async fn test_transport_and_parse_errors_propagate() {
        let mut source = MockSource::default();
        source.pages.insert(1, "<ENVELOPE><VOUCHER>".to_string());
        let service = VoucherService::new(source, &config(false));

        let err = service.get_page(&window(), 1).await.unwrap_err();
        assert!(matches!(err, VouchError::Parse(_)));

        let err = service.get_page(&window(), 2).await.unwrap_err();
        assert!(matches!(err, VouchError::Transport(TransportError::Unreachable(_))));
        assert!(lock(&service.pages).is_empty());
    }

    #[tokio::test]
    async fn test_prefetch_fills_neighbouring_pages() {
        let service = VoucherService::new(five_vouchers(), &config(true));
        let w = window();

        service.get_page(&w, 1).await.unwrap();
        settle(&service).await;
        assert_eq!(service.source.calls(), 3);

        let third = service.get_page(&w, 3).await.unwrap();
        assert!(third.from_cache);
        assert_eq!(third.vouchers[0].id, "v-4");
        settle(&service).await;
        assert_eq!(service.source.calls(), 3);
    }

    #[tokio::test]
    async fn test_total_estimated_without_count_element() {
        let mut source = MockSource::default();
        let full: String = (0..2).map(|n| voucher_xml(n, "Tax Invoice")).collect();
        source.pages.insert(1, envelope(&full, None));
        let service = VoucherService::new(source, &config(false));

        let page = service.get_page(&window(), 1).await.unwrap();
        assert_eq!(page.total_count, 3);
        assert!(page.has_more);
    }

    /// `pages` full pages of two vouchers each, without a reported total.
    fn unreported_pages(pages: u32) -> MockSource {
        let mut source = MockSource::default();
        for page in 1..=pages {
            let start = (page as usize - 1) * 2;
            let body: String = (start..start + 2)
                .map(|n| voucher_xml(n, "Tax Invoice"))
                .collect();
            source.pages.insert(page, envelope(&body, None));
        }
        source
    }

    #[tokio::test]
    async fn test_earlier_pages_landing_last_keep_later_pages_whole() {
        let service = VoucherService::new(unreported_pages(4), &config(true));
        let w = window();

        let first = service.get_page(&w, 2).await.unwrap();
        assert_eq!(first.vouchers.len(), 2);
        assert!(first.has_more);
        settle(&service).await;

        let again = service.get_page(&w, 2).await.unwrap();
        assert!(again.from_cache);
        let ids: Vec<&str> = again.vouchers.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["v-2", "v-3"]);
        assert!(again.has_more);
        settle(&service).await;

        let fourth = service.get_page(&w, 4).await.unwrap();
        assert!(fourth.from_cache);
        assert_eq!(fourth.vouchers.len(), 2);
        assert!(fourth.has_more);
    }

    #[tokio::test]
    async fn test_later_page_first_then_earlier_with_reported_total() {
        let service = VoucherService::new(five_vouchers(), &config(false));
        let w = window();

        let third = service.get_page(&w, 3).await.unwrap();
        assert_eq!(third.vouchers.len(), 1);
        assert!(!third.has_more);

        let first = service.get_page(&w, 1).await.unwrap();
        assert!(!first.from_cache);
        assert!(first.has_more);

        let third = service.get_page(&w, 3).await.unwrap();
        assert!(third.from_cache);
        assert_eq!(third.vouchers[0].id, "v-4");
        assert_eq!(service.source.calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_trailing_page_ends_pagination() {
        let mut source = unreported_pages(2);
        source.pages.insert(3, envelope("", None));
        let service = VoucherService::new(source, &config(false));
        let w = window();

        assert!(service.get_page(&w, 2).await.unwrap().has_more);
        let third = service.get_page(&w, 3).await.unwrap();
        assert!(third.vouchers.is_empty());
        assert!(!third.has_more);

        let second = service.get_page(&w, 2).await.unwrap();
        assert!(second.from_cache);
        assert!(!second.has_more);
        assert_eq!(second.total_count, 4);
    }

    #[tokio::test]
    async fn test_other_types_are_dropped() {
        let mut source = MockSource::default();
        let body = format!(
            "{}{}",
            voucher_xml(0, "Tax Invoice"),
            voucher_xml(1, "Delivery Note")
        );
        source.pages.insert(1, envelope(&body, Some(1)));
        let service = VoucherService::new(source, &config(false));

        let page = service.get_page(&window(), 1).await.unwrap();
        assert_eq!(page.vouchers.len(), 1);
        assert_eq!(page.vouchers[0].voucher_type, "Tax Invoice");
    }

    #[tokio::test]
    async fn test_summary_tracks_cached_pages() {
        let service = VoucherService::new(five_vouchers(), &config(false));
        let w = window();

        assert_eq!(service.summary(&w).voucher_count, 0);

        service.get_page(&w, 1).await.unwrap();
        let summary = service.summary(&w);
        assert_eq!(summary.voucher_count, 2);
        assert_eq!(summary.total_amount, Decimal::from(200));

        service.get_page(&w, 2).await.unwrap();
        assert_eq!(service.summary(&w).voucher_count, 4);
    }

    #[tokio::test]
    async fn test_invalidate_drops_pages_and_summaries() {
        let service = VoucherService::new(five_vouchers(), &config(false));
        let w = window();

        service.get_page(&w, 1).await.unwrap();
        service.summary(&w);

        assert_eq!(service.invalidate("2024-04-01", "2024-04-30", "Other"), 0);
        assert_eq!(service.invalidate("2024-04-01", "2024-04-30", "Acme"), 2);

        let again = service.get_page(&w, 1).await.unwrap();
        assert!(!again.from_cache);
        assert_eq!(service.source.calls(), 2);
    }
}
