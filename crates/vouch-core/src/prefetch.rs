//! Background population of pages around the one just read.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::{PaginationCache, QueryWindow};
use crate::error::Result;
use crate::models::voucher::Voucher;

/// Vouchers of one page plus the result-set size, when the source reported it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedPage {
    pub vouchers: Vec<Voucher>,
    pub total_count: Option<usize>,
}

impl FetchedPage {
    /// Write the page into the cache. Returns the total now recorded for the window.
    pub fn store_in(self, cache: &mut PaginationCache, window: &QueryWindow, page: u32) -> usize {
        match self.total_count {
            Some(total_count) => {
                cache.put_page(window, page, self.vouchers, total_count);
                total_count
            }
            None => cache.put_page_estimated(window, page, self.vouchers),
        }
    }
}

type InFlight = Arc<Mutex<HashSet<(String, u32)>>>;

/// Schedules best-effort fetches of neighbouring pages.
///
/// Concurrent requests for the same window and page are deduplicated through
/// an in-flight registry; each task removes its own entry when it finishes,
/// whether it succeeded or not.
#[derive(Debug, Clone)]
pub struct PrefetchScheduler {
    cache: Arc<Mutex<PaginationCache>>,
    in_flight: InFlight,
}

impl PrefetchScheduler {
    pub fn new(cache: Arc<Mutex<PaginationCache>>) -> Self {
        Self {
            cache,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Number of prefetches currently running.
    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }

    pub fn is_in_flight(&self, window: &QueryWindow, page: u32) -> bool {
        lock(&self.in_flight).contains(&(window.cache_key(), page))
    }

    /// Pages within `radius` of `current_page`, nearest first, clamped to
    /// `1..=total_pages` and excluding the current page.
    pub fn candidate_pages(current_page: u32, total_pages: u32, radius: u32) -> Vec<u32> {
        let mut pages = Vec::new();
        for distance in 1..=radius {
            if let Some(next) = current_page.checked_add(distance) {
                if next <= total_pages {
                    pages.push(next);
                }
            }
            if let Some(prev) = current_page.checked_sub(distance) {
                if prev >= 1 && prev <= total_pages {
                    pages.push(prev);
                }
            }
        }
        pages
    }

    /// Spawn fetches for uncached pages around `current_page`.
    ///
    /// `fetch` is called synchronously for each scheduled page; the futures it
    /// returns run as independent tasks. Failures are logged and dropped.
    /// Returns the handles of the spawned tasks.
    pub fn prefetch_around<F, Fut>(
        &self,
        window: &QueryWindow,
        fetch: F,
        current_page: u32,
        total_pages: u32,
        radius: u32,
    ) -> Vec<JoinHandle<()>>
    where
        F: Fn(u32) -> Fut,
        Fut: Future<Output = Result<FetchedPage>> + Send + 'static,
    {
        let Ok(runtime) = Handle::try_current() else {
            debug!("No async runtime; skipping prefetch");
            return Vec::new();
        };

        let key = window.cache_key();
        let mut handles = Vec::new();

        for page in Self::candidate_pages(current_page, total_pages, radius) {
            if lock(&self.cache).is_range_cached(window, page, page) {
                continue;
            }
            if !lock(&self.in_flight).insert((key.clone(), page)) {
                debug!("Prefetch of page {} already running", page);
                continue;
            }

            let guard = InFlightGuard {
                registry: Arc::clone(&self.in_flight),
                entry: (key.clone(), page),
            };
            let cache = Arc::clone(&self.cache);
            let window = window.clone();
            let task = fetch(page);

            handles.push(runtime.spawn(async move {
                let _guard = guard;
                match task.await {
                    Ok(fetched) => {
                        debug!("Prefetched page {} ({} vouchers)", page, fetched.vouchers.len());
                        fetched.store_in(&mut lock(&cache), &window, page);
                    }
                    Err(e) => warn!("Prefetch of page {} failed: {}", page, e),
                }
            }));
        }

        handles
    }
}

/// Removes an in-flight entry when its task ends.
struct InFlightGuard {
    registry: InFlight,
    entry: (String, u32),
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.registry).remove(&self.entry);
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{TransportError, VouchError};
    use pretty_assertions::assert_eq;
    use std::future::ready;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn setup() -> (PrefetchScheduler, Arc<Mutex<PaginationCache>>, QueryWindow) {
        let cache = Arc::new(Mutex::new(PaginationCache::new(Duration::from_secs(60), 10)));
        let window = QueryWindow::new("20240401", "20240430", "Acme", 2).unwrap();
        (PrefetchScheduler::new(Arc::clone(&cache)), cache, window)
    }

    fn page_of(page: u32) -> Result<FetchedPage> {
        let start = (page as usize - 1) * 2;
        Ok(FetchedPage {
            vouchers: (start..start + 2)
                .map(|i| Voucher {
                    id: format!("v-{i}"),
                    ..Voucher::default()
                })
                .collect(),
            total_count: Some(20),
        })
    }

    #[test]
    fn test_candidate_pages() {
        assert_eq!(PrefetchScheduler::candidate_pages(5, 10, 2), vec![6, 4, 7, 3]);
        assert_eq!(PrefetchScheduler::candidate_pages(1, 10, 2), vec![2, 3]);
        assert_eq!(PrefetchScheduler::candidate_pages(10, 10, 2), vec![9, 8]);
        assert_eq!(PrefetchScheduler::candidate_pages(1, 1, 3), Vec::<u32>::new());
        assert_eq!(PrefetchScheduler::candidate_pages(3, 10, 0), Vec::<u32>::new());
    }

    #[test]
    fn test_without_runtime_nothing_is_scheduled() {
        let (scheduler, _, window) = setup();
        let handles = scheduler.prefetch_around(&window, |p| ready(page_of(p)), 1, 5, 2);
        assert!(handles.is_empty());
        assert_eq!(scheduler.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_prefetch_fills_neighbours() {
        let (scheduler, cache, window) = setup();

        let handles = scheduler.prefetch_around(&window, |p| ready(page_of(p)), 3, 10, 2);
        assert_eq!(handles.len(), 4);
        assert!(scheduler.is_in_flight(&window, 5));

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(scheduler.in_flight(), 0);
        let cache = lock(&cache);
        assert!(cache.is_range_cached(&window, 1, 2));
        assert!(cache.is_range_cached(&window, 4, 5));
        assert!(!cache.is_range_cached(&window, 3, 3));
        assert!(!cache.is_range_cached(&window, 6, 6));
    }

    #[tokio::test]
    async fn test_in_flight_pages_are_deduplicated() {
        let (scheduler, _, window) = setup();
        let calls = AtomicUsize::new(0);
        let fetch = |p: u32| {
            calls.fetch_add(1, Ordering::SeqCst);
            ready(page_of(p))
        };

        let first = scheduler.prefetch_around(&window, &fetch, 2, 10, 1);
        let second = scheduler.prefetch_around(&window, &fetch, 2, 10, 1);
        assert_eq!(first.len(), 2);
        assert!(second.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        for handle in first {
            handle.await.unwrap();
        }
        assert_eq!(scheduler.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_cached_pages_are_skipped() {
        let (scheduler, cache, window) = setup();
        page_of(2).unwrap().store_in(&mut lock(&cache), &window, 2);

        let handles = scheduler.prefetch_around(&window, |p| ready(page_of(p)), 1, 10, 2);
        assert_eq!(handles.len(), 1);
        assert!(scheduler.is_in_flight(&window, 3));
    }

    #[tokio::test]
    async fn test_failures_are_swallowed_and_registry_cleared() {
        let (scheduler, cache, window) = setup();

        let handles = scheduler.prefetch_around(
            &window,
            |_| {
                ready(Err::<FetchedPage, _>(VouchError::Transport(
                    TransportError::Unreachable("refused".to_string()),
                )))
            },
            1,
            10,
            2,
        );

        for handle in handles {
            assert!(handle.await.is_ok());
        }
        assert_eq!(scheduler.in_flight(), 0);
        assert!(lock(&cache).is_empty());
    }
}
