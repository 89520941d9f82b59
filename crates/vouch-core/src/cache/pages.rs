//! Slot-based page cache for large, append-only voucher result sets.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::window::QueryWindow;
use super::InvalidationScope;
use crate::models::voucher::Voucher;

/// One position in a cached result set.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// Not fetched yet.
    Empty,
    Filled(Voucher),
}

impl Slot {
    pub fn is_filled(&self) -> bool {
        matches!(self, Slot::Filled(_))
    }
}

/// Cached slots of one query window.
#[derive(Debug, Clone)]
pub struct CachedPage {
    slots: Vec<Slot>,
    total_count: usize,
    last_updated: Instant,
    write_seq: u64,
}

impl CachedPage {
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn last_updated(&self) -> Instant {
        self.last_updated
    }

    fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.last_updated) <= ttl
    }

    /// End of the slots that must be filled to serve `start..end`.
    ///
    /// The range is cut at `total_count`, but never in front of a filled slot.
    fn required_end(&self, start: usize, end: usize) -> usize {
        let filled_end = self
            .slots
            .get(start..end.min(self.slots.len()))
            .and_then(|slots| slots.iter().rposition(Slot::is_filled))
            .map_or(start, |last| start + last + 1);
        end.min(self.total_count).max(filled_end)
    }

    /// Whether every required slot in `start..end` is filled.
    fn covers(&self, start: usize, end: usize) -> bool {
        let end = self.required_end(start, end);
        if start >= end {
            return true;
        }
        self.slots
            .get(start..end)
            .is_some_and(|slots| slots.iter().all(Slot::is_filled))
    }
}

/// A page of vouchers as returned to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-based page number.
    pub page: u32,
    pub vouchers: Vec<Voucher>,
    /// Last known size of the whole result set.
    pub total_count: usize,
    /// `page * page_size < total_count`.
    pub has_more: bool,
    /// Served without contacting the source.
    pub from_cache: bool,
}

impl PageResult {
    pub fn new(window: &QueryWindow, page: u32, vouchers: Vec<Voucher>, total_count: usize) -> Self {
        let has_more = (page as usize).saturating_mul(window.page_size()) < total_count;
        Self {
            page,
            vouchers,
            total_count,
            has_more,
            from_cache: false,
        }
    }
}

/// Page cache keyed by [`QueryWindow`].
///
/// Writes for a window land at `(page - 1) * page_size`; writing a later page
/// first leaves [`Slot::Empty`] sentinels in front of it. `total_count` and
/// the freshness timestamp are overwritten by every write.
#[derive(Debug)]
pub struct PaginationCache {
    entries: HashMap<QueryWindow, CachedPage>,
    ttl: Duration,
    max_entries: usize,
    write_seq: u64,
}

impl PaginationCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
            write_seq: 0,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Serve a page if every slot in its range is filled and fresh.
    pub fn get_page(&self, window: &QueryWindow, page: u32) -> Option<PageResult> {
        self.get_page_at(window, page, Instant::now())
    }

    fn get_page_at(&self, window: &QueryWindow, page: u32, now: Instant) -> Option<PageResult> {
        let entry = self.entries.get(window)?;
        if !entry.is_fresh(now, self.ttl) {
            debug!("Cache entry for {} is stale", window.cache_key());
            return None;
        }

        let range = window.page_range(page);
        if !entry.covers(range.start, range.end) {
            return None;
        }

        let end = entry.required_end(range.start, range.end).min(entry.slots.len());
        let vouchers = entry
            .slots
            .get(range.start..end)
            .unwrap_or_default()
            .iter()
            .filter_map(|slot| match slot {
                Slot::Filled(v) => Some(v.clone()),
                Slot::Empty => None,
            })
            .collect();

        let mut result = PageResult::new(window, page, vouchers, entry.total_count);
        result.from_cache = true;
        Some(result)
    }

    /// Write a page, growing the slot array as needed. Last write wins.
    pub fn put_page(&mut self, window: &QueryWindow, page: u32, vouchers: Vec<Voucher>, total_count: usize) {
        self.put_page_at(window, page, vouchers, total_count, Instant::now());
    }

    /// Write a page whose response did not report the result-set size.
    ///
    /// A short page ends the result set there and drops any slots after it.
    /// A full page implies at least one more voucher and never lowers the
    /// total already recorded. Returns the total now recorded.
    pub fn put_page_estimated(&mut self, window: &QueryWindow, page: u32, vouchers: Vec<Voucher>) -> usize {
        self.put_page_estimated_at(window, page, vouchers, Instant::now())
    }

    fn put_page_estimated_at(
        &mut self,
        window: &QueryWindow,
        page: u32,
        vouchers: Vec<Voucher>,
        now: Instant,
    ) -> usize {
        let end = window.page_range(page).start + vouchers.len().min(window.page_size());
        let short = vouchers.len() < window.page_size();

        let total_count = if short {
            end
        } else {
            let previous = self
                .entries
                .get(window)
                .filter(|entry| entry.is_fresh(now, self.ttl))
                .map_or(0, |entry| entry.total_count);
            previous.max(end + 1)
        };

        self.put_page_at(window, page, vouchers, total_count, now);
        if short {
            if let Some(entry) = self.entries.get_mut(window) {
                entry.slots.truncate(end);
            }
        }
        total_count
    }

    fn put_page_at(
        &mut self,
        window: &QueryWindow,
        page: u32,
        vouchers: Vec<Voucher>,
        total_count: usize,
        now: Instant,
    ) {
        self.write_seq += 1;
        let write_seq = self.write_seq;

        let range = window.page_range(page);
        let written = vouchers.len().min(window.page_size());
        let ttl = self.ttl;

        let entry = self.entries.entry(window.clone()).or_insert_with(|| CachedPage {
            slots: Vec::new(),
            total_count: 0,
            last_updated: now,
            write_seq,
        });
        // Slots of an expired entry must not become fresh again with this write.
        if !entry.is_fresh(now, ttl) {
            entry.slots.clear();
        }

        let needed = range.start + written;
        if entry.slots.len() < needed {
            entry.slots.resize(needed, Slot::Empty);
        }
        for (offset, voucher) in vouchers.into_iter().take(written).enumerate() {
            entry.slots[range.start + offset] = Slot::Filled(voucher);
        }
        // Clear what an earlier, longer write left in this page's range.
        let stale_end = range.end.min(entry.slots.len());
        for slot in entry.slots.iter_mut().take(stale_end).skip(needed) {
            *slot = Slot::Empty;
        }

        entry.total_count = total_count;
        entry.last_updated = now;
        entry.write_seq = write_seq;

        debug!(
            "Cached page {} of {} ({} vouchers, total {})",
            page,
            window.cache_key(),
            written,
            total_count
        );

        self.evict_overflow();
    }

    /// Whether pages `start_page..=end_page` are all filled and fresh.
    pub fn is_range_cached(&self, window: &QueryWindow, start_page: u32, end_page: u32) -> bool {
        self.is_range_cached_at(window, start_page, end_page, Instant::now())
    }

    fn is_range_cached_at(&self, window: &QueryWindow, start_page: u32, end_page: u32, now: Instant) -> bool {
        let Some(entry) = self.entries.get(window) else {
            return false;
        };
        if !entry.is_fresh(now, self.ttl) {
            return false;
        }

        let start = window.page_range(start_page).start;
        let end = window.page_range(end_page.max(start_page)).end;
        entry.covers(start, end)
    }

    /// Cached entry for a window, fresh or not.
    pub fn entry(&self, window: &QueryWindow) -> Option<&CachedPage> {
        self.entries.get(window)
    }

    /// Number of filled slots of a fresh window.
    pub fn filled_count(&self, window: &QueryWindow) -> usize {
        self.entries
            .get(window)
            .filter(|entry| entry.is_fresh(Instant::now(), self.ttl))
            .map_or(0, |entry| entry.slots.iter().filter(|s| s.is_filled()).count())
    }

    /// Every filled slot of a fresh window, in slot order.
    pub fn populated(&self, window: &QueryWindow) -> Vec<Voucher> {
        self.entries
            .get(window)
            .filter(|entry| entry.is_fresh(Instant::now(), self.ttl))
            .map(|entry| {
                entry
                    .slots
                    .iter()
                    .filter_map(|slot| match slot {
                        Slot::Filled(v) => Some(v.clone()),
                        Slot::Empty => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Remove every window whose key matches the scope. Returns the count removed.
    pub fn invalidate(&mut self, scope: &InvalidationScope) -> usize {
        let before = self.entries.len();
        self.entries.retain(|window, _| !scope.matches(&window.cache_key()));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_overflow(&mut self) {
        while self.entries.len() > self.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.write_seq)
                .map(|(window, _)| window.clone());

            match oldest {
                Some(window) => {
                    debug!("Evicting {}", window.cache_key());
                    self.entries.remove(&window);
                }
                None => break,
            }
        }
    }
}
