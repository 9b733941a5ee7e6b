//! Splitting large collections into browsable ranges.
//!
//! A window is split into at most `page_size` children. Each child spans a
//! power of the page size; children spanning a single page resolve to an
//! engine page fetch, wider ones expand again when opened.

use dbgp_proxy_core::PagedWindow;

/// One child of an expanded window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildRange {
    /// Exactly one engine page.
    Page { index: u32, start: u32, count: u32 },
    /// A sub-window that is split again when opened.
    Window(PagedWindow),
}

impl ChildRange {
    /// Index of the first child covered.
    #[must_use]
    pub fn start(&self) -> u32 {
        match self {
            Self::Page { start, .. } => *start,
            Self::Window(window) => window.start_index,
        }
    }

    /// Number of children covered.
    #[must_use]
    pub fn count(&self) -> u32 {
        match self {
            Self::Page { count, .. } => *count,
            Self::Window(window) => window.count,
        }
    }

    /// Display label, e.g. `[0..31]`.
    #[must_use]
    pub fn label(&self) -> String {
        let start = u64::from(self.start());
        let last = (start + u64::from(self.count())).saturating_sub(1);
        format!("[{start}..{last}]")
    }
}

/// Split a window into child ranges.
///
/// `start_index` must be page aligned, which `ObjectId::decode` enforces;
/// page indices are `start / page_size`.
#[must_use]
pub fn split_window(window: &PagedWindow) -> Vec<ChildRange> {
    let page_size = u64::from(window.page_size);
    if page_size == 0 || window.count == 0 {
        return Vec::new();
    }

    let start = u64::from(window.start_index);
    let end = window.end_index().min(u64::from(u32::MAX));
    let count = end.saturating_sub(start);

    // A page size of one would never shrink the span below the window.
    let fanout = page_size.max(2);
    let mut span = page_size;
    while span.saturating_mul(fanout) < count {
        span = span.saturating_mul(fanout);
    }

    let mut ranges = Vec::new();
    let mut first = start;
    while first < end {
        let len = span.min(end - first);
        let range = if span == page_size {
            ChildRange::Page {
                index: narrow(first / page_size),
                start: narrow(first),
                count: narrow(len),
            }
        } else {
            ChildRange::Window(PagedWindow {
                fullname: window.fullname.clone(),
                page_size: window.page_size,
                start_index: narrow(first),
                count: narrow(len),
            })
        };
        ranges.push(range);
        first += len;
    }
    ranges
}

fn narrow(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(index: u32, start: u32, count: u32) -> ChildRange {
        ChildRange::Page {
            index,
            start,
            count,
        }
    }

    fn window(page_size: u32, start_index: u32, count: u32) -> PagedWindow {
        PagedWindow {
            fullname: "$rows".to_string(),
            page_size,
            start_index,
            count,
        }
    }

    #[test]
    fn test_small_window_splits_into_pages() {
        let ranges = split_window(&window(32, 0, 100));
        assert_eq!(
            ranges,
            vec![
                page(0, 0, 32),
                page(1, 32, 32),
                page(2, 64, 32),
                page(3, 96, 4),
            ]
        );
        assert_eq!(ranges[3].label(), "[96..99]");
    }

    #[test]
    fn test_large_window_splits_into_sub_windows() {
        let ranges = split_window(&window(32, 0, 5000));
        assert_eq!(ranges.len(), 5);
        assert_eq!(ranges[0], ChildRange::Window(window(32, 0, 1024)));
        assert_eq!(ranges[4], ChildRange::Window(window(32, 4096, 904)));

        let nested = split_window(&window(32, 4096, 904));
        assert_eq!(nested.len(), 29);
        assert_eq!(nested[0], page(128, 4096, 32));
        assert_eq!(nested[28].label(), "[4992..4999]");
    }

    #[test]
    fn test_children_never_exceed_page_size() {
        for count in [1, 31, 32, 33, 1024, 1025, 40_000] {
            let ranges = split_window(&window(32, 0, count));
            assert!(ranges.len() <= 32, "{count}: {}", ranges.len());
            let covered: u64 = ranges.iter().map(|r| u64::from(r.count())).sum();
            assert_eq!(covered, u64::from(count));
        }
    }

    #[test]
    fn test_unit_page_size_terminates() {
        let ranges = split_window(&window(1, 0, 5));
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0], ChildRange::Window(window(1, 0, 4)));
        assert_eq!(ranges[1], ChildRange::Window(window(1, 4, 1)));
        assert_eq!(split_window(&window(1, 4, 1)), vec![page(4, 4, 1)]);
    }

    #[test]
    fn test_empty_window() {
        assert!(split_window(&window(32, 0, 0)).is_empty());
    }
}
