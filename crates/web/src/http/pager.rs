use crate::views::PagerView;

/// Offset pager for log tables. Callers fetch `query_limit()` rows
/// (one past the page) and let `trim_page` decide whether a next page
/// exists; the offset round-trips through the generated links.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct OffsetPager {
    base_uri: String,
    offset: i64,
    page_size: i64,
}

impl OffsetPager {
    pub(super) fn new(base_uri: impl Into<String>, offset: i64, page_size: i64) -> Self {
        Self {
            base_uri: base_uri.into(),
            offset: offset.max(0),
            page_size: page_size.max(1),
        }
    }

    pub(super) fn offset(&self) -> i64 {
        self.offset
    }

    pub(super) fn query_limit(&self) -> i64 {
        self.page_size + 1
    }

    pub(super) fn trim_page<T>(&self, rows: &mut Vec<T>) -> bool {
        if rows.len() as i64 > self.page_size {
            rows.truncate(self.page_size as usize);
            true
        } else {
            false
        }
    }

    pub(super) fn view(&self, has_more: bool) -> PagerView {
        let prev_uri = (self.offset > 0).then(|| self.link((self.offset - self.page_size).max(0)));
        let next_uri = has_more.then(|| self.link(self.offset + self.page_size));

        PagerView {
            offset: self.offset,
            page_size: self.page_size,
            prev_uri,
            next_uri,
        }
    }

    fn link(&self, offset: i64) -> String {
        if offset == 0 {
            self.base_uri.clone()
        } else {
            format!("{}?offset={}", self.base_uri, offset)
        }
    }
}
