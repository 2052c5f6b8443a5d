use serde::{Deserialize, Serialize};

use crate::constants::{MAX_COUNT_PER_PAGE, MAX_PAGE_NUMBER, PAGE_LIST_RADIUS};

/// 1-based page number and page size as requested through `page` / `limit`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Page {
    pub number: i64,
    pub size: i64,
}

impl Page {
    pub fn new(number: Option<i64>, size: Option<i64>, default_size: i64) -> Self {
        Self {
            number: number.unwrap_or(1).clamp(1, MAX_PAGE_NUMBER),
            size: size.unwrap_or(default_size).clamp(1, MAX_COUNT_PER_PAGE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.number - 1).saturating_mul(self.size)
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PageContext<T> {
    pub rows: Vec<T>,
    pub total_rows: i64,
    pub page: i64,
    pub page_count: i64,
    pub next_page: Option<i64>,
    pub prev_page: Option<i64>,
    pub page_list: Vec<(String, i64)>,
    pub message: Option<String>,
}

impl<T> PageContext<T> {
    pub fn from_rows(rows: Vec<T>, total_rows: i64, page: Page) -> Self {
        if rows.is_empty() {
            return Self::no_rows(total_rows, page);
        }
        let page_count = (total_rows + page.size - 1) / page.size;

        let next_page = (page.number < page_count).then(|| page.number + 1);
        let prev_page = (page.number > 1).then(|| (page.number - 1).min(page_count));

        let first_listed = (page.number - PAGE_LIST_RADIUS).max(1);
        let last_listed = (page.number + PAGE_LIST_RADIUS).min(page_count);
        let page_list = (first_listed..=last_listed)
            .map(|n| {
                let label = if n == page.number {
                    String::from("...")
                } else {
                    format!("{n}")
                };
                (label, n)
            })
            .collect();

        let first = page.offset().saturating_add(1);
        let last = page.offset().saturating_add(rows.len() as i64).min(total_rows);

        Self {
            rows,
            total_rows,
            page: page.number,
            page_count,
            next_page,
            prev_page,
            page_list,
            message: Some(format!("{first} - {last} / {total_rows}")),
        }
    }

    /// An empty page. `total_rows` may be non-zero when the page is past the end.
    pub fn no_rows(total_rows: i64, page: Page) -> Self {
        let page_count = (total_rows + page.size - 1) / page.size;
        Self {
            rows: vec![],
            total_rows,
            page: page.number,
            page_count,
            next_page: None,
            prev_page: (page_count > 0).then_some(page_count),
            page_list: vec![(String::from("1"), 1)],
            message: Some(String::from("No results")),
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> PageContext<U> {
        PageContext {
            rows: self.rows.into_iter().map(f).collect(),
            total_rows: self.total_rows,
            page: self.page,
            page_count: self.page_count,
            next_page: self.next_page,
            prev_page: self.prev_page,
            page_list: self.page_list,
            message: self.message,
        }
    }
}
