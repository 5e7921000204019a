use crate::model::{display_cmp, Reading};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const PAGE_SIZE: usize = 10;

/// Field the table search runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
    #[default]
    Id,
    PumpStatus,
    WaterAlert,
}

impl SearchField {
    fn value<'a>(&self, reading: &'a Reading) -> &'a str {
        match self {
            SearchField::Id => reading.id(),
            SearchField::PumpStatus => &reading.reading().pump_status,
            SearchField::WaterAlert => &reading.reading().water_alert,
        }
    }
}

/// Orders rows for display and keeps those whose selected field contains
/// `term`, ignoring case. An empty term keeps every row.
pub fn filter_rows(readings: &[Reading], term: &str, field: SearchField) -> Vec<Reading> {
    let needle = term.to_lowercase();
    let mut rows: Vec<Reading> = readings
        .iter()
        .filter(|r| needle.is_empty() || field.value(r).to_lowercase().contains(&needle))
        .cloned()
        .collect();
    rows.sort_by(display_cmp);
    rows
}

#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub rows: Vec<Reading>,
    pub page: usize,
    pub total_pages: usize,
    pub total: usize,
    /// 1-based index of the first row shown, 0 when empty.
    pub first: usize,
    pub last: usize,
}

/// Table state: search term, field, page, and the rows they select.
///
/// Any change of term, field or data goes back to page 1.
#[derive(Debug, Clone)]
pub struct TableView {
    data: Arc<[Reading]>,
    term: String,
    field: SearchField,
    page: usize,
    rows: Vec<Reading>,
}

impl TableView {
    pub fn new(data: Arc<[Reading]>) -> Self {
        let mut view = Self {
            data,
            term: String::new(),
            field: SearchField::default(),
            page: 1,
            rows: Vec::new(),
        };
        view.refilter();
        view
    }

    pub fn with_filter(data: Arc<[Reading]>, term: &str, field: SearchField) -> Self {
        let mut view = Self::new(data);
        view.term = term.to_string();
        view.field = field;
        view.refilter();
        view
    }

    pub fn set_term(&mut self, term: &str) {
        self.term = term.to_string();
        self.refilter();
    }

    pub fn set_field(&mut self, field: SearchField) {
        self.field = field;
        self.refilter();
    }

    pub fn set_data(&mut self, data: Arc<[Reading]>) {
        self.data = data;
        self.refilter();
    }

    fn refilter(&mut self) {
        self.rows = filter_rows(&self.data, &self.term, self.field);
        self.page = 1;
    }

    pub fn total_pages(&self) -> usize {
        self.rows.len().div_ceil(PAGE_SIZE)
    }

    pub fn page(&self) -> usize {
        self.page
    }

    /// Moves to `page`, clamped into the available pages.
    pub fn go_to(&mut self, page: usize) {
        self.page = page.clamp(1, self.total_pages().max(1));
    }

    pub fn next_page(&mut self) {
        self.go_to(self.page + 1);
    }

    pub fn previous_page(&mut self) {
        self.go_to(self.page.saturating_sub(1));
    }

    /// Every row matching the filter, across all pages.
    pub fn filtered(&self) -> &[Reading] {
        &self.rows
    }

    pub fn current_page(&self) -> Page {
        let start = (self.page - 1) * PAGE_SIZE;
        let rows: Vec<Reading> = self.rows.iter().skip(start).take(PAGE_SIZE).cloned().collect();
        let (first, last) = if rows.is_empty() {
            (0, 0)
        } else {
            (start + 1, start + rows.len())
        };

        Page {
            rows,
            page: self.page,
            total_pages: self.total_pages(),
            total: self.rows.len(),
            first,
            last,
        }
    }
}
