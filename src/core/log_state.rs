use super::FilterState;
use crate::record::LogRecord;

/// Append-only record store with an incrementally maintained filtered view.
///
/// `filtered_indices` holds buffer positions of matching records, in
/// buffer order, and is always consistent with `filter`.
#[derive(Clone, Debug, Default)]
pub struct LogBuffer {
    records: Vec<LogRecord>,
    filtered_indices: Vec<usize>,
    filter: FilterState,
}

impl LogBuffer {
    pub fn new(filter: FilterState) -> Self {
        Self {
            records: Vec::new(),
            filtered_indices: Vec::new(),
            filter,
        }
    }

    /// Append records in arrival order. Returns how many joined the filtered view.
    pub fn append(&mut self, records: impl IntoIterator<Item = LogRecord>) -> usize {
        let before = self.filtered_indices.len();
        for record in records {
            let idx = self.records.len();
            if self.filter.matches(&record) {
                self.filtered_indices.push(idx);
            }
            self.records.push(record);
        }
        self.filtered_indices.len() - before
    }

    /// Replace the filter and rebuild the filtered view from scratch.
    pub fn set_filter(&mut self, filter: FilterState) {
        self.filter = filter;
        self.filtered_indices.clear();
        for (i, record) in self.records.iter().enumerate() {
            if self.filter.matches(record) {
                self.filtered_indices.push(i);
            }
        }
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    /// Number of records in the filtered view.
    pub fn count(&self) -> usize {
        self.filtered_indices.len()
    }

    /// Number of records received, filtered or not.
    pub fn total(&self) -> usize {
        self.records.len()
    }

    /// Filtered records in `[start, end)`, clamped to the view.
    pub fn slice(&self, start: usize, end: usize) -> impl Iterator<Item = &LogRecord> + '_ {
        let end = end.min(self.filtered_indices.len());
        let start = start.min(end);
        self.filtered_indices[start..end]
            .iter()
            .map(move |&idx| &self.records[idx])
    }

    pub fn get(&self, filtered_idx: usize) -> Option<&LogRecord> {
        self.filtered_indices
            .get(filtered_idx)
            .map(|&idx| &self.records[idx])
    }

    /// Position in the filtered view of the record with line number `sequence`.
    pub fn position_of(&self, sequence: u64) -> Option<usize> {
        self.filtered_indices
            .iter()
            .position(|&idx| self.records[idx].sequence == sequence)
    }

    /// Like [`position_of`](Self::position_of), but only looks at filtered
    /// positions from `from` on.
    pub fn position_from(&self, sequence: u64, from: usize) -> Option<usize> {
        let from = from.min(self.filtered_indices.len());
        self.filtered_indices[from..]
            .iter()
            .position(|&idx| self.records[idx].sequence == sequence)
            .map(|pos| from + pos)
    }
}
