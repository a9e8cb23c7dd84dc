//! Row-count based progress accounting.

/// Highest percentage reported while rows are still being read. 100 is
/// reserved for "every row scanned".
pub const MAX_RUNNING_PERCENT: u8 = 99;

/// Turns rows scanned into percent ticks, at most one tick per batch.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total_rows: Option<u64>,
    batch_rows: u64,
    rows_scanned: u64,
    rows_since_tick: u64,
    committed: u8,
}

impl ProgressTracker {
    pub fn new(total_rows: Option<u64>, batch_rows: u64) -> Self {
        Self {
            total_rows: total_rows.filter(|t| *t > 0),
            batch_rows: batch_rows.max(1),
            rows_scanned: 0,
            rows_since_tick: 0,
            committed: 0,
        }
    }

    pub fn rows_scanned(&self) -> u64 {
        self.rows_scanned
    }

    pub fn committed(&self) -> u8 {
        self.committed
    }

    /// Percent implied by the rows scanned so far, capped below 100.
    pub fn current_percent(&self) -> u8 {
        match self.total_rows {
            Some(total) => {
                let pct = self.rows_scanned.saturating_mul(100) / total;
                pct.min(MAX_RUNNING_PERCENT as u64) as u8
            }
            None => 0,
        }
    }

    /// Count one row. Returns a new percentage when a batch boundary was
    /// crossed and the percentage moved forward.
    pub fn record_row(&mut self) -> Option<u8> {
        self.rows_scanned = self.rows_scanned.saturating_add(1);
        self.rows_since_tick += 1;
        if self.rows_since_tick < self.batch_rows {
            return None;
        }
        self.rows_since_tick = 0;
        let pct = self.current_percent();
        (pct > self.committed).then_some(pct)
    }

    /// Record that `percent` was committed to the store.
    pub fn mark_committed(&mut self, percent: u8) {
        self.committed = self.committed.max(percent);
    }
}
