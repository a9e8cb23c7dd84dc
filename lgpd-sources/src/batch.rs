//! Table-by-table batched row streaming shared by every reader.

use std::collections::VecDeque;

use lgpd_core::errors::SourceError;
use lgpd_core::models::Cell;
use lgpd_core::traits::SourceHandle;
use lgpd_core::Row;

/// Where the next page of a table begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cursor {
    /// First page; no key or offset predicate.
    Start,
    /// Keyset paging: rows whose key is strictly greater.
    After(i64),
    /// Offset into a total ordering of the table.
    Offset(u64),
}

impl Cursor {
    /// Row offset for offset-paged drivers. `Start` is offset 0.
    pub fn offset(self) -> u64 {
        match self {
            Cursor::Offset(n) => n,
            Cursor::Start | Cursor::After(_) => 0,
        }
    }
}

/// One page of text-cast cells plus the cursor to resume after it.
pub(crate) struct Page {
    pub rows: Vec<Vec<Option<String>>>,
    pub next: Cursor,
}

/// Driver-specific primitives behind [`BatchedHandle`].
pub(crate) trait BatchFetch: Send {
    fn tables(&mut self) -> Result<Vec<String>, SourceError>;

    fn columns(&mut self, table: &str) -> Result<Vec<String>, SourceError>;

    /// Up to `limit` rows of `table` after `cursor`.
    fn fetch(
        &mut self,
        table: &str,
        columns: &[String],
        cursor: Cursor,
        limit: usize,
    ) -> Result<Page, SourceError>;

    /// Cheap total row estimate. `None` when the driver cannot tell.
    fn estimate_rows(&mut self) -> Option<u64>;

    fn close(&mut self) -> Result<(), SourceError>;
}

struct TableCursor {
    table: String,
    columns: Vec<String>,
    cursor: Cursor,
    next_index: u64,
    done: bool,
}

/// A [`SourceHandle`] that walks tables in order, one page at a time.
pub(crate) struct BatchedHandle<F: BatchFetch> {
    fetcher: Option<F>,
    tables: VecDeque<String>,
    current: Option<TableCursor>,
    buffer: VecDeque<Row>,
    batch_size: usize,
    size_hint: Option<u64>,
}

impl<F: BatchFetch> BatchedHandle<F> {
    pub fn new(mut fetcher: F, batch_size: usize) -> Result<Self, SourceError> {
        let tables = fetcher.tables()?;
        let size_hint = fetcher.estimate_rows();
        tracing::debug!(tables = tables.len(), size_hint = ?size_hint, "source handle opened");
        Ok(Self {
            fetcher: Some(fetcher),
            tables: tables.into(),
            current: None,
            buffer: VecDeque::new(),
            batch_size: batch_size.max(1),
            size_hint,
        })
    }
}

impl<F: BatchFetch> SourceHandle for BatchedHandle<F> {
    fn next_row(&mut self) -> Result<Option<Row>, SourceError> {
        loop {
            if let Some(row) = self.buffer.pop_front() {
                return Ok(Some(row));
            }
            let Some(fetcher) = self.fetcher.as_mut() else {
                return Ok(None);
            };

            let Some(cursor) = self.current.as_mut() else {
                match self.tables.pop_front() {
                    Some(table) => {
                        let columns = fetcher.columns(&table)?;
                        if !columns.is_empty() {
                            self.current = Some(TableCursor {
                                table,
                                columns,
                                cursor: Cursor::Start,
                                next_index: 0,
                                done: false,
                            });
                        }
                        continue;
                    }
                    None => return Ok(None),
                }
            };

            if cursor.done {
                self.current = None;
                continue;
            }

            let page = fetcher.fetch(&cursor.table, &cursor.columns, cursor.cursor, self.batch_size)?;
            cursor.done = page.rows.len() < self.batch_size;
            cursor.cursor = page.next;
            for values in page.rows {
                let mut row = Row::new(cursor.table.clone(), cursor.next_index);
                row.cells = cursor
                    .columns
                    .iter()
                    .zip(values)
                    .map(|(column, value)| Cell {
                        column: column.clone(),
                        value,
                    })
                    .collect();
                cursor.next_index += 1;
                self.buffer.push_back(row);
            }
        }
    }

    fn size_hint(&self) -> Option<u64> {
        self.size_hint
    }

    fn close(&mut self) -> Result<(), SourceError> {
        self.buffer.clear();
        self.tables.clear();
        self.current = None;
        match self.fetcher.take() {
            Some(mut fetcher) => fetcher.close(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    struct FakeFetcher {
        data: Vec<(String, Vec<String>, Vec<Vec<Option<String>>>)>,
        closes: Arc<AtomicUsize>,
    }

    impl BatchFetch for FakeFetcher {
        fn tables(&mut self) -> Result<Vec<String>, SourceError> {
            Ok(self.data.iter().map(|(t, _, _)| t.clone()).collect())
        }

        fn columns(&mut self, table: &str) -> Result<Vec<String>, SourceError> {
            Ok(self
                .data
                .iter()
                .find(|(t, _, _)| t == table)
                .map(|(_, c, _)| c.clone())
                .unwrap_or_default())
        }

        fn fetch(
            &mut self,
            table: &str,
            _columns: &[String],
            cursor: Cursor,
            limit: usize,
        ) -> Result<Page, SourceError> {
            let rows = &self.data.iter().find(|(t, _, _)| t == table).unwrap().2;
            let offset = cursor.offset();
            let page: Vec<_> = rows.iter().skip(offset as usize).take(limit).cloned().collect();
            Ok(Page {
                next: Cursor::Offset(offset + page.len() as u64),
                rows: page,
            })
        }

        fn estimate_rows(&mut self) -> Option<u64> {
            Some(self.data.iter().map(|(_, _, r)| r.len() as u64).sum())
        }

        fn close(&mut self) -> Result<(), SourceError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn text(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn walks_tables_in_pages_and_stays_exhausted() {
        let closes = Arc::new(AtomicUsize::new(0));
        let fetcher = FakeFetcher {
            data: vec![
                ("a".into(), vec!["x".into()], vec![vec![text("1")], vec![text("2")], vec![None]]),
                ("empty".into(), vec![], vec![]),
                ("b".into(), vec!["y".into(), "z".into()], vec![vec![text("3"), text("4")]]),
            ],
            closes: Arc::clone(&closes),
        };
        let mut handle = BatchedHandle::new(fetcher, 2).unwrap();
        assert_eq!(handle.size_hint(), Some(4));

        let mut seen = Vec::new();
        while let Some(row) = handle.next_row().unwrap() {
            seen.push((row.table.clone(), row.row_index, row.cells.len()));
        }
        assert_eq!(
            seen,
            vec![
                ("a".to_string(), 0, 1),
                ("a".to_string(), 1, 1),
                ("a".to_string(), 2, 1),
                ("b".to_string(), 0, 2),
            ]
        );
        assert!(handle.next_row().unwrap().is_none());

        handle.close().unwrap();
        handle.close().unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(handle.next_row().unwrap().is_none());
    }
}
