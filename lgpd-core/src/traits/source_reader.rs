//! Source reader contract: one implementation per driver kind.

use std::ops::{Deref, DerefMut};

use crate::errors::SourceError;
use crate::models::{DriverKind, Row, SourceConfig};

/// An open connection to a data source yielding rows lazily.
///
/// The sequence is finite and not restartable: once `next_row` returns
/// `Ok(None)` every later call returns `Ok(None)`.
pub trait SourceHandle: Send {
    /// Pull the next row, or `None` when the source is exhausted.
    fn next_row(&mut self) -> Result<Option<Row>, SourceError>;

    /// Estimated total number of rows, when the source can tell cheaply.
    fn size_hint(&self) -> Option<u64> {
        None
    }

    /// Release the underlying connection. Must be idempotent.
    fn close(&mut self) -> Result<(), SourceError>;
}

/// Opens handles for one driver kind.
pub trait SourceReader: Send + Sync {
    /// The driver kind this reader serves.
    fn driver(&self) -> DriverKind;

    /// Connect to the configured source.
    fn open(&self, config: &SourceConfig) -> Result<Box<dyn SourceHandle>, SourceError>;
}

/// Owns a handle and closes it on every exit path, including unwinding.
pub struct ScopedHandle {
    inner: Box<dyn SourceHandle>,
    closed: bool,
}

impl ScopedHandle {
    pub fn new(inner: Box<dyn SourceHandle>) -> Self {
        Self {
            inner,
            closed: false,
        }
    }

    /// Close explicitly, surfacing the close error.
    pub fn close(mut self) -> Result<(), SourceError> {
        self.closed = true;
        self.inner.close()
    }

    /// Iterate over the remaining rows.
    pub fn rows(&mut self) -> RowIter<'_> {
        RowIter::new(self.inner.as_mut())
    }
}

impl Deref for ScopedHandle {
    type Target = dyn SourceHandle;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl DerefMut for ScopedHandle {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.inner.as_mut()
    }
}

impl Drop for ScopedHandle {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.inner.close() {
                tracing::warn!(error = %e, "failed to close source handle");
            }
        }
    }
}

/// Fused iterator over a handle's rows. Stops after the first error.
pub struct RowIter<'a> {
    handle: &'a mut dyn SourceHandle,
    done: bool,
}

impl<'a> RowIter<'a> {
    pub fn new(handle: &'a mut dyn SourceHandle) -> Self {
        Self {
            handle,
            done: false,
        }
    }
}

impl Iterator for RowIter<'_> {
    type Item = Result<Row, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.handle.next_row() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
