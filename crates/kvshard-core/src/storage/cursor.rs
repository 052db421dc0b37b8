//! Native row-at-a-time index cursor.

use std::ops::Bound;

use super::key::{is_empty_range, EntryRange};
use super::store::Index;
use crate::document::Document;
use crate::error::Error;

/// Walks an index range one entry per engine round trip.
///
/// Each [`next`](Self::next) call re-seeks from just past the previous
/// entry, so the cursor holds no engine resources between steps.
#[derive(Debug)]
pub struct IndexCursor {
    index: Index,
    range: Option<EntryRange>,
    position: usize,
}

impl IndexCursor {
    pub(crate) fn new(index: Index, range: Option<EntryRange>) -> Self {
        Self {
            index,
            range,
            position: 0,
        }
    }

    /// Advance to the next document, or None once the range is exhausted.
    pub async fn next(&mut self) -> Result<Option<Document>, Error> {
        let range = match &self.range {
            Some(range) if !is_empty_range(range) => range.clone(),
            _ => {
                self.range = None;
                return Ok(None);
            }
        };

        let index = self.index.clone();
        let step = tokio::task::spawn_blocking(move || index.first_in(range)).await??;

        match step {
            Some((entry, doc)) => {
                if let Some(range) = self.range.as_mut() {
                    range.0 = Bound::Excluded(entry);
                }
                self.position += 1;
                Ok(Some(doc))
            }
            None => {
                self.range = None;
                Ok(None)
            }
        }
    }

    /// Number of documents returned so far.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Whether the cursor has reached the end of its range.
    pub fn is_exhausted(&self) -> bool {
        self.range.is_none()
    }
}
