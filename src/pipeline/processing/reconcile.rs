//! Collision-safe identifier assignment for an ingest batch.
//!
//! Explicit identifiers are kept unless they collide with the store or with an
//! identifier already handed out earlier in the same batch. Everything else is
//! numbered from `max(existing) + 1` upwards. The pool lives for one call only;
//! concurrent ingests are not coordinated here and rely on the store's primary
//! key to reject a losing batch.

use std::collections::HashSet;

use crate::error::{GradeError, Result};
use crate::pipeline::processing::coerce::ValidatedRow;
use crate::types::Measurement;

/// Identifiers known to be taken during one ingest call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierPool {
    existing: HashSet<i64>,
    /// `None` once the counter has run past `i64::MAX`
    next_candidate: Option<i64>,
}

/// Result of assigning one identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub id: i64,
    /// The row asked for an identifier that was already taken
    pub collided: bool,
}

impl IdentifierPool {
    pub fn seeded<I: IntoIterator<Item = i64>>(ids: I) -> Self {
        let existing: HashSet<i64> = ids.into_iter().collect();
        let next_candidate = existing.iter().copied().max().unwrap_or(0).checked_add(1);
        Self {
            existing,
            next_candidate,
        }
    }

    pub fn next_candidate(&self) -> Option<i64> {
        self.next_candidate
    }

    pub fn contains(&self, id: i64) -> bool {
        self.existing.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.existing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.existing.is_empty()
    }

    /// Hand out the next free generated identifier. Skips values an explicit
    /// identifier earlier in the batch already reserved.
    fn take_candidate(&mut self) -> Result<i64> {
        loop {
            let candidate = self.next_candidate.ok_or(GradeError::IdentifierSpaceExhausted)?;
            self.next_candidate = candidate.checked_add(1);
            if !self.existing.contains(&candidate) {
                return Ok(candidate);
            }
        }
    }

    pub fn assign(&mut self, requested: Option<i64>) -> Result<Assignment> {
        let assignment = match requested {
            None => Assignment {
                id: self.take_candidate()?,
                collided: false,
            },
            Some(id) if self.existing.contains(&id) => Assignment {
                id: self.take_candidate()?,
                collided: true,
            },
            Some(id) => Assignment { id, collided: false },
        };
        self.existing.insert(assignment.id);
        Ok(assignment)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledBatch {
    pub measurements: Vec<Measurement>,
    pub duplicates_handled: usize,
    pub next_available_id: Option<i64>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityReconciler;

impl IdentityReconciler {
    pub fn new() -> Self {
        Self
    }

    /// Tag every row with a unique identifier, in row order. Rows are never
    /// dropped or reordered. Fails only when a fresh identifier is needed
    /// and none is left above the largest one in use.
    pub fn reconcile(&self, rows: Vec<ValidatedRow>, mut pool: IdentifierPool) -> Result<ReconciledBatch> {
        let mut duplicates_handled = 0;
        let mut measurements = Vec::with_capacity(rows.len());
        for row in rows {
            let assignment = pool.assign(row.id)?;
            if assignment.collided {
                duplicates_handled += 1;
            }
            measurements.push(Measurement {
                id: assignment.id,
                x_coord: row.x_coord,
                y_coord: row.y_coord,
                z_coord: row.z_coord,
                teneur: row.teneur,
            });
        }

        Ok(ReconciledBatch {
            measurements,
            duplicates_handled,
            next_available_id: pool.next_candidate(),
        })
    }
}
