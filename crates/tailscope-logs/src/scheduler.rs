use std::ops::Range;
use std::time::Instant;

use tracing::debug;

use crate::filter::FilterEngine;
use crate::gate::LevelGate;
use crate::render::{LineRenderer, RenderContext};
use crate::session::{Session, SessionId};
use crate::table::RowTable;
use tailscope_types::{Headers, LogRecord};

/// One received batch, consumed as an iterator of fixed-size chunks
pub struct InsertionJob {
    session: SessionId,
    headers: Headers,
    records: std::vec::IntoIter<LogRecord>,
    chunk_size: usize,

    /// Table index of the job's first row
    first_row: usize,

    /// Rows come from a non-initial batch
    fresh: bool,
}

impl InsertionJob {
    pub fn new(
        session: SessionId,
        headers: Headers,
        records: Vec<LogRecord>,
        chunk_size: usize,
        first_row: usize,
        fresh: bool,
    ) -> Self {
        Self {
            session,
            headers,
            records: records.into_iter(),
            chunk_size: chunk_size.max(1),
            first_row,
            fresh,
        }
    }

    /// Records not yet handed out
    pub fn remaining(&self) -> usize {
        self.records.len()
    }
}

impl Iterator for InsertionJob {
    type Item = Vec<LogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk: Vec<LogRecord> = self.records.by_ref().take(self.chunk_size).collect();
        if chunk.is_empty() { None } else { Some(chunk) }
    }
}

/// Everything a chunk insertion touches
pub struct InsertTarget<'a> {
    pub table: &'a mut RowTable,
    pub renderer: &'a LineRenderer,
    pub filter: &'a FilterEngine,
    pub gate: &'a LevelGate,
    pub session: &'a mut Session,
}

/// Result of inserting one chunk
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkReport {
    pub session: SessionId,

    /// Table indices of the rows just inserted
    pub inserted: Range<usize>,

    /// The whole batch has now been consumed
    pub finished: bool,
}

impl ChunkReport {
    /// Last row of this chunk, the autoscroll target
    pub fn last_row(&self) -> Option<usize> {
        (!self.inserted.is_empty()).then(|| self.inserted.end - 1)
    }
}

/// Inserts batches a chunk at a time so the UI stays responsive in between
pub struct InsertionScheduler {
    chunk_size: usize,
    job: Option<InsertionJob>,
}

impl InsertionScheduler {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            job: None,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Queue a batch; rows will be appended starting at `first_row`
    pub fn enqueue(
        &mut self,
        session: SessionId,
        headers: Headers,
        records: Vec<LogRecord>,
        first_row: usize,
        fresh: bool,
    ) {
        debug!("queued {} records for insertion", records.len());
        self.job = Some(InsertionJob::new(
            session,
            headers,
            records,
            self.chunk_size,
            first_row,
            fresh,
        ));
    }

    /// Drop any unfinished batch
    pub fn cancel(&mut self) {
        if let Some(job) = self.job.take() {
            debug!("cancelled insertion with {} records left", job.remaining());
        }
    }

    pub fn has_pending(&self) -> bool {
        self.job.is_some()
    }

    /// Insert the next chunk of the pending batch
    ///
    /// After every chunk the new rows are filtered and column widths are
    /// recomputed; after the last one the filter is re-run over the whole
    /// batch and the job is released.
    pub fn step(&mut self, target: InsertTarget<'_>, now: Instant) -> Option<ChunkReport> {
        let job = self.job.as_mut()?;
        if job.session != target.session.id {
            debug!("dropping insertion for inactive session {:?}", job.session);
            self.job = None;
            return None;
        }

        let start = target.table.len();
        if let Some(chunk) = job.next() {
            for record in &chunk {
                let ctx = RenderContext {
                    session_path: &target.session.path,
                    seq: target.table.len() as u64,
                    fresh: job.fresh,
                    now,
                };
                let row = target.renderer.render(
                    record,
                    &job.headers,
                    &ctx,
                    &mut target.session.counters,
                );
                target.table.push(row);
            }
            target.filter.apply_to(target.table.rows_from_mut(start));
            target.table.recompute_widths(target.gate);
        }

        let report = ChunkReport {
            session: job.session,
            inserted: start..target.table.len(),
            finished: job.remaining() == 0,
        };

        if report.finished {
            let first_row = job.first_row;
            target.filter.apply_to(target.table.rows_from_mut(first_row));
            self.job = None;
        }

        Some(report)
    }
}
