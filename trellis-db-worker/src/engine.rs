//! The sort engine: strategy racer and multi-attribute extender.
//!
//! `process_sort` sorts with pagination by racing two strategies. The
//! indexed strategy iterates over index buckets, intersecting each with
//! every row of the uid matrix while maintaining per-row pagination
//! windows; it wins when the index is cheap to walk and the window is
//! small. The direct strategy sorts each row in memory; it wins on tiny
//! rows or when index iteration would dwarf a direct fetch. Racing them
//! avoids a static heuristic: the first strategy to finish without error
//! is taken and the other is cancelled.
//!
//! Multi-attribute requests run the indexed strategy alone, then extend
//! the primary order lexicographically by fetching secondary-attribute
//! values (remote where needed) for the union of surviving uids.

use crate::config::EngineConfig;
use crate::dispatch::ShardRouter;
use crate::error::{Result, SortError};
use crate::indexed::{sort_with_index, IndexedSort};
use crate::request::{SortRequest, SortResult, ValueMatrix};
use crate::unindexed::sort_without_index;
use crate::values::sort_uids_lex;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, Instrument};
use trellis_db_core::{convert, Catalog, KvStore, Uid, UidList, UidMatrix, Value};

/// Shard-local sort engine.
///
/// Cheap to clone; all collaborators are shared. The catalog and store are
/// read-only from the engine's perspective, so concurrent sorts share them
/// without synchronization.
#[derive(Debug, Clone)]
pub struct SortEngine {
    pub(crate) catalog: Arc<dyn Catalog>,
    pub(crate) store: Arc<dyn KvStore>,
    pub(crate) router: Arc<dyn ShardRouter>,
    pub(crate) config: EngineConfig,
}

/// Result of one racing strategy.
enum Strategy {
    Indexed(Result<IndexedSort>),
    Direct(Result<SortResult>),
}

impl Strategy {
    fn err(&self) -> Option<&SortError> {
        match self {
            Strategy::Indexed(Err(e)) | Strategy::Direct(Err(e)) => Some(e),
            _ => None,
        }
    }
}

impl SortEngine {
    /// Create an engine over the given collaborators with default tuning.
    pub fn new(
        catalog: Arc<dyn Catalog>,
        store: Arc<dyn KvStore>,
        router: Arc<dyn ShardRouter>,
    ) -> Self {
        SortEngine {
            catalog,
            store,
            router,
            config: EngineConfig::default(),
        }
    }

    /// Replace the tuning knobs.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sort the request matrix on this shard.
    ///
    /// The primary attribute must be owned locally; use
    /// [`SortEngine::sort_over_network`] for requests that may route
    /// elsewhere. Never returns partial results: cancellation yields
    /// [`SortError::Cancelled`].
    pub async fn process_sort(
        &self,
        cancel: &CancellationToken,
        req: &SortRequest,
    ) -> Result<SortResult> {
        let span = tracing::debug_span!(
            "process_sort",
            attrs = ?req.attrs,
            rows = req.uid_matrix.len(),
            count = req.count,
            offset = req.offset,
        );
        self.process_sort_inner(cancel, req).instrument(span).await
    }

    async fn process_sort_inner(
        &self,
        cancel: &CancellationToken,
        req: &SortRequest,
    ) -> Result<SortResult> {
        req.validate()?;
        if cancel.is_cancelled() {
            return Err(SortError::Cancelled);
        }
        let attr = &req.attrs[0];
        if self.catalog.is_list(attr) {
            return Err(SortError::InvalidRequest(format!(
                "sorting not supported on list attribute {attr}"
            )));
        }

        let multi = req.is_multi();
        let scope = cancel.child_token();
        let (tx, mut rx) = mpsc::channel::<Strategy>(2);

        {
            let engine = self.clone();
            let req = req.clone();
            let scope = scope.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let res = sort_with_index(
                    engine.catalog.as_ref(),
                    engine.store.as_ref(),
                    &scope,
                    &req,
                )
                .await;
                let _ = tx.send(Strategy::Indexed(res)).await;
            });
        }

        // The direct strategy joins the race only for single-attribute
        // requests: it cannot surface the per-uid values the extender
        // needs, so a multi-attribute request always takes the index path.
        if !multi {
            let engine = self.clone();
            let req = req.clone();
            let scope = scope.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                // Head start for the index walk.
                tokio::select! {
                    _ = sleep(engine.config.unindexed_delay()) => {}
                    _ = scope.cancelled() => {
                        let _ = tx.send(Strategy::Direct(Err(SortError::Cancelled))).await;
                        return;
                    }
                }
                let res = sort_without_index(
                    engine.catalog.as_ref(),
                    engine.store.as_ref(),
                    &scope,
                    &req,
                )
                .await;
                let _ = tx.send(Strategy::Direct(res)).await;
            });
        }
        drop(tx);

        let hangup = || SortError::Internal("sort strategy hung up without a result".to_string());
        let mut winner = rx.recv().await.ok_or_else(hangup)?;
        if !multi {
            match winner.err().map(|e| e.to_string()) {
                None => {
                    // First result is good: cancel and drain the loser so
                    // nothing leaks past this request.
                    scope.cancel();
                    let _ = rx.recv().await;
                }
                Some(err) => {
                    debug!(error = %err, "first sort strategy failed, awaiting the other");
                    winner = rx.recv().await.ok_or_else(hangup)?;
                }
            }
        }

        let (reply, primary_vals) = match winner {
            Strategy::Indexed(Ok(sorted)) => (
                SortResult {
                    uid_matrix: sorted.uid_matrix,
                },
                sorted.vals,
            ),
            Strategy::Direct(Ok(reply)) => (reply, Vec::new()),
            Strategy::Indexed(Err(e)) | Strategy::Direct(Err(e)) => return Err(e),
        };

        if !multi {
            return Ok(reply);
        }
        self.extend_multi(cancel, req, reply, primary_vals).await
    }

    /// Extend a primary-sorted matrix into lexicographic multi-attribute
    /// order, then clip each row to the pagination window.
    async fn extend_multi(
        &self,
        cancel: &CancellationToken,
        req: &SortRequest,
        mut reply: SortResult,
        primary_vals: Vec<Vec<Value>>,
    ) -> Result<SortResult> {
        let dest = dest_uids(&reply.uid_matrix);
        if dest.is_empty() {
            return Ok(reply);
        }

        // sort_vals[d] holds the value row for dest[d], one column per
        // sort attribute. Column 0 comes from the primary scan.
        let primary_type = self.catalog.attr_type(&req.attrs[0])?;
        let mut sort_vals: Vec<Vec<Value>> =
            vec![vec![Value::Nil(primary_type); req.attrs.len()]; dest.len()];

        let mut seen: HashSet<Uid> = HashSet::new();
        for (row, vals) in reply.uid_matrix.iter().zip(primary_vals.iter()) {
            if row.len() != vals.len() {
                return Err(SortError::Internal(
                    "primary values misaligned with sorted row".to_string(),
                ));
            }
            for (uid, val) in row.iter().zip(vals.iter()) {
                if !seen.insert(*uid) {
                    continue;
                }
                let d = lookup(&dest, *uid)?;
                sort_vals[d][0] = val.clone();
            }
        }

        // Fetch every secondary attribute concurrently; the join channel is
        // bounded to the fan-out width.
        let secondary = req.attrs.len() - 1;
        let (tx, mut rx) = mpsc::channel::<(usize, Result<ValueMatrix>)>(secondary);
        for (k, attr) in req.attrs.iter().enumerate().skip(1) {
            if cancel.is_cancelled() {
                return Err(SortError::Cancelled);
            }
            let engine = self.clone();
            let cancel = cancel.clone();
            let attr = attr.clone();
            let dest = dest.clone();
            let langs = req.langs.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let res = engine.fetch_attr_values(&cancel, &attr, &dest, &langs).await;
                let _ = tx.send((k, res)).await;
            });
        }
        drop(tx);

        let mut fetch_err: Option<SortError> = None;
        for _ in 0..secondary {
            let (k, res) = rx.recv().await.ok_or_else(|| {
                SortError::Internal("secondary value fetch hung up".to_string())
            })?;
            let matrix = match res {
                Ok(m) => m,
                Err(e) => {
                    if fetch_err.is_none() {
                        fetch_err = Some(e);
                    }
                    continue;
                }
            };
            if matrix.len() != dest.len() {
                return Err(SortError::Internal(format!(
                    "value matrix of {} entries for a union of {}",
                    matrix.len(),
                    dest.len()
                )));
            }
            for (d, wire) in matrix.iter().enumerate() {
                // The nil sentinel keeps the uid and sorts after every
                // present value; a conversion failure aborts the request.
                sort_vals[d][k] = convert(wire, wire.type_tag)?;
            }
        }
        if let Some(err) = fetch_err {
            return Err(err);
        }

        // Re-sort each row lexicographically, then clip. The index walk
        // did not apply the count, so every row still carries its full
        // candidate set.
        for row in reply.uid_matrix.iter_mut() {
            let mut vals = Vec::with_capacity(row.len());
            for uid in row.iter() {
                vals.push(sort_vals[lookup(&dest, *uid)?].clone());
            }
            sort_uids_lex(row, &mut vals, &req.desc);
            if req.count > 0 {
                row.truncate(req.count as usize);
            }
        }
        Ok(reply)
    }
}

/// Sorted, deduplicated union of every uid in the matrix.
fn dest_uids(matrix: &UidMatrix) -> UidList {
    matrix
        .iter()
        .flatten()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn lookup(dest: &UidList, uid: Uid) -> Result<usize> {
    dest.binary_search(&uid)
        .map_err(|_| SortError::Internal(format!("uid {uid} missing from sort union")))
}
