//! Shard routing and remote dispatch.
//!
//! Every attribute belongs to exactly one shard. A sort request executes on
//! the shard that owns its primary attribute: locally when this node serves
//! that shard, otherwise over RPC with a **backup-request policy** — after a
//! short hedge delay a second copy goes to another replica, the first reply
//! wins and the loser is cancelled.
//!
//! The RPC transport itself lives elsewhere; this module only sees the
//! [`WorkerClient`] handle the router hands out per shard.

use crate::engine::SortEngine;
use crate::error::{Result, SortError};
use crate::request::{SortRequest, SortResult, ValueMatrix, ValuesRequest};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use trellis_db_core::{data_key, ShardId, UidList, WireValue};

/// Remote worker handle for one shard.
#[async_trait]
pub trait WorkerClient: fmt::Debug + Send + Sync {
    /// Execute a sort on the remote shard.
    async fn sort(&self, req: SortRequest) -> Result<SortResult>;

    /// Fetch attribute values for a uid list from the remote shard.
    async fn values(&self, req: ValuesRequest) -> Result<ValueMatrix>;
}

/// Attribute-to-shard routing table.
pub trait ShardRouter: fmt::Debug + Send + Sync {
    /// The shard that owns `attr`.
    fn owner_of(&self, attr: &str) -> ShardId;

    /// Whether this node serves `shard`.
    fn serves_locally(&self, shard: ShardId) -> bool;

    /// A client handle for `shard`. Repeated calls may hand out different
    /// replicas, which is what the backup request relies on.
    fn client_for(&self, shard: ShardId) -> Result<Arc<dyn WorkerClient>>;
}

/// Fixed routing table with round-robin replica selection.
pub struct StaticRouter {
    local: HashSet<ShardId>,
    default_shard: ShardId,
    owners: HashMap<String, ShardId>,
    clients: HashMap<ShardId, Vec<Arc<dyn WorkerClient>>>,
    next_replica: AtomicUsize,
}

impl StaticRouter {
    /// A router for a node serving `local`; unassigned attributes default
    /// to that shard.
    pub fn new(local: ShardId) -> Self {
        StaticRouter {
            local: HashSet::from([local]),
            default_shard: local,
            owners: HashMap::new(),
            clients: HashMap::new(),
            next_replica: AtomicUsize::new(0),
        }
    }

    /// Assign `attr` to `shard`.
    pub fn assign(mut self, attr: impl Into<String>, shard: ShardId) -> Self {
        self.owners.insert(attr.into(), shard);
        self
    }

    /// Register a replica client for `shard`.
    pub fn add_client(mut self, shard: ShardId, client: Arc<dyn WorkerClient>) -> Self {
        self.clients.entry(shard).or_default().push(client);
        self
    }
}

impl fmt::Debug for StaticRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticRouter")
            .field("local", &self.local)
            .field("default_shard", &self.default_shard)
            .field("owners", &self.owners)
            .field("shards_with_clients", &self.clients.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ShardRouter for StaticRouter {
    fn owner_of(&self, attr: &str) -> ShardId {
        self.owners.get(attr).copied().unwrap_or(self.default_shard)
    }

    fn serves_locally(&self, shard: ShardId) -> bool {
        self.local.contains(&shard)
    }

    fn client_for(&self, shard: ShardId) -> Result<Arc<dyn WorkerClient>> {
        let replicas = self
            .clients
            .get(&shard)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| SortError::Remote(format!("no client for shard {shard}")))?;
        let n = self.next_replica.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::clone(&replicas[n % replicas.len()]))
    }
}

impl SortEngine {
    /// Route a sort request to the shard owning its primary attribute.
    ///
    /// Local requests run inline; remote ones go out with the backup-request
    /// policy.
    pub async fn sort_over_network(
        &self,
        cancel: &CancellationToken,
        req: SortRequest,
    ) -> Result<SortResult> {
        req.validate()?;
        let attr = &req.attrs[0];
        let shard = self.router.owner_of(attr);
        debug!(attr = %attr, shard, "dispatching sort");
        if self.router.serves_locally(shard) {
            return self.process_sort(cancel, &req).await;
        }
        if cancel.is_cancelled() {
            return Err(SortError::Cancelled);
        }
        let request = req;
        self.backup_request(cancel, shard, move |client| {
            let req = request.clone();
            async move { client.sort(req).await }
        })
        .await
    }

    /// Transport-facing entry point: execute a sort this node must own.
    ///
    /// A request for a foreign shard is answered with
    /// [`SortError::WrongShard`] so the caller can retry at the right place.
    pub async fn handle_sort(
        &self,
        cancel: &CancellationToken,
        req: &SortRequest,
    ) -> Result<SortResult> {
        if cancel.is_cancelled() {
            return Err(SortError::Cancelled);
        }
        req.validate()?;
        let attr = &req.attrs[0];
        let shard = self.router.owner_of(attr);
        if !self.router.serves_locally(shard) {
            return Err(SortError::WrongShard {
                attr: attr.clone(),
                owner: shard,
            });
        }
        self.process_sort(cancel, req).await
    }

    /// Transport-facing entry point: resolve attribute values this node owns.
    pub async fn handle_values(
        &self,
        cancel: &CancellationToken,
        req: &ValuesRequest,
    ) -> Result<ValueMatrix> {
        if cancel.is_cancelled() {
            return Err(SortError::Cancelled);
        }
        let shard = self.router.owner_of(&req.attr);
        if !self.router.serves_locally(shard) {
            return Err(SortError::WrongShard {
                attr: req.attr.clone(),
                owner: shard,
            });
        }
        self.values_local(cancel, req).await
    }

    /// Resolve one attribute's values for a uid list, local or remote.
    ///
    /// A `~` prefix marks reverse-edge traversal; the flag travels on the
    /// request for the owning shard to honor.
    pub(crate) async fn fetch_attr_values(
        &self,
        cancel: &CancellationToken,
        attr: &str,
        uids: &UidList,
        langs: &[String],
    ) -> Result<ValueMatrix> {
        let (attr, reverse) = match attr.strip_prefix('~') {
            Some(rest) => (rest.to_string(), true),
            None => (attr.to_string(), false),
        };
        let shard = self.router.owner_of(&attr);
        let request = ValuesRequest {
            attr,
            reverse,
            uids: uids.clone(),
            langs: langs.to_vec(),
        };
        if self.router.serves_locally(shard) {
            return self.values_local(cancel, &request).await;
        }
        if cancel.is_cancelled() {
            return Err(SortError::Cancelled);
        }
        self.backup_request(cancel, shard, move |client| {
            let req = request.clone();
            async move { client.values(req).await }
        })
        .await
    }

    /// Read values straight out of the local store.
    async fn values_local(
        &self,
        cancel: &CancellationToken,
        req: &ValuesRequest,
    ) -> Result<ValueMatrix> {
        let typ = self.catalog.attr_type(&req.attr)?;
        let mut out = Vec::with_capacity(req.uids.len());
        for &uid in &req.uids {
            if cancel.is_cancelled() {
                return Err(SortError::Cancelled);
            }
            // Reverse postings share the data keyspace of the forward
            // attribute; materialization is the storage layer's concern.
            let pl = self.store.posting_list(&data_key(&req.attr, uid)).await;
            match pl.value_for(&req.langs) {
                Ok(wire) => out.push(wire),
                // No posting: explicitly nil, which sorts after everything.
                Err(_) => out.push(WireValue::nil(typ)),
            }
        }
        Ok(out)
    }

    /// Run `call` against the shard with a hedged backup request.
    ///
    /// The primary attempt starts immediately; after the configured hedge
    /// delay a second attempt goes to a fresh replica handle. The first
    /// success wins and the loser is cancelled. Two failures propagate as
    /// [`SortError::Remote`].
    pub(crate) async fn backup_request<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        shard: ShardId,
        call: F,
    ) -> Result<T>
    where
        T: Send + 'static,
        F: Fn(Arc<dyn WorkerClient>) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let scope = cancel.child_token();
        let (tx, mut rx) = mpsc::channel::<Result<T>>(2);

        {
            let client = self.router.client_for(shard);
            let call = call.clone();
            let scope = scope.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let outcome = match client {
                    Ok(client) => {
                        tokio::select! {
                            res = call(client) => res,
                            _ = scope.cancelled() => Err(SortError::Cancelled),
                        }
                    }
                    Err(e) => Err(e),
                };
                let _ = tx.send(outcome).await;
            });
        }

        {
            let router = Arc::clone(&self.router);
            let delay = self.config.hedge_delay();
            let scope = scope.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = scope.cancelled() => {
                        let _ = tx.send(Err(SortError::Cancelled)).await;
                        return;
                    }
                }
                let outcome = match router.client_for(shard) {
                    Ok(client) => {
                        tokio::select! {
                            res = call(client) => res,
                            _ = scope.cancelled() => Err(SortError::Cancelled),
                        }
                    }
                    Err(e) => Err(e),
                };
                let _ = tx.send(outcome).await;
            });
        }
        drop(tx);

        let hangup = || SortError::Internal("backup request hung up".to_string());
        match rx.recv().await.ok_or_else(hangup)? {
            Ok(v) => {
                scope.cancel();
                let _ = rx.recv().await;
                Ok(v)
            }
            Err(first_err) => {
                let second = rx.recv().await.ok_or_else(hangup)?;
                scope.cancel();
                match second {
                    Ok(v) => {
                        debug!(error = %first_err, shard, "primary request failed, backup succeeded");
                        Ok(v)
                    }
                    Err(second_err) => {
                        if matches!(first_err, SortError::Cancelled)
                            || matches!(second_err, SortError::Cancelled)
                        {
                            return Err(SortError::Cancelled);
                        }
                        Err(SortError::Remote(format!(
                            "shard {shard}: {first_err}; backup: {second_err}"
                        )))
                    }
                }
            }
        }
    }
}
