use std::{
    collections::{BTreeSet, HashSet},
    fmt,
    marker::PhantomData,
    sync::Arc,
};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use shared::{
    domain::OrganizationScope,
    filter::FilterSet,
    pagination::DEFAULT_ITEMS_PER_PAGE,
    protocol::{JoinSpec, ListQuery, PageRequest, PageResult, SortSpec},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{error::ListError, transport::ListTransport, ListRow};

/// Pure per-row reshaping applied to every fetched row before it is cached.
pub struct RowTransform<T, U> {
    map: Arc<dyn Fn(T) -> U + Send + Sync>,
}

impl<T, U> RowTransform<T, U> {
    pub fn new(map: impl Fn(T) -> U + Send + Sync + 'static) -> Self {
        Self { map: Arc::new(map) }
    }

    pub fn apply(&self, row: T) -> U {
        (self.map)(row)
    }
}

impl<T: 'static> RowTransform<T, T> {
    pub fn identity() -> Self {
        Self::new(|row| row)
    }
}

impl<T, U> Clone for RowTransform<T, U> {
    fn clone(&self) -> Self {
        Self {
            map: Arc::clone(&self.map),
        }
    }
}

impl<T, U> fmt::Debug for RowTransform<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RowTransform")
    }
}

/// Static fetch parameters of a list source: endpoint, scoping, includes and row shaping.
pub struct SourceConfig<T, U> {
    pub endpoint: String,
    pub base_where: Map<String, Value>,
    pub relations: BTreeSet<String>,
    pub join: Option<JoinSpec>,
    pub transform: RowTransform<T, U>,
}

impl<T, U> SourceConfig<T, U> {
    pub fn new(endpoint: impl Into<String>, transform: RowTransform<T, U>) -> Self {
        Self {
            endpoint: endpoint.into(),
            base_where: Map::new(),
            relations: BTreeSet::new(),
            join: None,
            transform,
        }
    }

    pub fn with_scope(mut self, scope: &OrganizationScope) -> Self {
        self.base_where.extend(scope.to_base_where());
        self
    }

    pub fn with_where(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.base_where.insert(field.into(), value.into());
        self
    }

    pub fn with_relations<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relations.extend(relations.into_iter().map(Into::into));
        self
    }

    pub fn with_join(mut self, join: JoinSpec) -> Self {
        self.join = Some(join);
        self
    }
}

impl<T: 'static> SourceConfig<T, T> {
    pub fn untransformed(endpoint: impl Into<String>) -> Self {
        Self::new(endpoint, RowTransform::identity())
    }
}

impl<T, U> Clone for SourceConfig<T, U> {
    fn clone(&self) -> Self {
        Self {
            endpoint: self.endpoint.clone(),
            base_where: self.base_where.clone(),
            relations: self.relations.clone(),
            join: self.join.clone(),
            transform: self.transform.clone(),
        }
    }
}

impl<T, U> fmt::Debug for SourceConfig<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("endpoint", &self.endpoint)
            .field("base_where", &self.base_where)
            .field("relations", &self.relations)
            .field("join", &self.join)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome<R> {
    Applied(R),
    /// A newer request was issued while this one was in flight; its response was dropped.
    Superseded,
}

impl<R> LoadOutcome<R> {
    pub fn applied(self) -> Option<R> {
        match self {
            LoadOutcome::Applied(value) => Some(value),
            LoadOutcome::Superseded => None,
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, LoadOutcome::Superseded)
    }

    pub fn map<V>(self, f: impl FnOnce(R) -> V) -> LoadOutcome<V> {
        match self {
            LoadOutcome::Applied(value) => LoadOutcome::Applied(f(value)),
            LoadOutcome::Superseded => LoadOutcome::Superseded,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    Reconfigured { endpoint: String },
    Loaded { token: u64, total_count: u64, rows: usize },
    Failed { token: u64, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchMode {
    Replace,
    Accumulate,
}

struct SourceState<T, U: ListRow> {
    config: Option<SourceConfig<T, U>>,
    page: u32,
    page_size: u32,
    latest_token: u64,
    cached: PageResult<U>,
    accumulated: Vec<U>,
    accumulated_keys: HashSet<U::Key>,
}

impl<T, U: ListRow> SourceState<T, U> {
    fn reset_accumulated(&mut self) {
        self.accumulated.clear();
        self.accumulated_keys.clear();
    }
}

struct Ticket<T, U> {
    token: u64,
    endpoint: String,
    query: ListQuery,
    transform: RowTransform<T, U>,
}

/// Paginated data source over one REST collection endpoint.
///
/// Every load takes a fresh token; only the response to the most recently issued
/// request is applied, so a slow earlier page can never overwrite a newer one.
pub struct RemoteListSource<T, U: ListRow> {
    transport: Arc<dyn ListTransport>,
    inner: Mutex<SourceState<T, U>>,
    events: broadcast::Sender<SourceEvent>,
    _raw: PhantomData<fn() -> T>,
}

impl<T, U> RemoteListSource<T, U>
where
    T: DeserializeOwned + 'static,
    U: ListRow,
{
    pub fn new(transport: Arc<dyn ListTransport>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            transport,
            inner: Mutex::new(SourceState {
                config: None,
                page: 1,
                page_size: DEFAULT_ITEMS_PER_PAGE,
                latest_token: 0,
                cached: PageResult::default(),
                accumulated: Vec::new(),
                accumulated_keys: HashSet::new(),
            }),
            events,
            _raw: PhantomData,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SourceEvent> {
        self.events.subscribe()
    }

    /// Replaces the static fetch parameters, dropping cached rows and any in-flight response.
    pub async fn configure(&self, config: SourceConfig<T, U>) {
        let endpoint = config.endpoint.clone();
        {
            let mut guard = self.inner.lock().await;
            guard.config = Some(config);
            guard.latest_token += 1;
            guard.cached = PageResult::default();
            guard.reset_accumulated();
        }
        info!(%endpoint, "list source configured");
        let _ = self.events.send(SourceEvent::Reconfigured { endpoint });
    }

    /// Records the window for the next load; no request is sent.
    pub async fn set_paging(&self, page: u32, page_size: u32, reset_rows: bool) {
        let mut guard = self.inner.lock().await;
        guard.page = page.max(1);
        guard.page_size = page_size.max(1);
        if reset_rows {
            guard.reset_accumulated();
        }
    }

    pub async fn paging(&self) -> (u32, u32) {
        let guard = self.inner.lock().await;
        (guard.page, guard.page_size)
    }

    pub async fn load(
        &self,
        filters: &FilterSet,
        sort: &[SortSpec],
    ) -> Result<LoadOutcome<PageResult<U>>, ListError> {
        let ticket = self.issue(filters, sort, &BTreeSet::new()).await?;
        self.complete(ticket, FetchMode::Replace)
            .await
            .map(|outcome| outcome.map(|(page, _)| page))
    }

    /// Records the request's window, then loads it in replace mode with its extra relations.
    pub async fn load_request(
        &self,
        request: &PageRequest,
    ) -> Result<LoadOutcome<PageResult<U>>, ListError> {
        self.set_paging(request.page, request.page_size, false)
            .await;
        let ticket = self
            .issue(&request.filters, &request.sort, &request.relations)
            .await?;
        self.complete(ticket, FetchMode::Replace)
            .await
            .map(|outcome| outcome.map(|(page, _)| page))
    }

    /// Append-mode load for card grids; returns every accumulated row, without duplicates.
    pub async fn load_incremental(
        &self,
        filters: &FilterSet,
        sort: &[SortSpec],
    ) -> Result<LoadOutcome<Vec<U>>, ListError> {
        let ticket = self.issue(filters, sort, &BTreeSet::new()).await?;
        self.complete(ticket, FetchMode::Accumulate)
            .await
            .map(|outcome| outcome.map(|(_, accumulated)| accumulated))
    }

    pub async fn rows(&self) -> Vec<U> {
        self.inner.lock().await.cached.rows.clone()
    }

    pub async fn count(&self) -> u64 {
        self.inner.lock().await.cached.total_count
    }

    pub async fn page_result(&self) -> PageResult<U> {
        self.inner.lock().await.cached.clone()
    }

    pub async fn accumulated_rows(&self) -> Vec<U> {
        self.inner.lock().await.accumulated.clone()
    }

    pub async fn clear_accumulated(&self) {
        self.inner.lock().await.reset_accumulated();
    }

    async fn issue(
        &self,
        filters: &FilterSet,
        sort: &[SortSpec],
        extra_relations: &BTreeSet<String>,
    ) -> Result<Ticket<T, U>, ListError> {
        let mut guard = self.inner.lock().await;
        let Some(config) = guard.config.as_ref() else {
            return Err(ListError::NotConfigured);
        };
        let query = ListQuery::build(
            &config.base_where,
            &config.relations,
            config.join.as_ref(),
            guard.page,
            guard.page_size,
            filters,
            sort,
        )
        .with_relations(extra_relations);
        let endpoint = config.endpoint.clone();
        let transform = config.transform.clone();

        guard.latest_token += 1;
        Ok(Ticket {
            token: guard.latest_token,
            endpoint,
            query,
            transform,
        })
    }

    async fn complete(
        &self,
        ticket: Ticket<T, U>,
        mode: FetchMode,
    ) -> Result<LoadOutcome<(PageResult<U>, Vec<U>)>, ListError> {
        let Ticket {
            token,
            endpoint,
            query,
            transform,
        } = ticket;

        let fetched = self
            .transport
            .fetch_page(&endpoint, &query)
            .await
            .and_then(|raw| {
                let total_count = raw.total;
                let rows = raw
                    .items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| {
                        serde_json::from_value::<T>(item)
                            .map(|row| transform.apply(row))
                            .map_err(|source| ListError::Decode {
                                endpoint: endpoint.clone(),
                                index,
                                source,
                            })
                    })
                    .collect::<Result<Vec<U>, ListError>>()?;
                Ok(PageResult { rows, total_count })
            });

        let mut guard = self.inner.lock().await;
        if guard.latest_token != token {
            debug!(
                token,
                latest = guard.latest_token,
                %endpoint,
                "discarding response to superseded list request"
            );
            return Ok(LoadOutcome::Superseded);
        }

        let page = match fetched {
            Ok(page) => page,
            Err(err) => {
                drop(guard);
                warn!(token, %endpoint, "list load failed: {err}");
                let _ = self.events.send(SourceEvent::Failed {
                    token,
                    message: err.to_string(),
                });
                return Err(err);
            }
        };

        if mode == FetchMode::Accumulate {
            let state = &mut *guard;
            for row in &page.rows {
                if state.accumulated_keys.insert(row.row_key()) {
                    state.accumulated.push(row.clone());
                }
            }
        }
        guard.cached = page.clone();
        let accumulated = if mode == FetchMode::Accumulate {
            guard.accumulated.clone()
        } else {
            Vec::new()
        };
        drop(guard);

        info!(
            token,
            %endpoint,
            page = query.page,
            rows = page.rows.len(),
            total = page.total_count,
            "list page loaded"
        );
        let _ = self.events.send(SourceEvent::Loaded {
            token,
            total_count: page.total_count,
            rows: page.rows.len(),
        });
        Ok(LoadOutcome::Applied((page, accumulated)))
    }
}

#[cfg(test)]
#[path = "tests/source_tests.rs"]
mod tests;
