use std::time::Duration;

use shared::{
    domain::LayoutStyle,
    filter::{FilterPredicate, FilterSet},
    pagination::{PaginationPatch, PaginationState, DEFAULT_ITEMS_PER_PAGE},
    protocol::{PageRequest, SortSpec},
};
use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};

use crate::config::ListSettings;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

pub type ReloadStream = UnboundedReceiverStream<ReloadRequest>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerPhase {
    #[default]
    Idle,
    Loading,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerOptions {
    pub debounce: Duration,
    pub items_per_page: u32,
    pub layout: LayoutStyle,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
            layout: LayoutStyle::Table,
        }
    }
}

impl ControllerOptions {
    pub fn from_settings(settings: &ListSettings) -> Self {
        Self {
            debounce: settings.debounce(),
            items_per_page: settings.default_page_size,
            ..Self::default()
        }
    }
}

/// One coalesced reload: the full state to fetch, captured when the last mutation happened.
#[derive(Debug, Clone, PartialEq)]
pub struct ReloadRequest {
    pub generation: u64,
    pub request: PageRequest,
    pub layout: LayoutStyle,
    /// Accumulated card-grid rows must be dropped before this fetch.
    pub reset_accumulated: bool,
}

impl ReloadRequest {
    fn superseded_by(self, next: ReloadRequest) -> ReloadRequest {
        ReloadRequest {
            reset_accumulated: self.reset_accumulated || next.reset_accumulated,
            ..next
        }
    }
}

/// Per-view pagination and filter state with a debounced reload stream.
///
/// Mutations are synchronous and each one queues a snapshot; the debounce task
/// forwards only the last snapshot once the configured quiet period elapses.
/// Must be constructed inside a tokio runtime.
pub struct PaginationFilterController {
    pagination: PaginationState,
    filters: FilterSet,
    sort: Vec<SortSpec>,
    layout: LayoutStyle,
    phase: ControllerPhase,
    generation: u64,
    signals: UnboundedSender<ReloadRequest>,
    reloads: Option<ReloadStream>,
    debounce_task: JoinHandle<()>,
}

impl PaginationFilterController {
    pub fn new(options: ControllerOptions) -> Self {
        let (signals, signal_rx) = mpsc::unbounded_channel();
        let (reload_tx, reload_rx) = mpsc::unbounded_channel();
        let debounce_task = tokio::spawn(debounce_reloads(signal_rx, reload_tx, options.debounce));

        Self {
            pagination: PaginationState::with_items_per_page(options.items_per_page),
            filters: FilterSet::new(),
            sort: Vec::new(),
            layout: options.layout,
            phase: ControllerPhase::Idle,
            generation: 0,
            signals,
            reloads: Some(UnboundedReceiverStream::new(reload_rx)),
            debounce_task,
        }
    }

    /// The single subscription point for reloads; `None` once it has been taken.
    pub fn take_reload_stream(&mut self) -> Option<ReloadStream> {
        self.reloads.take()
    }

    pub fn pagination(&self) -> PaginationState {
        self.pagination
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn sort(&self) -> &[SortSpec] {
        &self.sort
    }

    pub fn layout_style(&self) -> LayoutStyle {
        self.layout
    }

    pub fn phase(&self) -> ControllerPhase {
        self.phase
    }

    pub fn page_request(&self) -> PageRequest {
        PageRequest {
            sort: self.sort.clone(),
            filters: self.filters.clone(),
            ..PageRequest::new(self.pagination.active_page, self.pagination.items_per_page)
        }
    }

    /// Returns `false` (and queues nothing) when the predicate leaves the filters unchanged.
    pub fn set_filter(&mut self, predicate: FilterPredicate) -> bool {
        if !self.filters.set(predicate) {
            return false;
        }
        self.restart_from_first_page();
        true
    }

    pub fn remove_filter(&mut self, field: &str) -> bool {
        if !self.filters.remove(field) {
            return false;
        }
        self.restart_from_first_page();
        true
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
        self.restart_from_first_page();
    }

    pub fn set_sort(&mut self, sort: Vec<SortSpec>) {
        self.sort = sort;
        self.restart_from_first_page();
    }

    /// Moves to `page`, clamped into the current page range. Returns the page actually set.
    ///
    /// The range comes from the last finished load. After a filter change that has not
    /// loaded yet, the page may sit past the new last page; `finish_loading` clamps it then.
    pub fn set_page(&mut self, page: i64) -> u32 {
        self.pagination.active_page = self.pagination.clamp_page(page);
        self.enqueue(false);
        self.pagination.active_page
    }

    pub fn set_items_per_page(&mut self, items_per_page: u32) {
        self.pagination.items_per_page = items_per_page.max(1);
        self.restart_from_first_page();
    }

    /// Switching layouts always restarts from page 1 with no accumulated rows.
    pub fn set_layout_style(&mut self, layout: LayoutStyle) -> bool {
        if self.layout == layout {
            return false;
        }
        debug!(from = ?self.layout, to = ?layout, "list layout switched");
        self.layout = layout;
        self.pagination.active_page = 1;
        self.enqueue(true);
        true
    }

    /// Back to page 1, keeping filters; used after layout or organization switches.
    pub fn refresh_pagination(&mut self) {
        self.restart_from_first_page();
    }

    /// Re-runs the current request unchanged, e.g. when the user retries after a failure.
    pub fn request_reload(&mut self) {
        self.enqueue(false);
    }

    /// Applies pager bindings; queues a reload only if the page window changed.
    /// A new page size restarts from page 1; the active page is always clamped into range.
    pub fn set_pagination(&mut self, patch: PaginationPatch) -> bool {
        let before = self.pagination;
        if let Some(total_items) = patch.total_items {
            self.pagination.total_items = total_items;
        }
        if let Some(items_per_page) = patch.items_per_page {
            self.pagination.items_per_page = items_per_page.max(1);
            if self.pagination.items_per_page != before.items_per_page {
                self.pagination.active_page = 1;
            }
        }
        let page = patch
            .active_page
            .unwrap_or(i64::from(self.pagination.active_page));
        self.pagination.active_page = self.pagination.clamp_page(page);

        let page_size_changed = before.items_per_page != self.pagination.items_per_page;
        let window_changed =
            page_size_changed || before.active_page != self.pagination.active_page;
        if window_changed {
            self.enqueue(page_size_changed && self.layout.accumulates_rows());
        }
        window_changed
    }

    pub fn begin_loading(&mut self) {
        self.phase = ControllerPhase::Loading;
    }

    /// Records the server's total; an active page past the new last page is clamped and reloaded.
    pub fn finish_loading(&mut self, total_items: u64) {
        self.phase = ControllerPhase::Idle;
        self.pagination.total_items = total_items;
        if self.pagination.is_out_of_range() {
            let clamped = self.pagination.clamp_page(i64::from(self.pagination.active_page));
            debug!(
                from = self.pagination.active_page,
                to = clamped,
                total_items,
                "active page out of range after load"
            );
            self.pagination.active_page = clamped;
            self.enqueue(false);
        }
    }

    pub fn fail_loading(&mut self) {
        self.phase = ControllerPhase::Idle;
    }

    fn restart_from_first_page(&mut self) {
        self.pagination.active_page = 1;
        self.enqueue(self.layout.accumulates_rows());
    }

    fn enqueue(&mut self, reset_accumulated: bool) {
        self.generation += 1;
        let reload = ReloadRequest {
            generation: self.generation,
            request: self.page_request(),
            layout: self.layout,
            reset_accumulated,
        };
        debug!(
            generation = reload.generation,
            page = reload.request.page,
            filters = reload.request.filters.len(),
            "reload requested"
        );
        if self.signals.send(reload).is_err() {
            warn!("reload debouncer has stopped; dropping reload request");
        }
    }
}

impl Drop for PaginationFilterController {
    fn drop(&mut self) {
        self.debounce_task.abort();
    }
}

async fn debounce_reloads(
    mut signals: UnboundedReceiver<ReloadRequest>,
    reloads: UnboundedSender<ReloadRequest>,
    window: Duration,
) {
    while let Some(mut pending) = signals.recv().await {
        loop {
            tokio::select! {
                next = signals.recv() => match next {
                    Some(reload) => pending = pending.superseded_by(reload),
                    None => break,
                },
                () = tokio::time::sleep(window) => break,
            }
        }
        debug!(generation = pending.generation, "emitting coalesced reload");
        if reloads.send(pending).is_err() {
            return;
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
