use futures::StreamExt;
use serde::{de::DeserializeOwned, Serialize};
use shared::{domain::LayoutStyle, pagination::PaginationState};
use tracing::warn;

use crate::{
    controller::{PaginationFilterController, ReloadRequest, ReloadStream},
    error::ListError,
    source::{LoadOutcome, RemoteListSource, SourceConfig},
    ListRow,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSnapshot<U> {
    pub generation: u64,
    pub layout: LayoutStyle,
    pub pagination: PaginationState,
    pub rows: Vec<U>,
}

#[derive(Debug)]
pub enum ViewUpdate<U> {
    Rendered(ViewSnapshot<U>),
    Superseded,
    /// The previous rows stay cached; retry with `request_reload`.
    Failed(ListError),
}

/// A list screen: one source, one controller, and the controller's reload subscription.
pub struct ListView<T, U: ListRow> {
    source: RemoteListSource<T, U>,
    controller: PaginationFilterController,
    reloads: ReloadStream,
}

impl<T, U> ListView<T, U>
where
    T: DeserializeOwned + 'static,
    U: ListRow,
{
    pub fn new(
        source: RemoteListSource<T, U>,
        mut controller: PaginationFilterController,
    ) -> Result<Self, ListError> {
        let reloads = controller
            .take_reload_stream()
            .ok_or(ListError::ReloadStreamTaken)?;
        Ok(Self {
            source,
            controller,
            reloads,
        })
    }

    pub fn source(&self) -> &RemoteListSource<T, U> {
        &self.source
    }

    pub fn controller(&self) -> &PaginationFilterController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PaginationFilterController {
        &mut self.controller
    }

    /// Organization (or other scope) switch: reconfigure the source and restart at page 1.
    pub async fn change_scope(&mut self, config: SourceConfig<T, U>) {
        self.source.configure(config).await;
        self.controller.refresh_pagination();
    }

    /// Waits for the next coalesced reload and runs it. `None` once the controller is gone.
    pub async fn next_reload(&mut self) -> Option<ViewUpdate<U>> {
        let reload = self.reloads.next().await?;
        Some(self.apply(reload).await)
    }

    async fn apply(&mut self, reload: ReloadRequest) -> ViewUpdate<U> {
        let ReloadRequest {
            generation,
            request,
            layout,
            reset_accumulated,
        } = reload;

        self.controller.begin_loading();
        self.source
            .set_paging(request.page, request.page_size, reset_accumulated)
            .await;

        let outcome = if layout.accumulates_rows() {
            self.source
                .load_incremental(&request.filters, &request.sort)
                .await
        } else {
            self.source
                .load(&request.filters, &request.sort)
                .await
                .map(|outcome| outcome.map(|page| page.rows))
        };

        match outcome {
            Ok(LoadOutcome::Applied(rows)) => {
                let total_items = self.source.count().await;
                self.controller.finish_loading(total_items);
                ViewUpdate::Rendered(ViewSnapshot {
                    generation,
                    layout,
                    pagination: self.controller.pagination(),
                    rows,
                })
            }
            Ok(LoadOutcome::Superseded) => {
                self.controller.fail_loading();
                ViewUpdate::Superseded
            }
            Err(err) => {
                warn!(generation, "list view reload failed: {err}");
                self.controller.fail_loading();
                ViewUpdate::Failed(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
