use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use list_client::{
    config::load_settings, ControllerOptions, HttpListTransport, ListView,
    PaginationFilterController, RemoteListSource, SourceConfig, ViewSnapshot, ViewUpdate,
};
use serde_json::Value;
use shared::{
    domain::{LayoutStyle, OrganizationScope, OrganizationId, TenantId},
    filter::FilterPredicate,
    protocol::SortSpec,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Layout {
    Table,
    Cards,
}

impl From<Layout> for LayoutStyle {
    fn from(value: Layout) -> Self {
        match value {
            Layout::Table => LayoutStyle::Table,
            Layout::Cards => LayoutStyle::CardGrid,
        }
    }
}

/// Browse one page (or several accumulated card pages) of a REST collection.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    server_url: Option<String>,
    /// Collection endpoint, e.g. `/api/organization-vendors/pagination`.
    #[arg(long)]
    endpoint: String,
    #[arg(long)]
    tenant_id: Option<String>,
    #[arg(long)]
    organization_id: Option<String>,
    /// Fixed `findInput` entry, `field=value`.
    #[arg(long = "where", value_parser = parse_pair)]
    base_where: Vec<(String, String)>,
    #[arg(long = "eq", value_parser = parse_pair)]
    equals: Vec<(String, String)>,
    #[arg(long, value_parser = parse_pair)]
    contains: Vec<(String, String)>,
    /// `field=a,b,c`
    #[arg(long = "in", value_parser = parse_pair)]
    one_of: Vec<(String, String)>,
    /// `field` or `field:desc`
    #[arg(long, value_parser = parse_sort)]
    sort: Vec<SortSpec>,
    #[arg(long = "relation")]
    relations: Vec<String>,
    #[arg(long, default_value_t = 1)]
    page: i64,
    #[arg(long)]
    page_size: Option<u32>,
    #[arg(long, value_enum, default_value_t = Layout::Table)]
    layout: Layout,
    /// Card pages to accumulate.
    #[arg(long, default_value_t = 1)]
    pages: u32,
}

impl Args {
    fn source_config(&self) -> SourceConfig<Value, Value> {
        let scope = OrganizationScope::new(
            self.tenant_id.as_deref().map(TenantId::from),
            self.organization_id.as_deref().map(OrganizationId::from),
        );
        let mut config = SourceConfig::untransformed(self.endpoint.clone())
            .with_scope(&scope)
            .with_relations(self.relations.iter().cloned());
        for (field, value) in &self.base_where {
            config = config.with_where(field.clone(), parse_scalar(value));
        }
        config
    }

    fn predicates(&self) -> Vec<FilterPredicate> {
        let equals = self
            .equals
            .iter()
            .map(|(field, value)| FilterPredicate::equals(field.clone(), parse_scalar(value)));
        let contains = self
            .contains
            .iter()
            .map(|(field, value)| FilterPredicate::contains(field.clone(), value.clone()));
        let one_of = self.one_of.iter().map(|(field, values)| {
            FilterPredicate::one_of(field.clone(), values.split(',').map(parse_scalar))
        });
        equals.chain(contains).chain(one_of).collect()
    }
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((field, value)) if !field.trim().is_empty() => {
            Ok((field.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected field=value, got '{raw}'")),
    }
}

fn parse_sort(raw: &str) -> Result<SortSpec, String> {
    let (field, direction) = raw.split_once(':').unwrap_or((raw, "asc"));
    if field.trim().is_empty() {
        return Err(format!("missing sort field in '{raw}'"));
    }
    match direction.to_ascii_lowercase().as_str() {
        "asc" => Ok(SortSpec::asc(field.trim())),
        "desc" => Ok(SortSpec::desc(field.trim())),
        other => Err(format!("unknown sort direction '{other}'")),
    }
}

/// Numbers, booleans and null keep their JSON type; anything else is a string.
fn parse_scalar(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ (Value::Number(_) | Value::Bool(_) | Value::Null)) => value,
        _ => Value::String(raw.to_string()),
    }
}

async fn render_next(view: &mut ListView<Value, Value>) -> Result<ViewSnapshot<Value>> {
    loop {
        match view.next_reload().await.context("reload stream closed")? {
            ViewUpdate::Rendered(snapshot) => return Ok(snapshot),
            ViewUpdate::Superseded => continue,
            ViewUpdate::Failed(err) => return Err(err).context("failed to load list page"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(server_url) = &args.server_url {
        settings.server_url = server_url.clone();
    }
    let transport = HttpListTransport::from_settings(&settings)
        .with_context(|| format!("invalid server url '{}'", settings.server_url))?;

    let source = RemoteListSource::new(Arc::new(transport));
    source.configure(args.source_config()).await;

    let mut options = ControllerOptions::from_settings(&settings);
    if let Some(page_size) = args.page_size {
        options.items_per_page = page_size.max(1);
    }
    options.layout = args.layout.into();
    let mut view = ListView::new(source, PaginationFilterController::new(options))?;

    let controller = view.controller_mut();
    for predicate in args.predicates() {
        controller.set_filter(predicate);
    }
    if !args.sort.is_empty() {
        controller.set_sort(args.sort.clone());
    }
    controller.request_reload();
    let mut snapshot = render_next(&mut view).await?;

    match args.layout {
        Layout::Table if args.page > 1 => {
            view.controller_mut().set_page(args.page);
            snapshot = render_next(&mut view).await?;
        }
        Layout::Table => {}
        Layout::Cards => {
            for _ in 1..args.pages {
                let pagination = snapshot.pagination;
                if pagination.active_page >= pagination.last_page() {
                    break;
                }
                view.controller_mut()
                    .set_page(i64::from(pagination.active_page) + 1);
                snapshot = render_next(&mut view).await?;
            }
        }
    }

    info!(
        rows = snapshot.rows.len(),
        total = snapshot.pagination.total_items,
        "list loaded"
    );
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
