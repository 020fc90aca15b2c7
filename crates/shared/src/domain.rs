use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(TenantId);
id_newtype!(OrganizationId);

/// How a list view renders its rows, which also decides the fetch mode:
/// tables replace the page on every load, card grids accumulate pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutStyle {
    #[default]
    Table,
    CardGrid,
}

impl LayoutStyle {
    pub fn accumulates_rows(self) -> bool {
        matches!(self, LayoutStyle::CardGrid)
    }
}

/// Tenant/organization scoping applied to every request of a list view.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrganizationScope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<OrganizationId>,
}

impl OrganizationScope {
    pub fn new(tenant_id: Option<TenantId>, organization_id: Option<OrganizationId>) -> Self {
        Self {
            tenant_id,
            organization_id,
        }
    }

    /// Base `findInput` entries for this scope, keyed the way the REST API expects.
    pub fn to_base_where(&self) -> Map<String, Value> {
        let mut base = Map::new();
        if let Some(tenant_id) = &self.tenant_id {
            base.insert("tenantId".into(), Value::String(tenant_id.0.clone()));
        }
        if let Some(organization_id) = &self.organization_id {
            base.insert(
                "organizationId".into(),
                Value::String(organization_id.0.clone()),
            );
        }
        base
    }
}
