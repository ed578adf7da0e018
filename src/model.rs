//! Policy domain types.
//!
//! A [`Service`] owns two ordered collections of sub-documents, [`Policy`]
//! and [`RolePolicy`], plus string metadata. Sub-documents are addressed by a
//! server-generated `id` that is unique within one service's collection.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Service type for application services.
pub const SERVICE_TYPE_APPLICATION: &str = "application";
/// Service type for Kubernetes cluster services.
pub const SERVICE_TYPE_K8S_CLUSTER: &str = "k8s-cluster";

/// Generate a fresh sub-document id.
pub fn new_document_id() -> String {
    Uuid::new_v4().to_string()
}

/// Treat an explicit JSON `null` as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Grant or deny.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    #[default]
    Grant,
    Deny,
}

/// Actions allowed on a resource (or resource expression).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_expression: String,
    #[serde(default)]
    pub actions: Vec<String>,
}

/// Access policy.
///
/// `principals` is a list of AND-groups: the policy matches when every
/// principal in at least one group is present.
///
/// Payloads round-trip at the struct level, not byte for byte: empty
/// collections and empty strings are omitted when serialized, and a missing
/// `effect` reads back as `grant`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub effect: Effect,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<Permission>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub principals: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub condition: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obligations: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Fields this crate does not model, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Role policy: binds principals to roles.
///
/// Serialized the same way as [`Policy`]: empty fields are omitted and
/// `effect` defaults to `grant`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolePolicy {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub effect: Effect,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub principals: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_expressions: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub condition: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Parent entity. Field names match the columns of the services table so a
/// row serialized by the database decodes directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    #[serde(rename = "type", default)]
    pub service_type: String,
    #[serde(default)]
    pub policies: Vec<Policy>,
    #[serde(default)]
    pub role_policies: Vec<RolePolicy>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: BTreeMap<String, String>,
}

impl Service {
    /// Create an empty service of the given type.
    pub fn new(name: impl Into<String>, service_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service_type: service_type.into(),
            ..Default::default()
        }
    }
}

/// Per-service collection sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyAndRolePolicyCount {
    pub policy_count: i64,
    pub role_policy_count: i64,
}

/// Custom evaluation function. Storage for functions is not provided by this
/// crate; see [`crate::interfaces::FunctionStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Function {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "funcURL", default)]
    pub func_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ca: String,
    #[serde(default)]
    pub result_cachable: bool,
    #[serde(default)]
    pub result_ttl: i64,
}

/// Whole-store image used for bulk import and export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub functions: Vec<Function>,
}

/// An id-keyed element stored inside one of a service's array columns.
pub trait SubDocument: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Entity name used in errors and logs.
    const KIND: &'static str;
    /// Array column holding this kind of document.
    const COLUMN: &'static str;

    fn id(&self) -> &str;

    /// Replace the id. Any `id` key carried in unmodelled fields is dropped,
    /// so the assigned id is the only one serialized.
    fn set_id(&mut self, id: String);

    /// The owning service's collection of this kind.
    fn collection(service: &Service) -> &Vec<Self>;
    fn collection_mut(service: &mut Service) -> &mut Vec<Self>;
}

impl SubDocument for Policy {
    const KIND: &'static str = "policy";
    const COLUMN: &'static str = "policies";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.extra.remove("id");
        self.id = id;
    }

    fn collection(service: &Service) -> &Vec<Self> {
        &service.policies
    }

    fn collection_mut(service: &mut Service) -> &mut Vec<Self> {
        &mut service.policies
    }
}

impl SubDocument for RolePolicy {
    const KIND: &'static str = "role policy";
    const COLUMN: &'static str = "role_policies";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.extra.remove("id");
        self.id = id;
    }

    fn collection(service: &Service) -> &Vec<Self> {
        &service.role_policies
    }

    fn collection_mut(service: &mut Service) -> &mut Vec<Self> {
        &mut service.role_policies
    }
}
