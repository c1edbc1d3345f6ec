//! The resource a privilege applies to.
//!
//! The database describes resources as untagged documents. Which kind of
//! resource a document describes is only visible from the fields it carries:
//!
//! ```text
//! { "anyResource": <bool> }
//! { "cluster": <bool> }
//! { "db": <string>, "collection": <string> }
//! { "system_buckets": <string> }
//! ```
//!
//! [`ResourceSpec::from_document`] recovers the variant by probing for these
//! fields in a fixed order.
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use snafu::{OptionExt, ResultExt, Snafu, ensure};

use crate::document::{Document, type_name};

pub const ANY_RESOURCE_FIELD: &str = "anyResource";
pub const CLUSTER_FIELD: &str = "cluster";
pub const DB_FIELD: &str = "db";
pub const COLLECTION_FIELD: &str = "collection";
pub const SYSTEM_BUCKETS_FIELD: &str = "system_buckets";

#[derive(Debug, Snafu)]
pub enum DecodeResourceError {
    #[snafu(display("resource.{field} must be {expected}, got {actual}"))]
    InvalidFieldType {
        field: &'static str,
        expected: &'static str,
        actual: &'static str,
    },

    #[snafu(display("failed to decode resource as database and collection"))]
    MalformedDocument { source: serde_json::Error },
}

/// Specifies what a privilege applies to. Exactly one variant is active.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResourceSpec {
    /// Every resource in the system. Meant for internal use only.
    AnyResource { enabled: bool },

    /// The cluster as a whole.
    Cluster { enabled: bool },

    /// A collection, where empty values act as wildcards:
    ///
    /// - `database` set, `collection` empty: all collections in `database`
    /// - `database` empty, `collection` set: `collection` in every database
    /// - both empty: every non-system collection in every database
    Collection {
        database: String,
        collection: String,
    },

    /// Time series bucket collections matching `pattern`.
    SystemBuckets { pattern: String },
}

#[derive(Deserialize)]
struct CollectionFields {
    #[serde(default)]
    db: String,
    #[serde(default)]
    collection: String,
}

impl ResourceSpec {
    /// Encodes the resource, writing only the fields of the active variant.
    pub fn to_document(&self) -> Document {
        let mut document = Document::new();
        match self {
            Self::AnyResource { enabled } => {
                document.insert(ANY_RESOURCE_FIELD.to_owned(), Value::Bool(*enabled));
            }
            Self::Cluster { enabled } => {
                document.insert(CLUSTER_FIELD.to_owned(), Value::Bool(*enabled));
            }
            Self::Collection {
                database,
                collection,
            } => {
                document.insert(DB_FIELD.to_owned(), Value::from(database.as_str()));
                document.insert(COLLECTION_FIELD.to_owned(), Value::from(collection.as_str()));
            }
            Self::SystemBuckets { pattern } => {
                document.insert(SYSTEM_BUCKETS_FIELD.to_owned(), Value::from(pattern.as_str()));
            }
        }
        document
    }

    /// Decodes a resource document of unknown variant.
    ///
    /// The first matching field wins, in this order: `system_buckets`,
    /// `anyResource`, `cluster`. Documents without any of them are decoded as
    /// a collection.
    pub fn from_document(document: &Document) -> Result<Self, DecodeResourceError> {
        if let Some(value) = document.get(SYSTEM_BUCKETS_FIELD) {
            let pattern = value.as_str().context(InvalidFieldTypeSnafu {
                field: SYSTEM_BUCKETS_FIELD,
                expected: "string",
                actual: type_name(value),
            })?;
            return Ok(Self::SystemBuckets {
                pattern: pattern.to_owned(),
            });
        }

        if let Some(value) = document.get(ANY_RESOURCE_FIELD) {
            let enabled = value.as_bool().context(InvalidFieldTypeSnafu {
                field: ANY_RESOURCE_FIELD,
                expected: "bool",
                actual: type_name(value),
            })?;
            return Ok(Self::AnyResource { enabled });
        }

        if let Some(value) = document.get(CLUSTER_FIELD) {
            let enabled = value.as_bool().context(InvalidFieldTypeSnafu {
                field: CLUSTER_FIELD,
                expected: "bool",
                actual: type_name(value),
            })?;
            return Ok(Self::Cluster { enabled });
        }

        let CollectionFields { db, collection } =
            serde_json::from_value(Value::Object(document.clone()))
                .context(MalformedDocumentSnafu)?;

        Ok(Self::Collection {
            database: db,
            collection,
        })
    }
}

impl Serialize for ResourceSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_document().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ResourceSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let document = Document::deserialize(deserializer)?;
        Self::from_document(&document).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum ResourceConfigError {
    #[snafu(display(
        "no resource selected, set one of: cluster, any_resource, db and collection, system_buckets"
    ))]
    NoResourceSelected,

    #[snafu(display("only one resource can be selected, got: {}", selected.join(", ")))]
    ConflictingResources { selected: Vec<&'static str> },

    #[snafu(display("resource attribute {attribute} must be set to true"))]
    MustBeTrue { attribute: &'static str },

    #[snafu(display("resource attributes db and collection must be set together"))]
    IncompleteCollection,
}

/// The declarative form of a [`ResourceSpec`]: one group of mutually
/// exclusive attributes.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct ResourceState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub any_resource: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_buckets: Option<String>,
}

impl ResourceState {
    /// Picks the variant from the one attribute group that is set.
    pub fn to_spec(&self) -> Result<ResourceSpec, ResourceConfigError> {
        let selected = [
            ("cluster", self.cluster.is_some()),
            ("any_resource", self.any_resource.is_some()),
            (
                "db and collection",
                self.db.is_some() || self.collection.is_some(),
            ),
            ("system_buckets", self.system_buckets.is_some()),
        ]
        .into_iter()
        .filter_map(|(group, is_set)| is_set.then_some(group))
        .collect::<Vec<_>>();

        ensure!(!selected.is_empty(), NoResourceSelectedSnafu);
        ensure!(selected.len() == 1, ConflictingResourcesSnafu { selected });

        let spec = match self {
            Self {
                cluster: Some(enabled),
                ..
            } => {
                ensure!(*enabled, MustBeTrueSnafu { attribute: "cluster" });
                ResourceSpec::Cluster { enabled: true }
            }
            Self {
                any_resource: Some(enabled),
                ..
            } => {
                ensure!(
                    *enabled,
                    MustBeTrueSnafu {
                        attribute: "any_resource"
                    }
                );
                ResourceSpec::AnyResource { enabled: true }
            }
            Self {
                system_buckets: Some(pattern),
                ..
            } => ResourceSpec::SystemBuckets {
                pattern: pattern.clone(),
            },
            Self {
                db: Some(database),
                collection: Some(collection),
                ..
            } => ResourceSpec::Collection {
                database: database.clone(),
                collection: collection.clone(),
            },
            _ => return IncompleteCollectionSnafu.fail(),
        };

        Ok(spec)
    }
}

impl From<&ResourceSpec> for ResourceState {
    fn from(spec: &ResourceSpec) -> Self {
        match spec {
            ResourceSpec::AnyResource { enabled } => Self {
                any_resource: Some(*enabled),
                ..Self::default()
            },
            ResourceSpec::Cluster { enabled } => Self {
                cluster: Some(*enabled),
                ..Self::default()
            },
            ResourceSpec::Collection {
                database,
                collection,
            } => Self {
                db: Some(database.clone()),
                collection: Some(collection.clone()),
                ..Self::default()
            },
            ResourceSpec::SystemBuckets { pattern } => Self {
                system_buckets: Some(pattern.clone()),
                ..Self::default()
            },
        }
    }
}
