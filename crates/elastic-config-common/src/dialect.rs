//! Remote cluster dialect (Elasticsearch or OpenSearch)

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// API flavor spoken by a target search cluster
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Elasticsearch (ILM, SLM)
    #[default]
    Elasticsearch,
    /// OpenSearch (ISM, snapshot management plugin)
    Opensearch,
}

/// Distribution marker reported by OpenSearch in `version.distribution`
const OPENSEARCH_DISTRIBUTION: &str = "opensearch";

impl Dialect {
    /// Classify a cluster from the `version.distribution` field of its info document.
    ///
    /// Only the literal `"opensearch"` selects OpenSearch; a missing or any
    /// other value is treated as Elasticsearch.
    pub fn from_distribution(distribution: Option<&str>) -> Self {
        match distribution {
            Some(OPENSEARCH_DISTRIBUTION) => Dialect::Opensearch,
            _ => Dialect::Elasticsearch,
        }
    }

    /// Lowercase name as used in CRDs and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Elasticsearch => "elasticsearch",
            Dialect::Opensearch => "opensearch",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "elasticsearch" => Ok(Dialect::Elasticsearch),
            "opensearch" => Ok(Dialect::Opensearch),
            other => Err(format!("invalid cluster type: {other}")),
        }
    }
}
