//! Cluster settings
//!
//! Record resources are keyed by category (`persistent`, `transient`), each
//! holding a settings object. For diffing, settings are tracked individually as
//! `category.setting.path`. A category is applied in one request. Removed
//! settings are reset with one request per category that sets just those
//! paths to `null`, so settings the record never owned are left alone.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use elastic_config_common::crd::ConfigKind;
use elastic_config_common::Error;
use elastic_config_connection::{ClusterConnection, RemoteRequest};

use super::{send_checked, KindAdapter};

const SETTINGS_PATH: &[&str] = &["_cluster", "settings"];

/// Adapter for `/_cluster/settings`
#[derive(Clone, Copy, Debug, Default)]
pub struct ClusterSettingsAdapter;

/// Flatten a settings object into dotted paths.
///
/// `{"cluster": {"routing": {"allocation.enable": "all"}}}` yields
/// `["cluster.routing.allocation.enable"]`. Arrays and scalars are leaves.
pub fn flatten_settings(settings: &Map<String, Value>) -> Vec<String> {
    let mut paths = Vec::new();
    collect_paths(None, settings, &mut paths);
    paths
}

fn collect_paths(prefix: Option<&str>, settings: &Map<String, Value>, out: &mut Vec<String>) {
    for (key, value) in settings {
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(nested) if !nested.is_empty() => collect_paths(Some(&path), nested, out),
            _ => out.push(path),
        }
    }
}

fn category_settings<'a>(category: &str, body: &'a Value) -> Result<&'a Map<String, Value>, Error> {
    body.as_object().ok_or_else(|| {
        Error::configuration(format!("settings for category {category} must be an object"))
    })
}

/// Group `category.setting.path` names into `{path: null}` objects per category
fn reset_bodies(names: &[String]) -> Result<BTreeMap<String, Map<String, Value>>, Error> {
    let mut bodies: BTreeMap<String, Map<String, Value>> = BTreeMap::new();
    for name in names {
        let (category, setting) = name.split_once('.').ok_or_else(|| {
            Error::configuration(format!(
                "invalid applied setting {name}: expected category.setting"
            ))
        })?;
        bodies
            .entry(category.to_string())
            .or_default()
            .insert(setting.to_string(), Value::Null);
    }
    Ok(bodies)
}

#[async_trait]
impl KindAdapter for ClusterSettingsAdapter {
    fn kind(&self) -> ConfigKind {
        ConfigKind::ClusterSettings
    }

    async fn apply(
        &self,
        connection: &ClusterConnection,
        category: &str,
        body: &Value,
    ) -> Result<(), Error> {
        category_settings(category, body)?;
        send_checked(connection, RemoteRequest::put(SETTINGS_PATH, json!({ category: body }))).await?;
        Ok(())
    }

    /// Reset one `category.setting.path` to its default
    async fn delete(&self, connection: &ClusterConnection, name: &str) -> Result<(), Error> {
        self.delete_all(connection, &[name.to_string()]).await
    }

    /// Reset every path, one request per category
    async fn delete_all(&self, connection: &ClusterConnection, names: &[String]) -> Result<(), Error> {
        for (category, settings) in reset_bodies(names)? {
            send_checked(
                connection,
                RemoteRequest::put(SETTINGS_PATH, json!({ category: settings })),
            )
            .await?;
        }
        Ok(())
    }

    fn applied_names(&self, desired: &BTreeMap<String, Value>) -> Result<Vec<String>, Error> {
        let mut names = BTreeSet::new();
        for (category, body) in desired {
            let settings = category_settings(category, body)?;
            names.extend(
                flatten_settings(settings)
                    .into_iter()
                    .map(|path| format!("{category}.{path}")),
            );
        }
        Ok(names.into_iter().collect())
    }

    /// Only settings this record is known to have written
    fn deletion_units(&self, _desired: &BTreeMap<String, Value>, last_applied: &[String]) -> Vec<String> {
        let units: BTreeSet<&String> = last_applied.iter().collect();
        units.into_iter().cloned().collect()
    }
}
