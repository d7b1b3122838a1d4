//! Dashboards: listing, deletion, duplication with table remapping.
//!
//! A dashboard's state is base64-encoded JSON; its metadata is plain JSON
//! whose `table` entry is a comma-separated list of source tables.

use super::Connection;
use crate::error::{MapdError, MapdResult};
use crate::rpc::{Dashboard, MapdClient};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;
use tracing::info;

/// New name and title for one source table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapTarget {
    pub name: Option<String>,
    pub title: Option<String>,
}

impl RemapTarget {
    pub fn to(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Old table name → replacement.
pub type Remap = BTreeMap<String, RemapTarget>;

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}

/// Replace `obj[key]` with `new` when it equals `old`.
fn swap(obj: &mut Json, key: &str, old: &str, new: &str) {
    if let Some(slot) = obj.get_mut(key)
        && slot.as_str() == Some(old)
    {
        *slot = Json::String(new.to_string());
    }
}

fn each_mut<'a>(obj: &'a mut Json, key: &str) -> impl Iterator<Item = &'a mut Json> {
    obj.get_mut(key)
        .and_then(Json::as_array_mut)
        .into_iter()
        .flat_map(|items| items.iter_mut())
}

fn remap_chart(chart: &mut Json, old: &str, new: &str) {
    swap(chart, "dataSource", old, new);
    for dim in each_mut(chart, "dimensions") {
        swap(dim, "table", old, new);
        if let Some(selector) = dim.get_mut("selector") {
            swap(selector, "table", old, new);
        }
    }
    for measure in each_mut(chart, "measures") {
        swap(measure, "table", old, new);
    }
    for layer in each_mut(chart, "layers") {
        swap(layer, "dataSource", old, new);
        for measure in each_mut(layer, "measures") {
            swap(measure, "table", old, new);
        }
    }
}

fn remap_state(state: &mut Json, old: &str, target: &RemapTarget) -> MapdResult<()> {
    let new = non_empty(&target.name).unwrap_or(old);
    let dashboard = state
        .get_mut("dashboard")
        .filter(|d| d.is_object())
        .ok_or_else(|| MapdError::Serialization("dashboard state has no 'dashboard' object".to_string()))?;

    swap(dashboard, "table", old, new);
    if let Some(title) = non_empty(&target.title) {
        dashboard["title"] = Json::String(title.to_string());
    }

    if let Some(sources) = dashboard.get_mut("dataSources").and_then(Json::as_object_mut) {
        for source in sources.values_mut() {
            for col in each_mut(source, "columnMetadata") {
                swap(col, "table", old, new);
            }
        }
        if let Some(moved) = sources.remove(old) {
            sources.insert(new.to_string(), moved);
        }
    }

    if let Some(charts) = state.get_mut("charts").and_then(Json::as_object_mut) {
        for chart in charts.values_mut() {
            remap_chart(chart, old, new);
        }
    }
    Ok(())
}

/// Point a dashboard at different source tables.
///
/// Rewrites the metadata table list and every table reference in the
/// state: the dashboard's own table, data source column metadata, chart
/// data sources, dimensions, selectors, measures and layers. Titles are
/// replaced when the target names one.
pub fn change_dashboard_sources(dashboard: &Dashboard, remap: &Remap) -> MapdResult<Dashboard> {
    let mut metadata: Json = if dashboard.dashboard_metadata.trim().is_empty() {
        Json::Object(Map::new())
    } else {
        serde_json::from_str(&dashboard.dashboard_metadata)?
    };
    let tables = metadata
        .get("table")
        .and_then(Json::as_str)
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .map(|t| {
            remap
                .get(t)
                .and_then(|r| non_empty(&r.name))
                .unwrap_or(t)
                .to_string()
        })
        .collect::<Vec<_>>()
        .join(", ");
    match metadata.as_object_mut() {
        Some(obj) => {
            obj.insert("table".to_string(), Json::String(tables));
        }
        None => {
            return Err(MapdError::Serialization(
                "dashboard metadata is not a JSON object".to_string(),
            ));
        }
    }

    let decoded = STANDARD.decode(dashboard.dashboard_state.trim())?;
    let mut state: Json = serde_json::from_slice(&decoded)?;
    for (old, target) in remap {
        remap_state(&mut state, old, target)?;
    }

    Ok(Dashboard {
        dashboard_state: STANDARD.encode(serde_json::to_vec(&state)?),
        dashboard_metadata: serde_json::to_string(&metadata)?,
        ..dashboard.clone()
    })
}

impl<C: MapdClient> Connection<C> {
    pub fn get_dashboards(&mut self) -> MapdResult<Vec<Dashboard>> {
        self.call(|c, s| c.get_dashboards(s))
    }

    pub fn get_dashboard(&mut self, dashboard_id: i32) -> MapdResult<Dashboard> {
        self.call(|c, s| c.get_dashboard(s, dashboard_id))
    }

    pub fn delete_dashboard(&mut self, dashboard_id: i32) -> MapdResult<()> {
        self.call(|c, s| c.delete_dashboard(s, dashboard_id))
    }

    /// Copy a dashboard, optionally renaming it and remapping its sources.
    /// The copy is named `"<name> (Copy)"` unless `new_name` is given.
    /// Returns the new dashboard id.
    pub fn duplicate_dashboard(
        &mut self,
        dashboard_id: i32,
        new_name: Option<&str>,
        remap: Option<&Remap>,
    ) -> MapdResult<i32> {
        let source = self.get_dashboard(dashboard_id)?;
        let name = new_name
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} (Copy)", source.dashboard_name));
        let copy = match remap {
            Some(remap) => change_dashboard_sources(&source, remap)?,
            None => source,
        };
        let id = self.call(|c, s| {
            c.create_dashboard(s, &name, &copy.dashboard_state, "", &copy.dashboard_metadata)
        })?;
        info!(target: "dashboard", from = dashboard_id, to = id, "duplicated dashboard");
        Ok(id)
    }
}
