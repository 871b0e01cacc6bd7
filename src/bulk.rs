//! Bulk loading of many resource paths
//!
//! All paths are resolved in one batched catalog lookup, then fetched and
//! decoded one after another. The first failure aborts the whole load.

use crate::endpoints::{CatalogsClient, DataClient};
use crate::error::{Error, Result};
use crate::frame;
use crate::transport::check_canceled;
use crate::types::DataResponse;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Callback receiving the cumulative load progress in (0, 1]
pub type LoadProgress<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// Loads and decodes the data of many resource paths
#[derive(Clone)]
pub struct BulkLoader {
    catalogs: CatalogsClient,
    data: DataClient,
}

impl BulkLoader {
    /// Create a loader over the catalog and data endpoints
    pub fn new(catalogs: CatalogsClient, data: DataClient) -> Self {
        Self { catalogs, data }
    }

    /// Load `[begin, end)` for every resource path
    ///
    /// Duplicate paths are loaded once. After each resource, progress advances
    /// by `1/N` and `on_progress` is invoked; the final report is exactly `1.0`.
    pub async fn load(
        &self,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
        resource_paths: &[String],
        on_progress: Option<LoadProgress<'_>>,
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, DataResponse>> {
        check_canceled(cancel)?;

        let mut seen = HashSet::new();
        let mut paths = Vec::with_capacity(resource_paths.len());
        for path in resource_paths {
            if seen.insert(path.as_str()) {
                paths.push(path.clone());
            }
        }

        let mut result = HashMap::with_capacity(paths.len());
        if paths.is_empty() {
            return Ok(result);
        }

        let mut catalog_items = self.catalogs.search_catalog_items(&paths, cancel).await?;
        let total = paths.len();

        for (index, path) in paths.into_iter().enumerate() {
            let catalog_item = catalog_items
                .remove(&path)
                .ok_or_else(|| Error::MissingCatalogItem(path.clone()))?;

            let response = self.data.get_stream(&path, &begin, &end, cancel).await?;
            let values = frame::decode_response(response).await?;
            debug!(resource_path = %path, samples = values.len(), "resource loaded");

            let resource = &catalog_item.resource;
            let data = DataResponse {
                name: resource.id.clone(),
                unit: resource.string_property("unit"),
                description: resource.string_property("description"),
                sample_period: catalog_item.representation.sample_period,
                values,
                catalog_item,
            };
            result.insert(path, data);

            if let Some(on_progress) = on_progress {
                // cumulative k/N; the last report is exactly 1.0
                on_progress((index + 1) as f64 / total as f64);
            }
        }

        Ok(result)
    }
}
