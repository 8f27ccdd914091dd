//! Assets: listing, registration, upload and deletion.

use crate::client::ManagementClient;
use crate::error::ApiError;
use crate::pagination;
use crate::spaces;
use crate::transport::ApiRequest;
use crate::upload::AssetSigningResponse;
use futures::future::try_join_all;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

/// Body of an asset registration request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssetRegistration {
    pub filename: String,
    /// `WIDTHxHEIGHT`, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_folder_id: Option<u64>,
}

impl AssetRegistration {
    #[must_use]
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = Some(format!("{width}x{height}"));
        self
    }

    #[must_use]
    pub fn in_folder(mut self, folder_id: Option<u64>) -> Self {
        self.asset_folder_id = folder_id;
        self
    }
}

/// How a local file becomes an asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssetOptions {
    pub folder_id: Option<u64>,
    pub compress: bool,
    /// Longest edge in pixels; larger images are scaled down by the processor
    pub dimension_limit: Option<u32>,
}

fn asset_path(client: &ManagementClient, id: u64) -> Result<String, ApiError> {
    client.space_path(&format!("/assets/{id}"))
}

/// Every asset in the space.
///
/// The page count comes from the space's `assets_count`.
///
/// # Errors
/// Returns the first failing request.
pub async fn get_existing(client: &ManagementClient) -> Result<Vec<Value>, ApiError> {
    let total = spaces::assets_count(client).await?;
    let path = client.space_path("/assets")?;
    pagination::fetch_all_by_total(client, &path, "assets", total).await
}

/// A single asset. The endpoint returns the asset without an envelope.
///
/// # Errors
/// Returns the transport error.
pub async fn get_asset(client: &ManagementClient, id: u64) -> Result<Value, ApiError> {
    Ok(client
        .send(ApiRequest::get(asset_path(client, id)?).retry(client.burst_policy()))
        .await?
        .body)
}

/// Register an upload and obtain its signed storage target.
///
/// Uses the extended retry budget.
///
/// # Errors
/// Returns the transport error or an unparsable signing response.
pub async fn register_asset(
    client: &ManagementClient,
    registration: &AssetRegistration,
) -> Result<AssetSigningResponse, ApiError> {
    let body = serde_json::to_value(registration)?;
    let request =
        ApiRequest::post(client.space_path("/assets")?, body).retry(client.extended_policy());
    let response = client.send(request).await?;
    Ok(serde_json::from_value(response.body)?)
}

/// Register, process and upload the file at `path`. Returns its pretty URL.
///
/// # Errors
/// Returns `ApiError::Io` for an unreadable file, `ApiError::Image` from the
/// processor, or the registration or upload error.
pub async fn create_asset(
    client: &ManagementClient,
    path: &Path,
    options: AssetOptions,
) -> Result<String, ApiError> {
    let filename = path
        .file_name()
        .and_then(std::ffi::OsStr::to_str)
        .ok_or_else(|| ApiError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
        })?;

    let registration = AssetRegistration::new(filename).in_folder(options.folder_id);
    let signed = register_asset(client, &registration).await?;
    let buffer = client
        .image_processor()
        .process(path, options.compress, options.dimension_limit)
        .await?;

    tracing::debug!(filename, bytes = buffer.len(), "uploading asset");
    client.uploader().upload(buffer, &signed).await
}

/// Delete an asset. An asset that is already gone counts as deleted.
///
/// # Errors
/// Returns any failure other than 404.
pub async fn delete_asset(client: &ManagementClient, id: u64) -> Result<(), ApiError> {
    let request = ApiRequest::delete(asset_path(client, id)?).retry(client.burst_policy());
    match client.send(request).await {
        Ok(_) => Ok(()),
        Err(err) if err.is_not_found() => {
            tracing::warn!(asset_id = id, "asset not found; treating delete as done");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// Delete every asset. Returns the number of delete calls.
///
/// # Errors
/// Returns the first failing delete.
pub async fn delete_all_assets(client: &ManagementClient) -> Result<usize, ApiError> {
    let ids = get_existing(client)
        .await?
        .iter()
        .map(|a| a.get("id").and_then(Value::as_u64).ok_or(ApiError::MissingField("id")))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(count = ids.len(), "deleting assets");
    try_join_all(ids.iter().map(|&id| delete_asset(client, id))).await?;
    Ok(ids.len())
}
