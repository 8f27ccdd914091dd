//! Spaces: the only resource reachable without a space id.

use crate::client::ManagementClient;
use crate::error::ApiError;
use crate::transport::ApiRequest;
use serde_json::{Value, json};

/// All spaces visible to the token.
///
/// # Errors
/// Returns the transport error or a missing `spaces` envelope.
pub async fn list_spaces(client: &ManagementClient) -> Result<Vec<Value>, ApiError> {
    client
        .send(ApiRequest::get("/").retry(client.burst_policy()))
        .await?
        .take_list("spaces")
}

/// The configured space.
///
/// # Errors
/// Returns `ApiError::MissingSpaceId` or the transport error.
pub async fn get_space(client: &ManagementClient) -> Result<Value, ApiError> {
    client
        .send(ApiRequest::get(client.space_path("")?).retry(client.burst_policy()))
        .await?
        .take("space")
}

/// Update settings of the configured space.
///
/// # Errors
/// Returns `ApiError::MissingSpaceId` or the transport error.
pub async fn update_space(client: &ManagementClient, space: Value) -> Result<Value, ApiError> {
    let request = ApiRequest::put(client.space_path("")?, json!({ "space": space }))
        .retry(client.burst_policy());
    client.send(request).await?.take("space")
}

/// Number of assets in the configured space, as reported by the space info.
///
/// # Errors
/// Returns the transport error, or `ApiError::MissingField` when the count
/// is absent.
pub async fn assets_count(client: &ManagementClient) -> Result<u64, ApiError> {
    get_space(client)
        .await?
        .get("assets_count")
        .and_then(Value::as_u64)
        .ok_or(ApiError::MissingField("assets_count"))
}
