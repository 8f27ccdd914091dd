//! Component schemas.

use crate::client::ManagementClient;
use crate::error::ApiError;
use crate::transport::ApiRequest;
use futures::future::try_join_all;
use serde_json::{Value, json};

fn component_path(client: &ManagementClient, id: u64) -> Result<String, ApiError> {
    client.space_path(&format!("/components/{id}"))
}

/// All components of the space. The endpoint is not paged.
///
/// # Errors
/// Returns the transport error.
pub async fn get_existing(client: &ManagementClient) -> Result<Vec<Value>, ApiError> {
    client
        .send(ApiRequest::get(client.space_path("/components")?).retry(client.burst_policy()))
        .await?
        .take_list("components")
}

/// # Errors
/// Returns the transport error.
pub async fn get_component(client: &ManagementClient, id: u64) -> Result<Value, ApiError> {
    client
        .send(ApiRequest::get(component_path(client, id)?).retry(client.burst_policy()))
        .await?
        .take("component")
}

/// # Errors
/// Returns the transport error.
pub async fn create_component(
    client: &ManagementClient,
    component: Value,
) -> Result<Value, ApiError> {
    let request = ApiRequest::post(
        client.space_path("/components")?,
        json!({ "component": component }),
    )
    .retry(client.burst_policy());
    client.send(request).await?.take("component")
}

/// # Errors
/// Returns the transport error.
pub async fn update_component(
    client: &ManagementClient,
    id: u64,
    component: Value,
) -> Result<Value, ApiError> {
    let request = ApiRequest::put(component_path(client, id)?, json!({ "component": component }))
        .retry(client.burst_policy());
    client.send(request).await?.take("component")
}

/// # Errors
/// Returns the transport error.
pub async fn delete_component(client: &ManagementClient, id: u64) -> Result<(), ApiError> {
    client
        .send(ApiRequest::delete(component_path(client, id)?).retry(client.burst_policy()))
        .await?;
    Ok(())
}

/// Delete every component. Returns the number deleted.
///
/// # Errors
/// Returns the first failing delete.
pub async fn delete_all_components(client: &ManagementClient) -> Result<usize, ApiError> {
    let ids = get_existing(client)
        .await?
        .iter()
        .map(|c| c.get("id").and_then(Value::as_u64).ok_or(ApiError::MissingField("id")))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(count = ids.len(), "deleting components");
    try_join_all(ids.iter().map(|&id| delete_component(client, id))).await?;
    Ok(ids.len())
}

/// Create `component`, or update the existing component with the same `name`.
///
/// # Errors
/// Returns `ApiError::MissingField` when `component` has no name, or the
/// transport error.
pub async fn sync_component(
    client: &ManagementClient,
    component: Value,
) -> Result<Value, ApiError> {
    let name = component
        .get("name")
        .and_then(Value::as_str)
        .ok_or(ApiError::MissingField("name"))?;

    let existing = get_existing(client).await?.into_iter().find(|c| {
        c.get("name").and_then(Value::as_str) == Some(name)
    });

    match existing.as_ref().and_then(|c| c.get("id")).and_then(Value::as_u64) {
        Some(id) => {
            tracing::debug!(name, id, "updating existing component");
            update_component(client, id, component).await
        }
        None => {
            tracing::debug!(name, "creating component");
            create_component(client, component).await
        }
    }
}
