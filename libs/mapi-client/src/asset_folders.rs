//! Asset folders.

use crate::client::ManagementClient;
use crate::error::ApiError;
use crate::transport::ApiRequest;
use futures::future::try_join_all;
use serde_json::{Value, json};

fn folder_path(client: &ManagementClient, id: u64) -> Result<String, ApiError> {
    client.space_path(&format!("/asset_folders/{id}"))
}

/// # Errors
/// Returns the transport error.
pub async fn get_existing(client: &ManagementClient) -> Result<Vec<Value>, ApiError> {
    client
        .send(ApiRequest::get(client.space_path("/asset_folders")?).retry(client.burst_policy()))
        .await?
        .take_list("asset_folders")
}

/// # Errors
/// Returns the transport error.
pub async fn get_folder(client: &ManagementClient, id: u64) -> Result<Value, ApiError> {
    client
        .send(ApiRequest::get(folder_path(client, id)?).retry(client.burst_policy()))
        .await?
        .take("asset_folder")
}

/// Create a folder, nested under `parent_id` when given.
///
/// # Errors
/// Returns the transport error.
pub async fn create_folder(
    client: &ManagementClient,
    name: &str,
    parent_id: Option<u64>,
) -> Result<Value, ApiError> {
    let mut folder = json!({ "name": name });
    if let Some(parent_id) = parent_id {
        folder["parent_id"] = json!(parent_id);
    }
    let request = ApiRequest::post(
        client.space_path("/asset_folders")?,
        json!({ "asset_folder": folder }),
    )
    .retry(client.burst_policy());
    client.send(request).await?.take("asset_folder")
}

/// Rename or move a folder.
///
/// The endpoint answers with an empty body, so nothing is returned.
///
/// # Errors
/// Returns the transport error.
pub async fn update_folder(
    client: &ManagementClient,
    id: u64,
    folder: Value,
) -> Result<(), ApiError> {
    let request = ApiRequest::put(folder_path(client, id)?, json!({ "asset_folder": folder }))
        .retry(client.burst_policy());
    client.send(request).await?;
    Ok(())
}

/// # Errors
/// Returns the transport error.
pub async fn delete_folder(client: &ManagementClient, id: u64) -> Result<(), ApiError> {
    client
        .send(ApiRequest::delete(folder_path(client, id)?).retry(client.burst_policy()))
        .await?;
    Ok(())
}

/// Delete every top-level folder. Returns the number deleted.
///
/// Nested folders go with their parent.
///
/// # Errors
/// Returns the first failing delete.
pub async fn delete_all_folders(client: &ManagementClient) -> Result<usize, ApiError> {
    let ids = get_existing(client)
        .await?
        .iter()
        .filter(|f| f.get("parent_id").and_then(Value::as_u64).unwrap_or(0) == 0)
        .map(|f| f.get("id").and_then(Value::as_u64).ok_or(ApiError::MissingField("id")))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(count = ids.len(), "deleting asset folders");
    try_join_all(ids.iter().map(|&id| delete_folder(client, id))).await?;
    Ok(ids.len())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::client::test_support::client;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn create_nested_folder() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(Method::POST)
                .path("/v1/spaces/12345/asset_folders")
                .json_body(json!({ "asset_folder": { "name": "Heroes", "parent_id": 3 } }));
            then.status(201).json_body(json!({
                "asset_folder": { "id": 8, "name": "Heroes", "parent_id": 3 }
            }));
        });

        let folder = create_folder(&client(&server), "Heroes", Some(3)).await.unwrap();
        assert_eq!(mock.calls(), 1);
        assert_eq!(folder["id"], 8);
    }

    #[tokio::test]
    async fn update_accepts_empty_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(Method::PUT).path("/v1/spaces/12345/asset_folders/8");
            then.status(204);
        });

        update_folder(&client(&server), 8, json!({ "name": "Renamed" }))
            .await
            .unwrap();
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn delete_all_only_touches_top_level() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(Method::GET).path("/v1/spaces/12345/asset_folders");
            then.status(200).json_body(json!({
                "asset_folders": [
                    { "id": 1, "parent_id": null },
                    { "id": 2, "parent_id": 1 },
                    { "id": 3, "parent_id": 0 }
                ]
            }));
        });
        let deletes = server.mock(|when, then| {
            when.method(Method::DELETE).path_includes("/asset_folders/");
            then.status(204);
        });

        assert_eq!(delete_all_folders(&client(&server)).await.unwrap(), 2);
        assert_eq!(deletes.calls(), 2);
    }
}
