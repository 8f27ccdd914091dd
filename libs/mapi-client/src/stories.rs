//! Stories and story folders.

use crate::client::ManagementClient;
use crate::error::ApiError;
use crate::pagination;
use crate::transport::ApiRequest;
use futures::future::try_join_all;
use serde_json::{Value, json};

fn story_path(client: &ManagementClient, id: u64) -> Result<String, ApiError> {
    client.space_path(&format!("/stories/{id}"))
}

fn is_folder(story: &Value) -> bool {
    story.get("is_folder").and_then(Value::as_bool).unwrap_or(false)
}

fn id_of(story: &Value) -> Result<u64, ApiError> {
    story
        .get("id")
        .and_then(Value::as_u64)
        .ok_or(ApiError::MissingField("id"))
}

/// Every story and folder in the space.
///
/// The first page's `total` header decides how many more pages are fetched.
///
/// # Errors
/// Returns the first failing page.
pub async fn get_existing(client: &ManagementClient) -> Result<Vec<Value>, ApiError> {
    let path = client.space_path("/stories")?;
    pagination::fetch_all_by_header(client, &path, "stories").await
}

/// # Errors
/// Returns the transport error; a missing story surfaces as status 404.
pub async fn get_story(client: &ManagementClient, id: u64) -> Result<Value, ApiError> {
    client
        .send(ApiRequest::get(story_path(client, id)?).retry(client.burst_policy()))
        .await?
        .take("story")
}

/// Story whose `full_slug` equals `full_slug`, if any.
///
/// # Errors
/// Returns the transport error.
pub async fn find_by_slug(
    client: &ManagementClient,
    full_slug: &str,
) -> Result<Option<Value>, ApiError> {
    let request = ApiRequest::get(client.space_path("/stories")?)
        .query("with_slug", full_slug)
        .retry(client.burst_policy());
    let stories = client.send(request).await?.take_list("stories")?;
    // A folder's startpage differs from the folder only by a trailing slash.
    let wanted = full_slug.trim_start_matches('/');
    Ok(stories.into_iter().find(|story| {
        story
            .get("full_slug")
            .and_then(Value::as_str)
            .is_some_and(|slug| slug.trim_start_matches('/') == wanted)
    }))
}

/// # Errors
/// Returns the transport error, e.g. 422 for a duplicate slug.
pub async fn create_story(client: &ManagementClient, story: Value) -> Result<Value, ApiError> {
    let request = ApiRequest::post(client.space_path("/stories")?, json!({ "story": story }))
        .retry(client.burst_policy());
    client.send(request).await?.take("story")
}

/// Replace story `id`, publishing it in the same call when `publish` is set.
///
/// # Errors
/// Returns the transport error.
pub async fn update_story(
    client: &ManagementClient,
    id: u64,
    story: Value,
    publish: bool,
) -> Result<Value, ApiError> {
    let mut body = json!({ "story": story, "force_update": 1 });
    if publish {
        body["publish"] = json!(1);
    }
    let request = ApiRequest::put(story_path(client, id)?, body).retry(client.burst_policy());
    client.send(request).await?.take("story")
}

/// # Errors
/// Returns the transport error.
pub async fn publish_story(client: &ManagementClient, id: u64) -> Result<Value, ApiError> {
    let path = client.space_path(&format!("/stories/{id}/publish"))?;
    client
        .send(ApiRequest::get(path).retry(client.burst_policy()))
        .await?
        .take("story")
}

/// # Errors
/// Returns the transport error.
pub async fn delete_story(client: &ManagementClient, id: u64) -> Result<(), ApiError> {
    client
        .send(ApiRequest::delete(story_path(client, id)?).retry(client.burst_policy()))
        .await?;
    Ok(())
}

/// Delete every story in the space. Returns the number of delete calls.
///
/// Only top-level entries are deleted; removing a folder removes its
/// contents.
///
/// # Errors
/// Returns the first failing delete.
pub async fn delete_all_stories(client: &ManagementClient) -> Result<usize, ApiError> {
    let stories = get_existing(client).await?;
    let ids = stories
        .iter()
        .filter(|story| story.get("parent_id").and_then(Value::as_u64).unwrap_or(0) == 0)
        .map(id_of)
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(count = ids.len(), "deleting stories");
    try_join_all(ids.iter().map(|&id| delete_story(client, id))).await?;
    Ok(ids.len())
}

/// Publish every story that is not a folder. Returns the number published.
///
/// # Errors
/// Returns the first failing publish.
pub async fn publish_all_stories(client: &ManagementClient) -> Result<usize, ApiError> {
    let stories = get_existing(client).await?;
    let ids = stories
        .iter()
        .filter(|story| !is_folder(story))
        .map(id_of)
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(count = ids.len(), "publishing stories");
    try_join_all(ids.iter().map(|&id| publish_story(client, id))).await?;
    Ok(ids.len())
}
