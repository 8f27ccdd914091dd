//! Page fan-out for list endpoints.
//!
//! The page count is `ceil(total / per_page)`; pages are requested
//! concurrently and concatenated in page order. The first failing page fails
//! the whole listing.

use crate::client::ManagementClient;
use crate::error::ApiError;
use crate::transport::{ApiRequest, ApiResponse};
use futures::future::try_join_all;
use serde_json::Value;

/// Number of pages needed for `total` items.
#[must_use]
pub fn page_count(total: u64, per_page: u32) -> u32 {
    if per_page == 0 {
        return 0;
    }
    u32::try_from(total.div_ceil(u64::from(per_page))).unwrap_or(u32::MAX)
}

fn page_request(client: &ManagementClient, path: &str, page: u32, per_page: u32) -> ApiRequest {
    ApiRequest::get(path)
        .query("per_page", per_page.to_string())
        .query("page", page.to_string())
        .retry(client.burst_policy())
}

/// Fetch pages `first..=last` of `path` and concatenate the `key` arrays.
///
/// # Errors
/// Returns the first page failure.
pub async fn fetch_pages(
    client: &ManagementClient,
    path: &str,
    key: &'static str,
    first: u32,
    last: u32,
) -> Result<Vec<Value>, ApiError> {
    let per_page = client.max_per_page();
    let pages = try_join_all((first..=last).map(move |page| async move {
        client
            .transport()
            .send(page_request(client, path, page, per_page))
            .await?
            .take_list(key)
    }))
    .await?;
    Ok(pages.into_iter().flatten().collect())
}

/// Fetch every page when the total is only known from the first page's
/// `total` header.
///
/// # Errors
/// Returns the first page failure.
pub async fn fetch_all_by_header(
    client: &ManagementClient,
    path: &str,
    key: &'static str,
) -> Result<Vec<Value>, ApiError> {
    let per_page = client.max_per_page();
    let first: ApiResponse = client
        .transport()
        .send(page_request(client, path, 1, per_page))
        .await?;
    let total = first.total;
    let mut items = first.take_list(key)?;

    let pages = total.map_or(1, |total| page_count(total, per_page));
    tracing::debug!(path, ?total, pages, "listing pages");
    if pages > 1 {
        items.extend(fetch_pages(client, path, key, 2, pages).await?);
    }
    Ok(items)
}

/// Fetch every page of a listing whose size is known up front.
///
/// # Errors
/// Returns the first page failure.
pub async fn fetch_all_by_total(
    client: &ManagementClient,
    path: &str,
    key: &'static str,
    total: u64,
) -> Result<Vec<Value>, ApiError> {
    let pages = page_count(total, client.max_per_page());
    tracing::debug!(path, total, pages, "listing pages");
    if pages == 0 {
        return Ok(Vec::new());
    }
    fetch_pages(client, path, key, 1, pages).await
}
