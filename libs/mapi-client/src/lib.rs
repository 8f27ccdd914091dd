#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Management API client for a headless content platform
//!
//! Resource operations (stories, components, assets, asset folders, spaces)
//! are free functions taking a [`ManagementClient`]. Every call goes through
//! one [`Transport`] built on `mapi-http`, which throttles, retries transient
//! failures and injects the bearer token.
//!
//! ```ignore
//! use mapi_client::{ClientSettings, ManagementClient, stories};
//!
//! let settings = ClientSettings::load(Some(Path::new("mapi.yaml")))?;
//! let client = ManagementClient::from_settings(settings)?;
//!
//! let story = stories::create_story(
//!     &client,
//!     serde_json::json!({ "name": "Home", "slug": "home", "parent_id": 0 }),
//! )
//! .await?;
//! ```

pub mod asset_folders;
pub mod assets;
mod cache;
mod client;
pub mod components;
pub mod content_tree;
mod credentials;
mod error;
pub mod pagination;
mod settings;
pub mod spaces;
pub mod stories;
mod transport;
pub mod upload;

pub use assets::{AssetOptions, AssetRegistration};
pub use cache::{CachedResponse, ResponseCache, cache_key};
pub use client::{ManagementClient, ManagementClientBuilder};
pub use content_tree::{ContentNode, NodeKind};
pub use credentials::Credentials;
pub use error::ApiError;
pub use settings::{
    CacheSettings, ClientSettings, DEFAULT_BASE_URL, ENV_PREFIX, MAX_PER_PAGE, RetryPreset,
    RetrySettings, ThrottleSettings,
};
pub use transport::{ApiMethod, ApiRequest, ApiResponse, Transport};
pub use upload::{AssetSigningResponse, ImageProcessor, PassthroughProcessor, Uploader};
