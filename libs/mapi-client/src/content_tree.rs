//! Content tree nodes and their placement rules.
//!
//! | kind          | folder | parent                  |
//! |---------------|--------|-------------------------|
//! | `Root`        | yes    | none                    |
//! | `Folder`      | yes    | none, or a folder       |
//! | `Subfolder`   | yes    | a folder                |
//! | `Content`     | no     | none, or a folder       |
//! | `FolderIndex` | no     | a folder (startpage)    |

use crate::client::ManagementClient;
use crate::error::ApiError;
use crate::stories;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Root,
    Folder,
    Subfolder,
    Content,
    FolderIndex,
}

impl NodeKind {
    #[must_use]
    pub fn is_folder(self) -> bool {
        matches!(self, NodeKind::Root | NodeKind::Folder | NodeKind::Subfolder)
    }

    #[must_use]
    pub fn is_startpage(self) -> bool {
        self == NodeKind::FolderIndex
    }

    fn requires_parent(self) -> bool {
        matches!(self, NodeKind::Subfolder | NodeKind::FolderIndex)
    }
}

/// A story or folder to be placed in the content tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentNode {
    pub kind: NodeKind,
    pub name: String,
    pub slug: String,
    /// Id of the parent folder; 0 places the node at the top level
    pub parent_id: u64,
    /// Component content, for stories only
    pub content: Option<Value>,
}

impl ContentNode {
    fn new(kind: NodeKind, name: &str, slug: &str, parent_id: u64, content: Option<Value>) -> Self {
        Self {
            kind,
            name: name.to_owned(),
            slug: slug.to_owned(),
            parent_id,
            content,
        }
    }

    #[must_use]
    pub fn root(name: &str, slug: &str) -> Self {
        Self::new(NodeKind::Root, name, slug, 0, None)
    }

    #[must_use]
    pub fn folder(name: &str, slug: &str, parent_id: u64) -> Self {
        Self::new(NodeKind::Folder, name, slug, parent_id, None)
    }

    #[must_use]
    pub fn subfolder(name: &str, slug: &str, parent_id: u64) -> Self {
        Self::new(NodeKind::Subfolder, name, slug, parent_id, None)
    }

    #[must_use]
    pub fn content(name: &str, slug: &str, parent_id: u64, content: Value) -> Self {
        Self::new(NodeKind::Content, name, slug, parent_id, Some(content))
    }

    #[must_use]
    pub fn folder_index(name: &str, slug: &str, parent_id: u64, content: Value) -> Self {
        Self::new(NodeKind::FolderIndex, name, slug, parent_id, Some(content))
    }

    /// Story payload for create and update calls.
    #[must_use]
    pub fn to_payload(&self) -> Value {
        let mut payload = json!({
            "name": self.name,
            "slug": self.slug,
            "parent_id": self.parent_id,
            "is_folder": self.kind.is_folder(),
            "is_startpage": self.kind.is_startpage(),
        });
        if let Some(content) = &self.content {
            payload["content"] = content.clone();
        }
        payload
    }

    /// Full slug the node will have below `parent`.
    #[must_use]
    pub fn full_slug(&self, parent: Option<&Value>) -> String {
        let parent_slug = parent
            .and_then(|p| p.get("full_slug"))
            .and_then(Value::as_str)
            .map(|slug| slug.trim_end_matches('/'));
        match (parent_slug, self.kind) {
            (Some(parent), NodeKind::FolderIndex) => format!("{parent}/"),
            (Some(parent), _) if !parent.is_empty() => format!("{parent}/{}", self.slug),
            _ => self.slug.clone(),
        }
    }
}

fn invalid(node: &ContentNode, reason: &str) -> ApiError {
    ApiError::InvalidNode(format!("{:?} '{}' {reason}", node.kind, node.name))
}

/// Check `node` against its parent story, if it has one.
///
/// # Errors
/// Returns `ApiError::InvalidNode` describing the violated rule.
pub fn validate(node: &ContentNode, parent: Option<&Value>) -> Result<(), ApiError> {
    if node.name.trim().is_empty() {
        return Err(invalid(node, "has an empty name"));
    }
    if node.slug.trim().is_empty() && !node.kind.is_startpage() {
        return Err(invalid(node, "has an empty slug"));
    }
    if node.kind.is_folder() && node.content.is_some() {
        return Err(invalid(node, "is a folder and cannot carry content"));
    }

    if node.kind == NodeKind::Root {
        if node.parent_id != 0 || parent.is_some() {
            return Err(invalid(node, "must not have a parent"));
        }
        return Ok(());
    }

    match parent {
        None if node.kind.requires_parent() || node.parent_id != 0 => {
            Err(invalid(node, "requires a parent folder"))
        }
        None => Ok(()),
        Some(parent) => {
            let parent_is_folder = parent
                .get("is_folder")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if parent_is_folder {
                Ok(())
            } else {
                Err(invalid(node, "must be placed inside a folder"))
            }
        }
    }
}

/// Create `node`, or update the story already at its full slug.
///
/// The parent is fetched when `parent_id > 0` and checked with [`validate`]
/// before anything is written.
///
/// # Errors
/// Returns `ApiError::InvalidNode`, or the first failing request.
pub async fn sync_node(client: &ManagementClient, node: &ContentNode) -> Result<Value, ApiError> {
    let parent = if node.parent_id > 0 {
        Some(stories::get_story(client, node.parent_id).await?)
    } else {
        None
    };
    validate(node, parent.as_ref())?;

    let full_slug = node.full_slug(parent.as_ref());
    let existing = stories::find_by_slug(client, &full_slug).await?;
    let existing_id = existing
        .as_ref()
        .and_then(|story| story.get("id"))
        .and_then(Value::as_u64);

    match existing_id {
        Some(id) => {
            tracing::debug!(full_slug = %full_slug, id, "updating existing story");
            stories::update_story(client, id, node.to_payload(), false).await
        }
        None => {
            tracing::debug!(full_slug = %full_slug, "creating story");
            stories::create_story(client, node.to_payload()).await
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::client::test_support::client;
    use httpmock::prelude::*;

    fn folder_story() -> Value {
        json!({ "id": 10, "full_slug": "blog", "is_folder": true })
    }

    fn page_story() -> Value {
        json!({ "id": 11, "full_slug": "about", "is_folder": false })
    }

    #[test]
    fn root_has_no_parent() {
        let root = ContentNode::root("Site", "site");
        assert!(validate(&root, None).is_ok());
        assert!(validate(&root, Some(&folder_story())).is_err());

        let misplaced = ContentNode {
            parent_id: 3,
            ..ContentNode::root("Site", "site")
        };
        assert!(validate(&misplaced, None).is_err());
    }

    #[test]
    fn folders_nest_only_in_folders() {
        let folder = ContentNode::folder("Blog", "blog", 0);
        assert!(validate(&folder, None).is_ok());

        let nested = ContentNode::folder("2024", "2024", 10);
        assert!(validate(&nested, Some(&folder_story())).is_ok());
        assert!(validate(&nested, Some(&page_story())).is_err());
        assert!(validate(&nested, None).is_err());
    }

    #[test]
    fn subfolder_and_index_require_a_folder_parent() {
        let sub = ContentNode::subfolder("Drafts", "drafts", 10);
        assert!(validate(&sub, Some(&folder_story())).is_ok());
        assert!(matches!(
            validate(&ContentNode::subfolder("Drafts", "drafts", 0), None),
            Err(ApiError::InvalidNode(msg)) if msg.contains("requires a parent folder")
        ));

        let index = ContentNode::folder_index("Blog", "", 10, json!({ "component": "page" }));
        assert!(validate(&index, Some(&folder_story())).is_ok());
        assert!(validate(&index, Some(&page_story())).is_err());
        assert!(validate(&ContentNode::folder_index("Blog", "", 0, json!({})), None).is_err());
    }

    #[test]
    fn content_is_not_a_folder() {
        let page = ContentNode::content("Post", "post", 10, json!({ "component": "post" }));
        assert!(validate(&page, Some(&folder_story())).is_ok());
        assert!(matches!(
            validate(&page, Some(&page_story())),
            Err(ApiError::InvalidNode(msg)) if msg.contains("inside a folder")
        ));
        assert!(validate(&ContentNode::content("Top", "top", 0, json!({})), None).is_ok());

        let payload = page.to_payload();
        assert_eq!(payload["is_folder"], false);
        assert_eq!(payload["content"]["component"], "post");

        let folder = ContentNode {
            content: Some(json!({})),
            ..ContentNode::folder("Bad", "bad", 0)
        };
        assert!(validate(&folder, None).is_err());
    }

    #[test]
    fn empty_names_are_rejected() {
        assert!(validate(&ContentNode::folder(" ", "x", 0), None).is_err());
        assert!(validate(&ContentNode::folder("X", "", 0), None).is_err());
    }

    #[test]
    fn full_slug_follows_parent() {
        let parent = folder_story();
        assert_eq!(
            ContentNode::content("Post", "post", 10, json!({})).full_slug(Some(&parent)),
            "blog/post"
        );
        assert_eq!(
            ContentNode::folder_index("Blog", "", 10, json!({})).full_slug(Some(&parent)),
            "blog/"
        );
        assert_eq!(ContentNode::folder("Blog", "blog", 0).full_slug(None), "blog");
    }

    #[tokio::test]
    async fn sync_creates_missing_node_under_parent() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(Method::GET).path("/v1/spaces/12345/stories/10");
            then.status(200).json_body(json!({ "story": folder_story() }));
        });
        let lookup = server.mock(|when, then| {
            when.method(Method::GET)
                .path("/v1/spaces/12345/stories")
                .query_param("with_slug", "blog/post");
            then.status(200).json_body(json!({ "stories": [] }));
        });
        let create = server.mock(|when, then| {
            when.method(Method::POST)
                .path("/v1/spaces/12345/stories")
                .body_includes("\"slug\":\"post\"")
                .body_includes("\"parent_id\":10");
            then.status(201)
                .json_body(json!({ "story": { "id": 20, "full_slug": "blog/post" } }));
        });

        let node = ContentNode::content("Post", "post", 10, json!({ "component": "post" }));
        let story = sync_node(&client(&server), &node).await.unwrap();

        assert_eq!(story["id"], 20);
        assert_eq!(lookup.calls(), 1);
        assert_eq!(create.calls(), 1);
    }

    #[tokio::test]
    async fn sync_updates_existing_story() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(Method::GET)
                .path("/v1/spaces/12345/stories")
                .query_param("with_slug", "blog");
            then.status(200).json_body(json!({
                "stories": [{ "id": 10, "full_slug": "blog", "is_folder": true }]
            }));
        });
        let update = server.mock(|when, then| {
            when.method(Method::PUT).path("/v1/spaces/12345/stories/10");
            then.status(200).json_body(json!({ "story": { "id": 10 } }));
        });

        let story = sync_node(&client(&server), &ContentNode::folder("Blog", "blog", 0))
            .await
            .unwrap();
        assert_eq!(story["id"], 10);
        assert_eq!(update.calls(), 1);
    }

    #[tokio::test]
    async fn sync_rejects_invalid_parent_before_writing() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(Method::GET).path("/v1/spaces/12345/stories/11");
            then.status(200).json_body(json!({ "story": page_story() }));
        });
        let writes = server.mock(|when, then| {
            when.method(Method::POST).path("/v1/spaces/12345/stories");
            then.status(201).json_body(json!({ "story": { "id": 1 } }));
        });

        let node = ContentNode::subfolder("Drafts", "drafts", 11);
        let err = sync_node(&client(&server), &node).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidNode(_)));
        assert_eq!(writes.calls(), 0);
    }
}
