use crate::error::ApiError;
use secrecy::SecretString;

/// API token and optional space id, fixed for the lifetime of a client.
///
/// The token only leaves this struct through the bearer layer; `Debug`
/// output redacts it.
#[derive(Clone)]
pub struct Credentials {
    api_token: SecretString,
    space_id: Option<u64>,
}

impl Credentials {
    #[must_use]
    pub fn new(api_token: SecretString, space_id: Option<u64>) -> Self {
        Self {
            api_token,
            space_id,
        }
    }

    #[must_use]
    pub fn api_token(&self) -> &SecretString {
        &self.api_token
    }

    #[must_use]
    pub fn space_id(&self) -> Option<u64> {
        self.space_id
    }

    /// # Errors
    /// Returns `ApiError::MissingSpaceId` when no space id was configured.
    pub fn require_space_id(&self) -> Result<u64, ApiError> {
        self.space_id.ok_or(ApiError::MissingSpaceId)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_token", &"[REDACTED]")
            .field("space_id", &self.space_id)
            .finish()
    }
}
