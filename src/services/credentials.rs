//! Video API credentials
//!
//! The three secrets are kept in the settings table and loaded once per run.
//! A run may only start when all three are present.

use std::fmt;

use anyhow::Result;
use tracing::warn;

use crate::db::SettingsRepository;
use crate::error::{ThumbnailError, ThumbnailResult};

const CLIENT_ID_KEY: &str = "credentials.client_id";
const CLIENT_SECRET_KEY: &str = "credentials.client_secret";
const API_TOKEN_KEY: &str = "credentials.api_token";

/// Warning shown when a rebuild is attempted without credentials
pub const MISSING_CREDENTIALS_WARNING: &str = "You need to set your video API credentials";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub api_token: String,
}

impl Credentials {
    /// Names of the secrets that are blank
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.client_id.trim().is_empty() {
            missing.push("client_id");
        }
        if self.client_secret.trim().is_empty() {
            missing.push("client_secret");
        }
        if self.api_token.trim().is_empty() {
            missing.push("api_token");
        }
        missing
    }

    pub fn validate(self) -> ThumbnailResult<Self> {
        let missing = self.missing();
        if missing.is_empty() {
            Ok(self)
        } else {
            Err(ThumbnailError::MissingCredentials { missing })
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("api_token", &"<redacted>")
            .finish()
    }
}

/// Reads and writes credentials in the settings table
pub struct CredentialStore {
    settings: SettingsRepository,
}

impl CredentialStore {
    pub fn new(settings: SettingsRepository) -> Self {
        Self { settings }
    }

    /// Load all three secrets, failing with `MissingCredentials` if any is unset
    pub async fn load(&self) -> Result<ThumbnailResult<Credentials>> {
        let credentials = Credentials {
            client_id: self.read(CLIENT_ID_KEY).await?,
            client_secret: self.read(CLIENT_SECRET_KEY).await?,
            api_token: self.read(API_TOKEN_KEY).await?,
        };
        Ok(credentials.validate())
    }

    pub async fn save(&self, credentials: &Credentials) -> Result<()> {
        self.settings.set(CLIENT_ID_KEY, &credentials.client_id).await?;
        self.settings
            .set(CLIENT_SECRET_KEY, &credentials.client_secret)
            .await?;
        self.settings.set(API_TOKEN_KEY, &credentials.api_token).await?;
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<String> {
        Ok(self
            .settings
            .get_value::<String>(key)
            .await?
            .unwrap_or_default())
    }
}

/// Whether a rebuild may be started
#[derive(Debug)]
pub struct RebuildTrigger {
    pub enabled: bool,
    pub warning: Option<String>,
    pub credentials: Option<Credentials>,
}

impl RebuildTrigger {
    /// Check credentials once before a run; a missing secret disables the trigger
    pub async fn evaluate(store: &CredentialStore) -> Result<Self> {
        match store.load().await? {
            Ok(credentials) => Ok(Self {
                enabled: true,
                warning: None,
                credentials: Some(credentials),
            }),
            Err(e) => {
                warn!(error = %e, "Rebuild disabled until credentials are set");
                Ok(Self {
                    enabled: false,
                    warning: Some(MISSING_CREDENTIALS_WARNING.to_string()),
                    credentials: None,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::db::Database;

    fn full() -> Credentials {
        Credentials {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            api_token: "token".to_string(),
        }
    }

    #[test]
    fn test_validate_lists_blank_fields() {
        let creds = Credentials {
            client_secret: "  ".to_string(),
            ..full()
        };
        assert_matches!(
            creds.validate(),
            Err(ThumbnailError::MissingCredentials { missing }) if missing == vec!["client_secret"]
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", full());
        assert!(rendered.contains("id"));
        assert!(!rendered.contains("secret\""));
        assert!(!rendered.contains("token\""));
        assert!(rendered.contains("<redacted>"));
    }

    #[tokio::test]
    async fn test_trigger_disabled_without_credentials() {
        let db = Database::in_memory().await.unwrap();
        let store = CredentialStore::new(db.settings());

        let trigger = RebuildTrigger::evaluate(&store).await.unwrap();
        assert!(!trigger.enabled);
        assert_eq!(trigger.warning.as_deref(), Some(MISSING_CREDENTIALS_WARNING));
        assert!(trigger.credentials.is_none());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let db = Database::in_memory().await.unwrap();
        let store = CredentialStore::new(db.settings());
        store.save(&full()).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, full());

        let trigger = RebuildTrigger::evaluate(&store).await.unwrap();
        assert!(trigger.enabled);
        assert!(trigger.warning.is_none());
    }
}
