// ─── Launch credentials ───
// Accounts are obtained elsewhere; this module only checks that what we are
// handed is complete enough to start an authenticated game session.

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::{LauncherError, LauncherResult};

pub const AZURE_CLIENT_ID_FALLBACK: &str = "00000000402B5328";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccountMode {
    Offline,
    Microsoft,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchAccountProfile {
    pub mode: AccountMode,
    pub username: String,
    /// Unique player id. Without it the game silently runs unauthenticated.
    pub uuid: String,
    pub access_token: String,
    #[serde(default)]
    pub xuid: String,
    #[serde(default)]
    pub user_type: String,
    #[serde(default)]
    pub client_id: String,
}

impl LaunchAccountProfile {
    /// Offline profile with the same name-derived UUID the vanilla server uses.
    pub fn offline(username: &str) -> Self {
        let username = username.trim().to_string();
        Self {
            mode: AccountMode::Offline,
            uuid: offline_uuid(&username).to_string(),
            username,
            access_token: "offline_access_token".into(),
            xuid: "0".into(),
            user_type: "legacy".into(),
            client_id: AZURE_CLIENT_ID_FALLBACK.into(),
        }
    }

    /// Trim fields and fill the purely cosmetic defaults. Identity fields are
    /// left untouched so `validate` can still reject them.
    pub fn sanitized(mut self) -> Self {
        self.username = self.username.trim().to_string();
        self.uuid = self.uuid.trim().to_string();
        self.access_token = self.access_token.trim().to_string();
        if self.xuid.trim().is_empty() {
            self.xuid = "0".into();
        }
        if self.user_type.trim().is_empty() {
            self.user_type = match self.mode {
                AccountMode::Offline => "legacy".into(),
                AccountMode::Microsoft => "msa".into(),
            };
        }
        if self.client_id.trim().is_empty() {
            self.client_id = AZURE_CLIENT_ID_FALLBACK.into();
        }
        self
    }

    /// Strict shape validation of the credential.
    pub fn validate(&self) -> LauncherResult<()> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err(LauncherError::InvalidCredential("username is empty".into()));
        }
        if username.chars().any(char::is_whitespace) {
            return Err(LauncherError::InvalidCredential(
                "username contains whitespace".into(),
            ));
        }

        let uuid = Uuid::parse_str(self.uuid.trim()).map_err(|e| {
            LauncherError::InvalidCredential(format!("uuid '{}' is not valid: {e}", self.uuid))
        })?;
        if uuid.is_nil() {
            return Err(LauncherError::InvalidCredential("uuid is nil".into()));
        }

        if self.access_token.trim().is_empty() {
            return Err(LauncherError::InvalidCredential("access token is empty".into()));
        }
        if self.user_type.trim().is_empty() {
            return Err(LauncherError::InvalidCredential("user type is empty".into()));
        }
        if self.mode == AccountMode::Microsoft && self.user_type.trim() != "msa" {
            return Err(LauncherError::InvalidCredential(format!(
                "microsoft account with user type '{}'",
                self.user_type
            )));
        }

        Ok(())
    }
}

/// `UUID v3` of `OfflinePlayer:<name>`.
fn offline_uuid(username: &str) -> Uuid {
    let digest = Md5::digest(format!("OfflinePlayer:{username}").as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest);
    bytes[6] = (bytes[6] & 0x0f) | 0x30;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    Uuid::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_profile_is_valid_and_stable() {
        let a = LaunchAccountProfile::offline("Alex");
        let b = LaunchAccountProfile::offline(" Alex ");
        a.validate().unwrap();
        assert_eq!(a.uuid, b.uuid);
        assert_eq!(Uuid::parse_str(&a.uuid).unwrap().get_version_num(), 3);
    }

    #[test]
    fn missing_player_id_is_rejected() {
        let mut profile = LaunchAccountProfile::offline("Alex");
        profile.uuid = String::new();
        assert!(matches!(
            profile.validate(),
            Err(LauncherError::InvalidCredential(_))
        ));

        profile.uuid = Uuid::nil().to_string();
        assert!(profile.validate().is_err());
    }

    #[test]
    fn sanitize_does_not_invent_identity() {
        let profile = LaunchAccountProfile {
            mode: AccountMode::Microsoft,
            username: "Steve".into(),
            uuid: "".into(),
            access_token: "token".into(),
            xuid: "".into(),
            user_type: "".into(),
            client_id: "".into(),
        }
        .sanitized();

        assert_eq!(profile.user_type, "msa");
        assert_eq!(profile.client_id, AZURE_CLIENT_ID_FALLBACK);
        assert!(profile.validate().is_err());
    }

    #[test]
    fn empty_token_is_rejected() {
        let mut profile = LaunchAccountProfile::offline("Alex");
        profile.access_token = " ".into();
        assert!(profile.validate().is_err());
    }
}
