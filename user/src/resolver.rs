use crate::error::{Result, UserError};
use crate::hashing::{hash_password, hash_token, verify_password};
use authz::{Credential, UserId};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use database::{AccessTokenRecord, Database, UserRecord};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Turns what a request presents into an [`authz::Credential`]
pub struct CredentialResolver {
    db: Arc<Database>,
}

impl CredentialResolver {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Resolve a raw access token to a token credential for its holder
    pub async fn from_token(&self, raw: &str) -> Result<Credential> {
        let storage = self.db.storage();
        let token = match storage.find_token_by_hash(&hash_token(raw)).await? {
            Some(token) => token,
            None => {
                warn!("Authentication failed - unknown access token");
                return Err(UserError::InvalidCredentials);
            }
        };

        let holder = storage
            .get_user(token.user_id)
            .await?
            .ok_or_else(|| UserError::UserNotFound(token.user_id.to_string()))?;

        debug!("Resolved {} held by {}", token.id, holder.id);
        Ok(Credential::token(holder.identity(), token.id))
    }

    /// Resolve a username and password to a user credential
    pub async fn from_basic(&self, username: &str, password: &str) -> Result<Credential> {
        let user = match self.db.storage().find_user_by_username(username).await? {
            Some(user) => user,
            None => {
                warn!("Authentication failed - unknown user {}", username);
                return Err(UserError::InvalidCredentials);
            }
        };

        if !verify_password(password, &user.password_hash) {
            warn!("Authentication failed - bad password for {}", username);
            return Err(UserError::InvalidCredentials);
        }

        debug!("User {} authenticated via basic auth", user.id);
        Ok(Credential::user(user.identity()))
    }

    /// Resolve the credential of a request from its `CA-Token` and
    /// `Authorization` header values. The token wins when both are present.
    /// Nothing presented, or a header that cannot be parsed, yields
    /// [`Credential::Anonymous`].
    pub async fn from_headers(
        &self,
        ca_token: Option<&str>,
        authorization: Option<&str>,
    ) -> Result<Credential> {
        if let Some(token) = ca_token.map(str::trim).filter(|t| !t.is_empty()) {
            return self.from_token(token).await;
        }

        match authorization {
            Some(header) => match parse_basic(header) {
                Some((username, password)) => self.from_basic(&username, &password).await,
                None => {
                    warn!("Ignoring malformed Authorization header");
                    Ok(Credential::Anonymous)
                }
            },
            None => Ok(Credential::Anonymous),
        }
    }

    /// Create a user with a freshly hashed password
    pub async fn register_user(
        &self,
        username: &str,
        password: &str,
        is_superuser: bool,
    ) -> Result<UserRecord> {
        let hash = hash_password(password)?;
        let user = self
            .db
            .storage()
            .create_user(username, &hash, is_superuser)
            .await?;
        info!("Registered user {} ({})", user.username, user.id);
        Ok(user)
    }

    /// Store an access token handed out to `user`; only its hash is kept
    pub async fn store_token(&self, user: UserId, raw: &str) -> Result<AccessTokenRecord> {
        let record = self
            .db
            .storage()
            .create_access_token(user, &hash_token(raw))
            .await?;
        info!("Stored {} for {}", record.id, user);
        Ok(record)
    }
}

/// Split `Basic <base64(username:password)>` into its parts
fn parse_basic(header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    if username.is_empty() {
        return None;
    }
    Some((username.to_string(), password.to_string()))
}
