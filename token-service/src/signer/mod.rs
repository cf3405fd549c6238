//! # Token Signer
//!
//! Produces the opaque signed tokens handed to chat clients.
//!
//! ## AccessToken2 Layout
//!
//! ```text
//! "007" + base64( zlib( bytes(signature) + content ) )
//!
//! content = bytes(app_id) | u32 issue_ts | u32 expire | u32 salt
//!         | u16 service_count | services...
//! service = u16 type | u16 privilege_count | (u16 privilege, u32 expire)...
//!         | bytes(user_id)
//! ```
//!
//! All integers are little-endian and `bytes(x)` is a u16 length followed
//! by the raw bytes. The signature is HMAC-SHA256 over `content`, keyed
//! with `HMAC(salt, HMAC(issue_ts, app_certificate))`.

use base64::{engine::general_purpose::STANDARD, Engine};
use flate2::{write::ZlibEncoder, Compression};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use std::io::Write;
use tracing::debug;

use shared::{
    config::Credentials,
    constants::*,
    error::{TokenError, TokenResult},
};

type HmacSha256 = Hmac<Sha256>;

/// Signs app and user tokens.
///
/// Implementations must be free of side effects visible to the service.
pub trait TokenSigner: Send + Sync {
    /// Build a token granting application-level access
    fn build_app_token(&self, credentials: &Credentials, expire_secs: u32) -> TokenResult<String>;

    /// Build a token granting access to the user with the given stable identifier
    fn build_user_token(
        &self,
        credentials: &Credentials,
        user_uuid: &str,
        expire_secs: u32,
    ) -> TokenResult<String>;
}

/// AccessToken2 signer for the chat service
#[derive(Debug, Default, Clone, Copy)]
pub struct ChatTokenBuilder;

impl ChatTokenBuilder {
    /// Create a new ChatTokenBuilder
    pub fn new() -> Self {
        Self
    }

    fn build(
        &self,
        credentials: &Credentials,
        service: ChatService,
        expire_secs: u32,
    ) -> TokenResult<String> {
        ensure_hex_credential("app id", &credentials.app_id)?;
        ensure_hex_credential("app certificate", &credentials.app_certificate)?;

        let issue_ts = u32::try_from(chrono::Utc::now().timestamp())
            .map_err(|_| TokenError::SigningFailure("system clock out of range".into()))?;
        let salt = rand::thread_rng().gen_range(1..=TOKEN_SALT_MAX);

        let token = AccessToken {
            app_id: &credentials.app_id,
            app_certificate: &credentials.app_certificate,
            issue_ts,
            expire: expire_secs,
            salt,
            service,
        };

        debug!(
            privilege = token.service.privilege,
            expire = expire_secs,
            "Signing chat token"
        );

        token.encode()
    }
}

impl TokenSigner for ChatTokenBuilder {
    fn build_app_token(&self, credentials: &Credentials, expire_secs: u32) -> TokenResult<String> {
        let service = ChatService {
            privilege: PRIVILEGE_CHAT_APP,
            privilege_expire: expire_secs,
            user_id: String::new(),
        };
        self.build(credentials, service, expire_secs)
    }

    fn build_user_token(
        &self,
        credentials: &Credentials,
        user_uuid: &str,
        expire_secs: u32,
    ) -> TokenResult<String> {
        let service = ChatService {
            privilege: PRIVILEGE_CHAT_USER,
            privilege_expire: expire_secs,
            user_id: user_uuid.to_string(),
        };
        self.build(credentials, service, expire_secs)
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Chat service entry with a single privilege
struct ChatService {
    privilege: u16,
    privilege_expire: u32,
    user_id: String,
}

impl ChatService {
    fn pack(&self, buf: &mut Packer) -> TokenResult<()> {
        buf.put_u16(SERVICE_TYPE_CHAT);
        buf.put_u16(1);
        buf.put_u16(self.privilege);
        buf.put_u32(self.privilege_expire);
        buf.put_bytes(self.user_id.as_bytes())
    }
}

struct AccessToken<'a> {
    app_id: &'a str,
    app_certificate: &'a str,
    issue_ts: u32,
    expire: u32,
    salt: u32,
    service: ChatService,
}

impl AccessToken<'_> {
    fn signing_key(&self) -> TokenResult<Vec<u8>> {
        let keyed = hmac_sha256(&self.issue_ts.to_le_bytes(), self.app_certificate.as_bytes())?;
        hmac_sha256(&self.salt.to_le_bytes(), &keyed)
    }

    fn encode(&self) -> TokenResult<String> {
        let mut content = Packer::default();
        content.put_bytes(self.app_id.as_bytes())?;
        content.put_u32(self.issue_ts);
        content.put_u32(self.expire);
        content.put_u32(self.salt);
        content.put_u16(1);
        self.service.pack(&mut content)?;

        let signature = hmac_sha256(&self.signing_key()?, &content.0)?;

        let mut body = Packer::default();
        body.put_bytes(&signature)?;
        body.0.extend_from_slice(&content.0);

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&body.0)
            .map_err(|e| TokenError::SigningFailure(format!("compression failed: {e}")))?;
        let compressed = encoder
            .finish()
            .map_err(|e| TokenError::SigningFailure(format!("compression failed: {e}")))?;

        Ok(format!("{}{}", ACCESS_TOKEN_VERSION, STANDARD.encode(compressed)))
    }
}

/// Little-endian byte writer
#[derive(Default)]
struct Packer(Vec<u8>);

impl Packer {
    fn put_u16(&mut self, v: u16) {
        self.0.extend_from_slice(&v.to_le_bytes());
    }

    fn put_u32(&mut self, v: u32) {
        self.0.extend_from_slice(&v.to_le_bytes());
    }

    fn put_bytes(&mut self, v: &[u8]) -> TokenResult<()> {
        let len = u16::try_from(v.len())
            .map_err(|_| TokenError::SigningFailure(format!("field too long ({} bytes)", v.len())))?;
        self.put_u16(len);
        self.0.extend_from_slice(v);
        Ok(())
    }
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> TokenResult<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| TokenError::SigningFailure(format!("HMAC error: {e}")))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn ensure_hex_credential(field: &str, value: &str) -> TokenResult<()> {
    if value.len() != APP_CREDENTIAL_HEX_LEN || hex::decode(value).is_err() {
        return Err(TokenError::SigningFailure(format!(
            "{field} must be {APP_CREDENTIAL_HEX_LEN} hex characters"
        )));
    }
    Ok(())
}
