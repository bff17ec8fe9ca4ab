use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::fever;

pub const AUTH_COOKIE: &str = "auth";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("no credentials available")]
    Missing,
    #[error("feed service rejected the credentials")]
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub endpoint: String,
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Encodes the credentials as the base64 JSON payload stored in the
    /// `auth` cookie.
    pub fn to_cookie(&self) -> Result<String> {
        let json = serde_json::to_vec(self).context("auth: encode credentials")?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    pub fn from_cookie(value: &str) -> Result<Self> {
        let raw = URL_SAFE_NO_PAD
            .decode(value.trim())
            .context("auth: cookie is not valid base64")?;
        serde_json::from_slice(&raw).context("auth: cookie payload is not credentials JSON")
    }
}

/// Resolves credentials for a request. Operator-fixed credentials from the
/// environment win over the per-browser cookie.
pub fn resolve(
    fixed: Option<&Credentials>,
    cookie: Option<&str>,
) -> Result<Credentials, AuthError> {
    if let Some(creds) = fixed {
        return Ok(creds.clone());
    }
    let value = cookie.ok_or(AuthError::Missing)?;
    Credentials::from_cookie(value).map_err(|_| AuthError::Missing)
}

/// Delegates verification to the feed service. A rejection surfaces as
/// [`AuthError::Rejected`]; transport failures stay generic.
pub fn verify(creds: &Credentials) -> Result<()> {
    let client = fever::Client::new(fever::ClientConfig {
        endpoint: creds.endpoint.clone(),
        username: creds.username.clone(),
        password: creds.password.clone(),
        http_client: None,
    })?;
    if client.check_auth().context("auth: verify credentials")? {
        Ok(())
    } else {
        Err(AuthError::Rejected.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(username: &str) -> Credentials {
        Credentials {
            endpoint: "https://reader.test/api/fever.php".into(),
            username: username.into(),
            password: "secret".into(),
        }
    }

    #[test]
    fn cookie_round_trip() {
        let original = creds("marco");
        let cookie = original.to_cookie().unwrap();
        assert!(!cookie.contains('='));
        assert_eq!(Credentials::from_cookie(&cookie).unwrap(), original);
    }

    #[test]
    fn garbage_cookie_is_an_error() {
        assert!(Credentials::from_cookie("!!! not base64 !!!").is_err());
        let not_json = URL_SAFE_NO_PAD.encode(b"plain text");
        assert!(Credentials::from_cookie(&not_json).is_err());
    }

    #[test]
    fn fixed_credentials_win_over_cookie() {
        let fixed = creds("operator");
        let cookie = creds("browser").to_cookie().unwrap();
        let resolved = resolve(Some(&fixed), Some(&cookie)).unwrap();
        assert_eq!(resolved.username, "operator");
    }

    #[test]
    fn cookie_used_when_no_fixed_credentials() {
        let cookie = creds("browser").to_cookie().unwrap();
        let resolved = resolve(None, Some(&cookie)).unwrap();
        assert_eq!(resolved.username, "browser");
    }

    #[test]
    fn nothing_resolvable_is_missing() {
        assert!(matches!(resolve(None, None), Err(AuthError::Missing)));
        assert!(matches!(
            resolve(None, Some("corrupted")),
            Err(AuthError::Missing)
        ));
    }
}
