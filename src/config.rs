use std::env;

use anyhow::{bail, Context, Result};

use crate::auth::Credentials;

pub const DEFAULT_MAX_IMAGES: usize = 15;
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub max_images: usize,
    pub fever: Option<Credentials>,
    pub pocket: Option<PocketConfig>,
    pub sentry_dsn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PocketConfig {
    pub consumer_key: String,
    pub access_token: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let fever = match (
            non_empty(lookup("FEVER_ENDPOINT")),
            non_empty(lookup("FEVER_USERNAME")),
            non_empty(lookup("FEVER_PASSWORD")),
        ) {
            (None, None, None) => None,
            (Some(endpoint), Some(username), Some(password)) => Some(Credentials {
                endpoint,
                username,
                password,
            }),
            _ => bail!(
                "FEVER_ENDPOINT, FEVER_USERNAME and FEVER_PASSWORD must be set together"
            ),
        };

        let pocket = match (
            non_empty(lookup("POCKET_CONSUMER_KEY")),
            non_empty(lookup("POCKET_ACCESS_TOKEN")),
        ) {
            (None, None) => None,
            (Some(consumer_key), Some(access_token)) => Some(PocketConfig {
                consumer_key,
                access_token,
            }),
            _ => bail!("POCKET_CONSUMER_KEY and POCKET_ACCESS_TOKEN must be set together"),
        };

        let max_images = match non_empty(lookup("MAX_IMAGES")) {
            Some(raw) => {
                let parsed: usize = raw
                    .parse()
                    .with_context(|| format!("MAX_IMAGES is not a number: {raw}"))?;
                if parsed == 0 {
                    bail!("MAX_IMAGES must be at least 1");
                }
                parsed
            }
            None => DEFAULT_MAX_IMAGES,
        };

        let port = match non_empty(lookup("PORT")) {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("PORT is not a port number: {raw}"))?,
            None => DEFAULT_PORT,
        };

        Ok(Config {
            port,
            max_images,
            fever,
            pocket,
            sentry_dsn: non_empty(lookup("SENTRY_DSN")),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_with_empty_environment() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.max_images, DEFAULT_MAX_IMAGES);
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert!(cfg.fever.is_none());
        assert!(cfg.pocket.is_none());
        assert!(cfg.sentry_dsn.is_none());
    }

    #[test]
    fn full_fever_trio_is_accepted() {
        let cfg = load(&[
            ("FEVER_ENDPOINT", "https://reader.test/api/fever.php"),
            ("FEVER_USERNAME", "marco"),
            ("FEVER_PASSWORD", "polo"),
        ])
        .unwrap();
        let creds = cfg.fever.unwrap();
        assert_eq!(creds.endpoint, "https://reader.test/api/fever.php");
        assert_eq!(creds.username, "marco");
    }

    #[test]
    fn partial_fever_trio_is_fatal() {
        let err = load(&[("FEVER_ENDPOINT", "https://reader.test/api/fever.php")]).unwrap_err();
        assert!(err.to_string().contains("must be set together"));
    }

    #[test]
    fn partial_pocket_pair_is_fatal() {
        assert!(load(&[("POCKET_CONSUMER_KEY", "key")]).is_err());
    }

    #[test]
    fn malformed_max_images_is_fatal() {
        assert!(load(&[("MAX_IMAGES", "plenty")]).is_err());
        assert!(load(&[("MAX_IMAGES", "0")]).is_err());
    }

    #[test]
    fn blank_values_count_as_unset() {
        let cfg = load(&[("MAX_IMAGES", "  "), ("SENTRY_DSN", "")]).unwrap();
        assert_eq!(cfg.max_images, DEFAULT_MAX_IMAGES);
        assert!(cfg.sentry_dsn.is_none());
    }
}
