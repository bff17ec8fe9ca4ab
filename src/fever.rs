use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::auth::AuthError;

// Fever caps ?api&items at 50 items per request.
pub const MAX_ITEMS_PER_REQUEST: usize = 50;

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub endpoint: String,
    pub username: String,
    pub password: String,
    pub http_client: Option<HttpClient>,
}

pub struct Client {
    http: HttpClient,
    endpoint: Url,
    api_key: String,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.username.trim().is_empty() {
            bail!("fever client username required");
        }
        if config.password.is_empty() {
            bail!("fever client password required");
        }
        let endpoint = Url::parse(config.endpoint.trim())
            .with_context(|| format!("fever: invalid endpoint: {}", config.endpoint))?;

        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(Duration::from_secs(20))
                .build()?,
        };

        Ok(Client {
            http,
            endpoint,
            api_key: api_key(config.username.trim(), &config.password),
        })
    }

    /// Asks the remote service whether the api_key is accepted.
    pub fn check_auth(&self) -> Result<bool> {
        let resp: AuthResponse = self.call("api", Vec::new())?;
        Ok(resp.auth == 1)
    }

    /// All unread items, newest first.
    pub fn unread_items(&self) -> Result<Vec<Item>> {
        let resp: UnreadItemIdsResponse = self.call("api&unread_item_ids", Vec::new())?;
        authorized(resp.auth)?;
        let ids = parse_id_list(&resp.unread_item_ids);

        let mut items = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_ITEMS_PER_REQUEST) {
            let with_ids = join_ids(chunk);
            let resp: ItemsResponse = self.call(&format!("api&items&with_ids={with_ids}"), Vec::new())?;
            authorized(resp.auth)?;
            items.extend(resp.items);
        }

        items.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(items)
    }

    /// Marks the given items read in one batched request.
    pub fn mark_items_read(&self, item_ids: &[u64]) -> Result<()> {
        if item_ids.is_empty() {
            return Ok(());
        }
        let form = vec![("id".to_string(), join_ids(item_ids))];
        let resp: AuthResponse = self.call("api&mark=item&as=read", form)?;
        authorized(resp.auth)
    }

    pub fn groups(&self) -> Result<Groups> {
        let resp: GroupsResponse = self.call("api&groups", Vec::new())?;
        authorized(resp.auth)?;
        Ok(Groups {
            groups: resp.groups,
            feeds_groups: resp.feeds_groups,
        })
    }

    fn call<T>(&self, query: &str, mut form: Vec<(String, String)>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let mut url = self.endpoint.clone();
        url.set_query(Some(query));
        form.push(("api_key".to_string(), self.api_key.clone()));

        let resp = self
            .http
            .post(url)
            .form(&form)
            .send()
            .with_context(|| format!("fever: request ?{query}"))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            bail!("fever: api error {status}: {body}");
        }
        resp.json()
            .with_context(|| format!("fever: decode response for ?{query}"))
    }
}

fn authorized(auth: u8) -> Result<()> {
    if auth == 1 {
        Ok(())
    } else {
        Err(AuthError::Rejected.into())
    }
}

fn api_key(username: &str, password: &str) -> String {
    format!("{:x}", md5::compute(format!("{username}:{password}")))
}

fn parse_id_list(raw: &str) -> Vec<u64> {
    raw.split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Debug, Clone, Deserialize)]
pub struct Item {
    pub id: u64,
    #[serde(default)]
    pub feed_id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub is_saved: u8,
    #[serde(default)]
    pub is_read: u8,
    #[serde(default)]
    pub created_on_time: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Group {
    pub id: u64,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedsGroup {
    pub group_id: u64,
    #[serde(default)]
    pub feed_ids: String,
}

impl FeedsGroup {
    pub fn feed_id_set(&self) -> Vec<u64> {
        parse_id_list(&self.feed_ids)
    }
}

#[derive(Debug, Clone)]
pub struct Groups {
    pub groups: Vec<Group>,
    pub feeds_groups: Vec<FeedsGroup>,
}

impl Groups {
    /// Feed ids belonging to a group, or None when the group is unknown.
    pub fn feed_ids_for(&self, group_id: u64) -> Option<Vec<u64>> {
        self.feeds_groups
            .iter()
            .find(|fg| fg.group_id == group_id)
            .map(FeedsGroup::feed_id_set)
    }
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    auth: u8,
}

#[derive(Debug, Deserialize)]
struct UnreadItemIdsResponse {
    #[serde(default)]
    auth: u8,
    #[serde(default)]
    unread_item_ids: String,
}

#[derive(Debug, Deserialize)]
struct ItemsResponse {
    #[serde(default)]
    auth: u8,
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct GroupsResponse {
    #[serde(default)]
    auth: u8,
    #[serde(default)]
    groups: Vec<Group>,
    #[serde(default)]
    feeds_groups: Vec<FeedsGroup>,
}
