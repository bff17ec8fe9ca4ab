use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tiny_http::{Header, Method, Request, Response, Server};
use url::{form_urlencoded, Url};

use crate::auth::{self, AuthError, Credentials, AUTH_COOKIE};
use crate::fever;
use crate::i18n::Lang;
use crate::images;
use crate::pocket;
use crate::render;

const STYLE_CSS: &str = include_str!("../static/style.css");
const SCRIPT_JS: &str = include_str!("../static/script.js");

pub const TZ_COOKIE: &str = "tz";

pub struct Options {
    pub port: u16,
    pub max_images: usize,
    pub fixed_credentials: Option<Credentials>,
    pub pocket: Option<pocket::Client>,
}

struct App {
    max_images: usize,
    fixed: Option<Credentials>,
    pocket: Option<pocket::Client>,
}

/// Binds the listen port and serves forever, one thread per request.
/// Requests share nothing mutable; the app state behind the `Arc` is
/// read-only after startup.
pub fn serve(options: Options) -> Result<()> {
    let addr = format!("0.0.0.0:{}", options.port);
    let server = Server::http(&addr).map_err(|err| anyhow!("server: listen on {addr}: {err}"))?;
    tracing::info!(%addr, "listening");

    let app = Arc::new(App {
        max_images: options.max_images,
        fixed: options.fixed_credentials,
        pocket: options.pocket,
    });
    for request in server.incoming_requests() {
        let app = Arc::clone(&app);
        thread::spawn(move || handle(&app, request));
    }
    Ok(())
}

fn handle(app: &App, mut request: Request) {
    let reply = match parts(&mut request) {
        Ok(parts) => {
            tracing::debug!(method = %parts.method, path = %parts.path, "request");
            dispatch(app, &parts)
                .unwrap_or_else(|err| translate_error(err, parts.lang, parts.htmx))
        }
        Err(err) => {
            tracing::warn!(error = ?err, "malformed request");
            Reply::html("bad request".into()).with_status(400)
        }
    };
    if let Err(err) = request.respond(reply.into_response()) {
        tracing::warn!(error = %err, "failed to write response");
    }
}

fn dispatch(app: &App, parts: &Parts) -> Result<Reply> {
    match (&parts.method, parts.path.as_str()) {
        (Method::Get, "/") => index(app, parts),
        (Method::Get, "/load_more") => load_more(app, parts),
        (Method::Post, "/mark_as_read") => mark_as_read(app, parts),
        (Method::Get, "/login") => login(app, parts),
        (Method::Post, "/auth") => authenticate(parts),
        (Method::Post, "/deauth") => Ok(deauthenticate()),
        (Method::Post, "/pocket") => save_to_pocket(app, parts),
        (Method::Get, "/static/style.css") => Ok(Reply::asset(STYLE_CSS, "text/css; charset=utf-8")),
        (Method::Get, "/static/script.js") => {
            Ok(Reply::asset(SCRIPT_JS, "application/javascript; charset=utf-8"))
        }
        _ => Ok(Reply::html("not found".into()).with_status(404)),
    }
}

fn index(app: &App, parts: &Parts) -> Result<Reply> {
    let creds = credentials(app, parts)?;
    let client = feed_client(&creds)?;
    let filters = Filters::from_parts(parts);

    let groups = client.groups()?;
    let mut items = client.unread_items()?;
    apply_filters(&mut items, &filters, &groups);

    let images = images::collect_images(&items);
    Ok(Reply::html(render::render_index(
        &images,
        app.max_images,
        app.pocket.is_some(),
        parts.lang,
        &groups.groups,
        filters.group_id,
        filters.today,
    )))
}

fn load_more(app: &App, parts: &Parts) -> Result<Reply> {
    let creds = credentials(app, parts)?;
    let client = feed_client(&creds)?;
    let filters = Filters::from_parts(parts);

    let mut items = client.unread_items()?;
    if filters.group_id.is_some() || filters.today {
        let groups = client.groups()?;
        apply_filters(&mut items, &filters, &groups);
    }

    let images = images::collect_images(&items);
    let remaining = images::remaining_after(&images, query_value(parts, "max_uid").as_deref());
    let session_max_uid = query_value(parts, "session_max_uid").unwrap_or_default();

    let mut body = render::render_images_html(remaining, app.max_images, app.pocket.is_some());
    body.push_str(&render::render_button_html(
        remaining,
        app.max_images,
        &session_max_uid,
        &render::filter_query(filters.group_id, filters.today),
        parts.lang,
    ));
    Ok(Reply::html(body))
}

fn mark_as_read(app: &App, parts: &Parts) -> Result<Reply> {
    let creds = credentials(app, parts)?;
    let client = feed_client(&creds)?;
    let session_max_uid = require_query(parts, "session_max_uid")?;
    let min_uid = require_query(parts, "min_uid")?;

    // The range always covers the unfiltered unread list; uids from a
    // filtered page still name item ids in the global order.
    let images = images::collect_images(&client.unread_items()?);
    let ids = images::item_ids_in_range(&images, &min_uid, &session_max_uid)?;
    client.mark_items_read(&ids)?;
    tracing::info!(count = ids.len(), "marked items read");

    Ok(Reply::html(parts.lang.marked_read(ids.len())).with_header("HX-Refresh", "true"))
}

fn login(app: &App, parts: &Parts) -> Result<Reply> {
    if let Ok(creds) = credentials(app, parts) {
        match auth::verify(&creds) {
            Ok(()) => return Ok(Reply::see_other("/")),
            Err(err) if err.downcast_ref::<AuthError>().is_none() => return Err(err),
            Err(_) => {}
        }
    }
    Ok(Reply::html(render::render_login_html(parts.lang)))
}

fn authenticate(parts: &Parts) -> Result<Reply> {
    let form: HashMap<String, String> = form_urlencoded::parse(parts.body.as_bytes())
        .into_owned()
        .collect();
    let creds = Credentials {
        endpoint: form_field(&form, "endpoint")?,
        username: form_field(&form, "username")?,
        password: form_field(&form, "password")?,
    };
    auth::verify(&creds)?;

    let cookie = creds.to_cookie()?;
    Ok(Reply::empty()
        .with_header(
            "Set-Cookie",
            &format!("{AUTH_COOKIE}={cookie}; Path=/; HttpOnly; SameSite=Lax"),
        )
        .with_header("HX-Redirect", "/"))
}

fn deauthenticate() -> Reply {
    Reply::empty()
        .with_header("Set-Cookie", &format!("{AUTH_COOKIE}=; Path=/; Max-Age=0"))
        .with_header("HX-Redirect", "/login")
}

fn save_to_pocket(app: &App, parts: &Parts) -> Result<Reply> {
    credentials(app, parts)?;
    let Some(client) = app.pocket.as_ref() else {
        return Ok(Reply::html(parts.lang.pocket_not_configured().into()));
    };
    let url = require_query(parts, "url")?;
    let tags: Vec<String> = parts
        .query
        .iter()
        .filter(|(name, _)| name == "tag")
        .map(|(_, value)| value.clone())
        .collect();
    client.add(&url, &tags)?;
    Ok(Reply::html(parts.lang.added_to_pocket(&url)))
}

/// Maps a failed handler to the response contract: missing credentials go
/// to the login page, rejected ones become a 401 toast, and everything else
/// is a 500 with the localized generic message.
fn translate_error(err: anyhow::Error, lang: Lang, htmx: bool) -> Reply {
    match err.downcast_ref::<AuthError>() {
        Some(AuthError::Missing) => {
            if htmx {
                Reply::empty().with_header("HX-Redirect", "/login")
            } else {
                Reply::see_other("/login")
            }
        }
        Some(AuthError::Rejected) => {
            tracing::info!("credentials rejected");
            Reply::html(lang.auth_failed().into())
                .with_status(401)
                .with_header("HX-Trigger", &toast_trigger(lang.auth_failed()))
        }
        None => {
            tracing::error!(error = ?err, "request failed");
            sentry::integrations::anyhow::capture_anyhow(&err);
            Reply::html(lang.generic_error().into()).with_status(500)
        }
    }
}

fn credentials(app: &App, parts: &Parts) -> Result<Credentials, AuthError> {
    auth::resolve(
        app.fixed.as_ref(),
        parts.cookies.get(AUTH_COOKIE).map(String::as_str),
    )
}

fn feed_client(creds: &Credentials) -> Result<fever::Client> {
    fever::Client::new(fever::ClientConfig {
        endpoint: creds.endpoint.clone(),
        username: creds.username.clone(),
        password: creds.password.clone(),
        http_client: None,
    })
}

struct Filters {
    group_id: Option<u64>,
    today: bool,
    tz: Tz,
}

impl Filters {
    fn from_parts(parts: &Parts) -> Self {
        Filters {
            group_id: query_value(parts, "group_id").and_then(|raw| raw.parse().ok()),
            today: query_value(parts, "today").as_deref() == Some("1"),
            tz: parts
                .cookies
                .get(TZ_COOKIE)
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(Tz::UTC),
        }
    }
}

fn apply_filters(items: &mut Vec<fever::Item>, filters: &Filters, groups: &fever::Groups) {
    if let Some(group_id) = filters.group_id {
        let feed_ids = groups.feed_ids_for(group_id).unwrap_or_default();
        items.retain(|item| feed_ids.contains(&item.feed_id));
    }
    if filters.today {
        let now = Utc::now();
        items.retain(|item| same_day(item.created_on_time, now, &filters.tz));
    }
}

fn same_day(created_on_time: i64, now: DateTime<Utc>, tz: &Tz) -> bool {
    match DateTime::<Utc>::from_timestamp(created_on_time, 0) {
        Some(created) => created.with_timezone(tz).date_naive() == now.with_timezone(tz).date_naive(),
        None => false,
    }
}

// tiny_http header values must stay ASCII, so the toast payload carries
// non-ASCII text as \u escapes.
fn toast_trigger(message: &str) -> String {
    let mut escaped = String::with_capacity(message.len());
    for c in message.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            c if (c as u32) < 0x20 => escaped.push_str(&format!("\\u{:04x}", c as u32)),
            c if c.is_ascii() => escaped.push(c),
            c => {
                let mut buf = [0u16; 2];
                for unit in c.encode_utf16(&mut buf) {
                    escaped.push_str(&format!("\\u{unit:04x}"));
                }
            }
        }
    }
    format!(r#"{{"toast": "{escaped}"}}"#)
}

struct Parts {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    cookies: HashMap<String, String>,
    lang: Lang,
    htmx: bool,
    body: String,
}

fn parts(request: &mut Request) -> Result<Parts> {
    let url = Url::parse(&format!("http://dummy{}", request.url()))
        .context("server: parse request url")?;
    let query = url.query_pairs().into_owned().collect();
    let cookies = parse_cookies(header_value(request, "cookie").as_deref().unwrap_or(""));
    let lang = Lang::from_accept_language(header_value(request, "accept-language").as_deref());
    let htmx = header_value(request, "hx-request").as_deref() == Some("true");

    let mut body = String::new();
    if request.method() == &Method::Post {
        request
            .as_reader()
            .read_to_string(&mut body)
            .context("server: read request body")?;
    }

    Ok(Parts {
        method: request.method().clone(),
        path: url.path().to_string(),
        query,
        cookies,
        lang,
        htmx,
        body,
    })
}

fn header_value(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|header| header.field.as_str().as_str().eq_ignore_ascii_case(name))
        .map(|header| header.value.as_str().to_string())
}

fn parse_cookies(raw: &str) -> HashMap<String, String> {
    raw.split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

fn query_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .query
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.clone())
}

fn require_query(parts: &Parts, name: &str) -> Result<String> {
    query_value(parts, name).ok_or_else(|| anyhow!("missing {name} query parameter"))
}

fn form_field(form: &HashMap<String, String>, name: &str) -> Result<String> {
    form.get(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| anyhow!("missing {name} form field"))
}

#[derive(Debug)]
struct Reply {
    status: u16,
    body: String,
    headers: Vec<(String, String)>,
}

impl Reply {
    fn html(body: String) -> Self {
        Reply {
            status: 200,
            body,
            headers: vec![("Content-Type".into(), "text/html; charset=utf-8".into())],
        }
    }

    fn asset(body: &str, content_type: &str) -> Self {
        Reply {
            status: 200,
            body: body.to_string(),
            headers: vec![("Content-Type".into(), content_type.into())],
        }
    }

    fn empty() -> Self {
        Reply {
            status: 200,
            body: String::new(),
            headers: Vec::new(),
        }
    }

    fn see_other(location: &str) -> Self {
        Reply {
            status: 303,
            body: String::new(),
            headers: vec![("Location".into(), location.into())],
        }
    }

    fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    fn into_response(self) -> Response<Cursor<Vec<u8>>> {
        let mut response = Response::from_string(self.body).with_status_code(self.status);
        for (name, value) in &self.headers {
            response = response.with_header(
                Header::from_bytes(name.as_bytes(), value.as_bytes()).expect("valid header"),
            );
        }
        response
    }
}
