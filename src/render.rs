use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::fever::Group;
use crate::i18n::Lang;
use crate::images::Image;

// Characters that must not pass through unencoded inside a query value.
const QUERY_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'\'')
    .add(b'<')
    .add(b'>')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'=')
    .add(b'?');

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

pub fn encode_query(raw: &str) -> String {
    utf8_percent_encode(raw, QUERY_VALUE).to_string()
}

/// Query-string suffix carrying the active filters, threaded through the
/// load-more and mark-read controls so paging keeps the current view.
pub fn filter_query(group_id: Option<u64>, today: bool) -> String {
    let mut query = String::new();
    if let Some(id) = group_id {
        query.push_str(&format!("&group_id={id}"));
    }
    if today {
        query.push_str("&today=1");
    }
    query
}

/// Full index page: group navigation, the first page of the waterfall, and
/// the control that drives paging.
#[allow(clippy::too_many_arguments)]
pub fn render_index(
    images: &[Image],
    max_images: usize,
    pocket_enabled: bool,
    lang: Lang,
    groups: &[Group],
    selected_group: Option<u64>,
    today: bool,
) -> String {
    let session_max_uid = images.first().map(|image| image.uid.as_str()).unwrap_or("");
    let extra = filter_query(selected_group, today);
    let nav = render_nav(groups, selected_group, today, lang);
    let grid = render_images_html(images, max_images, pocket_enabled);
    let control = render_button_html(images, max_images, session_max_uid, &extra, lang);
    format!(
        r#"<!DOCTYPE html>
<html lang="{}">
{}
<body>
{nav}
<main id="waterfall" class="waterfall">
{grid}{control}
</main>
<div id="toast" class="toast" hidden></div>
</body>
</html>"#,
        lang.html_lang(),
        render_head(),
    )
}

/// Up to `max_images` grid cells; the rest of the list stays server-side
/// until the load-more control asks for it.
pub fn render_images_html(images: &[Image], max_images: usize, pocket_enabled: bool) -> String {
    let mut html = String::new();
    for image in images.iter().take(max_images) {
        let href = escape_html(&image.url);
        let src = escape_html(&image.image_url);
        html.push_str(&format!(
            r#"<div class="cell"><a href="{href}" target="_blank" rel="noreferrer"><img src="{src}" loading="lazy" /></a>"#
        ));
        if pocket_enabled {
            let save_url = format!("/pocket?url={}", encode_query(&image.url));
            html.push_str(&format!(
                r#"<button class="save" hx-post="{}" hx-swap="none">Pocket</button>"#,
                escape_html(&save_url)
            ));
        }
        html.push_str("</div>\n");
    }
    html
}

/// The control below the grid. More images than fit on one page keeps the
/// waterfall going; a final partial page offers to mark the session read;
/// an empty list is the caught-up state.
pub fn render_button_html(
    remaining: &[Image],
    max_images: usize,
    session_max_uid: &str,
    extra_query: &str,
    lang: Lang,
) -> String {
    if remaining.len() > max_images {
        let max_uid = &remaining[max_images - 1].uid;
        let url = format!(
            "/load_more?max_uid={}&session_max_uid={}{}",
            encode_query(max_uid),
            encode_query(session_max_uid),
            extra_query
        );
        format!(
            r##"<button id="control" class="control" hx-get="{}" hx-target="#control" hx-swap="outerHTML">{}</button>"##,
            escape_html(&url),
            lang.load_more()
        )
    } else if let Some(last) = remaining.last() {
        let url = format!(
            "/mark_as_read?session_max_uid={}&min_uid={}",
            encode_query(session_max_uid),
            encode_query(&last.uid)
        );
        format!(
            r##"<button id="control" class="control done" hx-post="{}" hx-target="#control" hx-swap="outerHTML">{}</button>"##,
            escape_html(&url),
            lang.mark_read()
        )
    } else {
        format!(
            r#"<p id="control" class="control empty">{}</p>"#,
            lang.all_caught_up()
        )
    }
}

pub fn render_login_html(lang: Lang) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="{}">
{}
<body>
<form class="card login" hx-post="/auth" hx-swap="none">
  <h1>{}</h1>
  <label>{}<input type="url" name="endpoint" required placeholder="https://reader.example/api/fever.php" /></label>
  <label>{}<input type="text" name="username" required /></label>
  <label>{}<input type="password" name="password" required /></label>
  <button type="submit">{}</button>
</form>
<div id="toast" class="toast" hidden></div>
</body>
</html>"#,
        lang.html_lang(),
        render_head(),
        lang.sign_in(),
        lang.endpoint_label(),
        lang.username_label(),
        lang.password_label(),
        lang.sign_in(),
    )
}

fn render_head() -> String {
    r#"<head>
<meta charset="utf-8" />
<meta name="viewport" content="width=device-width, initial-scale=1" />
<title>RSS Waterfall</title>
<link rel="stylesheet" href="/static/style.css" />
<script src="https://unpkg.com/htmx.org@1.9.12"></script>
<script src="/static/script.js" defer></script>
</head>"#
        .to_string()
}

fn render_nav(groups: &[Group], selected_group: Option<u64>, today: bool, lang: Lang) -> String {
    let today_suffix = if today { "?today=1" } else { "" };
    let mut nav = String::from(r#"<nav class="groups">"#);

    let all_class = if selected_group.is_none() {
        r#" class="active""#
    } else {
        ""
    };
    nav.push_str(&format!(
        r#"<a href="/{today_suffix}"{all_class}>{}</a>"#,
        lang.all_groups()
    ));

    for group in groups {
        let class = if selected_group == Some(group.id) {
            r#" class="active""#
        } else {
            ""
        };
        let href = format!(
            "/?group_id={}{}",
            group.id,
            if today { "&today=1" } else { "" }
        );
        nav.push_str(&format!(
            r#"<a href="{}"{class}>{}</a>"#,
            escape_html(&href),
            escape_html(&group.title)
        ));
    }

    // The today link toggles the filter while keeping the group selection.
    let group_part = selected_group
        .map(|id| format!("group_id={id}"))
        .unwrap_or_default();
    let today_href = match (today, group_part.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/?{group_part}"),
        (false, true) => "/?today=1".to_string(),
        (false, false) => format!("/?{group_part}&today=1"),
    };
    let today_class = if today {
        r#" class="active today""#
    } else {
        r#" class="today""#
    };
    nav.push_str(&format!(
        r#"<a href="{}"{today_class}>{}</a>"#,
        escape_html(&today_href),
        lang.today_filter()
    ));

    nav.push_str(&format!(
        r#"<button class="signout" hx-post="/deauth">{}</button>"#,
        lang.sign_out()
    ));
    nav.push_str("</nav>");
    nav
}
