use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use crate::fever::Item;

static IMG_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img").expect("valid img selector"));

/// One embedded image of a feed item. `uid` is `{item_id}-{index}` and is
/// recomputed on every request, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub image_url: String,
    pub uid: String,
    pub url: String,
}

pub fn extract_images(html: &str, item: &Item) -> Vec<Image> {
    let document = Html::parse_fragment(html);
    document
        .select(&IMG_SELECTOR)
        .filter_map(|element| element.value().attr("src"))
        .enumerate()
        .map(|(index, src)| Image {
            image_url: src.to_string(),
            uid: format!("{}-{}", item.id, index),
            url: item.url.clone(),
        })
        .collect()
}

pub fn collect_images(items: &[Item]) -> Vec<Image> {
    items
        .iter()
        .flat_map(|item| extract_images(&item.html, item))
        .collect()
}

/// Inverts the `{item_id}-{index}` synthesis. Item ids are numeric, so the
/// digits before the first `-` are the whole id.
pub fn uid_to_item_id(uid: &str) -> Result<u64> {
    let (id, _) = uid
        .split_once('-')
        .ok_or_else(|| anyhow!("malformed image uid: {uid}"))?;
    id.parse()
        .with_context(|| format!("malformed image uid: {uid}"))
}

/// The slice strictly after the first image whose uid equals `max_uid`.
/// An unknown or absent marker leaves the whole list remaining.
pub fn remaining_after<'a>(images: &'a [Image], max_uid: Option<&str>) -> &'a [Image] {
    let Some(max_uid) = max_uid else {
        return images;
    };
    match images.iter().position(|image| image.uid == max_uid) {
        Some(index) => &images[index + 1..],
        None => images,
    }
}

/// Distinct item ids among `images` whose id falls in the inclusive range
/// spanned by the two uids.
pub fn item_ids_in_range(
    images: &[Image],
    min_uid: &str,
    session_max_uid: &str,
) -> Result<Vec<u64>> {
    let min_id = uid_to_item_id(min_uid)?;
    let max_id = uid_to_item_id(session_max_uid)?;
    let mut ids = Vec::new();
    for image in images {
        let id = uid_to_item_id(&image.uid)?;
        if (min_id..=max_id).contains(&id) && !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: u64, html: &str, url: &str) -> Item {
        Item {
            id,
            feed_id: 1,
            title: String::new(),
            author: String::new(),
            html: html.to_string(),
            url: url.to_string(),
            is_saved: 0,
            is_read: 0,
            created_on_time: 0,
        }
    }

    fn image(uid: &str) -> Image {
        Image {
            image_url: format!("https://img.test/{uid}.jpg"),
            uid: uid.to_string(),
            url: "https://item.test".into(),
        }
    }

    #[test]
    fn uid_round_trips_item_id() {
        assert_eq!(uid_to_item_id("3-0").unwrap(), 3);
        assert_eq!(uid_to_item_id("1234567-15").unwrap(), 1234567);
        assert_eq!(uid_to_item_id("0-0").unwrap(), 0);
    }

    #[test]
    fn malformed_uid_is_an_error() {
        assert!(uid_to_item_id("42").is_err());
        assert!(uid_to_item_id("x-1").is_err());
        assert!(uid_to_item_id("-1").is_err());
    }

    #[test]
    fn extracts_images_in_document_order() {
        let html = r#"<p>hi</p><img src="https://a.test/1.png"><div><img src="https://a.test/2.png" alt=""></div>"#;
        let images = extract_images(html, &item(7, html, "https://entry.test/7"));
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].uid, "7-0");
        assert_eq!(images[0].image_url, "https://a.test/1.png");
        assert_eq!(images[1].uid, "7-1");
        assert_eq!(images[1].image_url, "https://a.test/2.png");
        assert!(images.iter().all(|i| i.url == "https://entry.test/7"));
    }

    #[test]
    fn srcless_img_tags_are_skipped() {
        let html = r#"<img><img src="https://a.test/only.png">"#;
        let images = extract_images(html, &item(9, html, ""));
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].uid, "9-0");
    }

    #[test]
    fn collect_flattens_across_items() {
        let items = vec![
            item(5, r#"<img src="https://a.test/5.png">"#, "https://e/5"),
            item(3, r#"<img src="https://a.test/3a.png"><img src="https://a.test/3b.png">"#, "https://e/3"),
        ];
        let images = collect_images(&items);
        let uids: Vec<&str> = images.iter().map(|i| i.uid.as_str()).collect();
        assert_eq!(uids, vec!["5-0", "3-0", "3-1"]);
    }

    #[test]
    fn remaining_is_suffix_after_marker() {
        let images = vec![image("3-0"), image("3-1"), image("5-0")];
        let rest = remaining_after(&images, Some("3-0"));
        let uids: Vec<&str> = rest.iter().map(|i| i.uid.as_str()).collect();
        assert_eq!(uids, vec!["3-1", "5-0"]);
    }

    #[test]
    fn unknown_marker_leaves_everything_remaining() {
        let images = vec![image("3-0"), image("3-1")];
        assert_eq!(remaining_after(&images, Some("99-0")).len(), 2);
        assert_eq!(remaining_after(&images, None).len(), 2);
    }

    #[test]
    fn marker_on_last_image_leaves_nothing() {
        let images = vec![image("3-0"), image("3-1")];
        assert!(remaining_after(&images, Some("3-1")).is_empty());
    }

    #[test]
    fn range_selects_present_item_ids_inclusively() {
        let images = vec![image("3-0"), image("3-1"), image("5-0")];
        assert_eq!(item_ids_in_range(&images, "3-0", "5-0").unwrap(), vec![3, 5]);
    }

    #[test]
    fn range_includes_intermediate_present_ids() {
        let images = vec![image("3-0"), image("4-0"), image("5-0"), image("6-0")];
        assert_eq!(
            item_ids_in_range(&images, "3-0", "5-0").unwrap(),
            vec![3, 4, 5]
        );
    }

    #[test]
    fn inverted_range_selects_nothing() {
        let images = vec![image("3-0"), image("5-0")];
        assert!(item_ids_in_range(&images, "5-0", "3-0").unwrap().is_empty());
    }
}
