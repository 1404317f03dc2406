use std::collections::HashSet;

use crate::services::gatherers::GatheredItem;

/// Drop items without a URL, keep the first item seen for each URL and
/// normalise titles. Running it on its own output changes nothing.
pub fn clean(items: Vec<GatheredItem>) -> Vec<GatheredItem> {
    let mut seen = HashSet::new();

    items
        .into_iter()
        .filter(|item| !item.url.trim().is_empty())
        .filter(|item| seen.insert(item.url.clone()))
        .map(|item| GatheredItem {
            title: normalize_title(&item.title),
            ..item
        })
        .collect()
}

/// Collapse whitespace and title-case every word: a letter is upper-cased when
/// it follows a non-letter and lower-cased otherwise.
pub fn normalize_title(title: &str) -> String {
    let collapsed = title.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut out = String::with_capacity(collapsed.len());
    let mut prev_alpha = false;
    for ch in collapsed.chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(url: &str, title: &str) -> GatheredItem {
        GatheredItem {
            source: "GitHub".to_string(),
            title: title.to_string(),
            url: url.to_string(),
            language: "Rust".to_string(),
            code: String::new(),
            stars: 1,
        }
    }

    #[test]
    fn first_occurrence_per_url_wins() {
        let cleaned = clean(vec![
            item("https://a", "first"),
            item("https://b", "other"),
            item("https://a", "second"),
        ]);
        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned[0].title, "First");
        assert_eq!(cleaned[1].url, "https://b");
    }

    #[test]
    fn items_without_url_are_dropped() {
        let cleaned = clean(vec![item("", "nothing"), item("  ", "blank"), item("https://c", "c")]);
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].url, "https://c");
    }

    #[test]
    fn titles_are_normalised() {
        assert_eq!(normalize_title("  how to   PARSE json\tin rust "), "How To Parse Json In Rust");
        assert_eq!(normalize_title("tokio-rs/axum"), "Tokio-Rs/Axum");
    }

    #[test]
    fn cleaning_is_idempotent() {
        let input = vec![
            item("https://a", " mixed   CASE title "),
            item("https://a", "dupe"),
            item("", "no url"),
            item("https://b", "what's new in 2024?"),
        ];
        let once = clean(input);
        let twice = clean(once.clone());
        assert_eq!(once, twice);
    }
}
