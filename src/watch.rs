use anyhow::{Context, Result};
use dialoguer::{Select, theme::ColorfulTheme};
use url::{Url, form_urlencoded};

use crate::library::WatchEntry;

/// Fills the player page template for a bookmarked episode.
/// The id is percent-encoded so `/`, `?` or `#` inside it cannot change the link's shape.
pub fn watch_link(template: &str, title_id: &str, episode: u32) -> Result<Url> {
    let encoded_id = form_urlencoded::byte_serialize(title_id.as_bytes())
        .collect::<String>()
        .replace('+', "%20");
    let link = template
        .replace("{id}", &encoded_id)
        .replace("{episode}", &episode.to_string());
    Url::parse(&link).with_context(|| format!("invalid watch link {link}"))
}

pub fn describe(entry: &WatchEntry) -> String {
    format!(
        "{} \u{00b7} episode {} \u{00b7} marked {}",
        entry.title_id,
        entry.episode,
        entry.marked_at.format("%Y-%m-%d %H:%M")
    )
}

pub fn select_entry(entries: &[WatchEntry]) -> Result<Option<WatchEntry>> {
    let items: Vec<String> = entries.iter().map(describe).collect();
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Continue watching (Esc to cancel)")
        .items(&items)
        .default(0)
        .interact_opt()?;
    Ok(selection.map(|idx| entries[idx].clone()))
}

pub fn open_link(link: &Url) -> Result<()> {
    open::that(link.as_str()).with_context(|| format!("failed to open {link}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn watch_link_substitutes_placeholders() {
        let link = watch_link("https://example.org/watch/{id}?ep={episode}", "one-piece", 12)
            .expect("link");
        assert_eq!(link.as_str(), "https://example.org/watch/one-piece?ep=12");
    }

    #[test]
    fn watch_link_encodes_unsafe_characters() {
        let link = watch_link("https://example.org/watch/{id}/{episode}", "spy x family", 1)
            .expect("link");
        assert_eq!(link.path(), "/watch/spy%20x%20family/1");
    }

    #[test]
    fn watch_link_keeps_reserved_characters_inside_the_id() {
        let link = watch_link("https://example.org/watch/{id}?ep={episode}", "fate/zero#2", 3)
            .expect("link");
        assert_eq!(link.path(), "/watch/fate%2Fzero%232");
        assert_eq!(link.query(), Some("ep=3"));
        assert_eq!(link.fragment(), None);

        let link = watch_link("https://example.org/watch/{id}?ep={episode}", "a?b+c", 1)
            .expect("link");
        assert_eq!(link.path(), "/watch/a%3Fb%2Bc");
        assert_eq!(link.query(), Some("ep=1"));
    }

    #[test]
    fn broken_template_is_reported() {
        assert!(watch_link("not a link {id}", "a", 1).is_err());
    }

    #[test]
    fn describe_mentions_episode_and_date() {
        let entry = WatchEntry {
            title_id: "frieren".to_string(),
            episode: 7,
            marked_at: Utc.with_ymd_and_hms(2024, 3, 9, 21, 5, 0).unwrap(),
        };
        assert_eq!(
            describe(&entry),
            "frieren \u{00b7} episode 7 \u{00b7} marked 2024-03-09 21:05"
        );
    }
}
