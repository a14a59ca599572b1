use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};
use tracing::debug;

use crate::storage::{BOOKMARKS_KEY, Storage, load_or_default, persist_snapshot};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub episode: u32,
    pub marked_at: DateTime<Utc>,
}

/// Older snapshots stored the bare episode number.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredBookmark {
    Full(Bookmark),
    Episode(u32),
}

impl From<StoredBookmark> for Bookmark {
    fn from(stored: StoredBookmark) -> Self {
        match stored {
            StoredBookmark::Full(bookmark) => bookmark,
            StoredBookmark::Episode(episode) => Bookmark {
                episode,
                marked_at: DateTime::<Utc>::default(),
            },
        }
    }
}

/// One "currently watching" episode per title.
pub struct BookmarksStore {
    storage: Arc<dyn Storage>,
    entries: BTreeMap<String, Bookmark>,
}

impl BookmarksStore {
    pub fn load(storage: Arc<dyn Storage>) -> Self {
        let stored: BTreeMap<String, StoredBookmark> =
            load_or_default(storage.as_ref(), BOOKMARKS_KEY);
        let entries = stored
            .into_iter()
            .map(|(id, stored)| (id, Bookmark::from(stored)))
            .filter(|(id, bookmark)| !id.trim().is_empty() && bookmark.episode > 0)
            .collect();
        Self { storage, entries }
    }

    /// Stores `episode` for the title, replacing any earlier bookmark.
    pub fn set(&mut self, title_id: &str, episode: u32) {
        self.entries.insert(
            title_id.to_string(),
            Bookmark {
                episode,
                marked_at: Utc::now(),
            },
        );
        debug!(title_id, episode, "set bookmark");
        self.persist();
    }

    pub fn remove(&mut self, title_id: &str) -> bool {
        if self.entries.remove(title_id).is_none() {
            return false;
        }
        debug!(title_id, "removed bookmark");
        self.persist();
        true
    }

    pub fn get(&self, title_id: &str) -> Option<u32> {
        self.entries.get(title_id).map(|bookmark| bookmark.episode)
    }

    /// True only when the stored episode is exactly `episode`.
    pub fn is_bookmarked(&self, title_id: &str, episode: u32) -> bool {
        self.get(title_id) == Some(episode)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Bookmark)> {
        self.entries.iter().map(|(id, bookmark)| (id.as_str(), bookmark))
    }

    fn persist(&self) {
        persist_snapshot(self.storage.as_ref(), BOOKMARKS_KEY, &self.entries);
    }
}
