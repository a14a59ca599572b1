use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use crate::{
    bookmarks::BookmarksStore, error::ShelfError, favorites::FavoritesStore, storage::Storage,
};

/// A bookmarked title as shown in the "continue watching" row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEntry {
    pub title_id: String,
    pub episode: u32,
    pub marked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkOutcome {
    /// The title was not a favorite before and was added as one.
    pub favorited: bool,
}

/// Favorites and bookmarks for one user, built once at startup.
///
/// The two stores persist independently. Marking an episode writes the
/// bookmark first and the favorite second, so an interrupted process can leave
/// a bookmark without a favorite; [`Library::reconcile`] repairs that.
/// Removing a favorite leaves its bookmark in place.
pub struct Library {
    favorites: FavoritesStore,
    bookmarks: BookmarksStore,
}

impl Library {
    pub fn open(storage: Arc<dyn Storage>) -> Self {
        Self {
            favorites: FavoritesStore::load(Arc::clone(&storage)),
            bookmarks: BookmarksStore::load(storage),
        }
    }

    pub fn favorites(&self) -> &FavoritesStore {
        &self.favorites
    }

    /// Returns true when the title was newly added. Blank ids are rejected.
    pub fn add_favorite(&mut self, title_id: &str) -> Result<bool, ShelfError> {
        check_id(title_id)?;
        Ok(self.favorites.add(title_id))
    }

    pub fn remove_favorite(&mut self, title_id: &str) -> bool {
        self.favorites.remove(title_id)
    }

    pub fn is_favorite(&self, title_id: &str) -> bool {
        self.favorites.contains(title_id)
    }

    /// Bookmarks `episode` and favorites the title if it was not already.
    pub fn mark_episode(
        &mut self,
        title_id: &str,
        episode: u32,
    ) -> Result<MarkOutcome, ShelfError> {
        check_id(title_id)?;
        if episode == 0 {
            return Err(ShelfError::InvalidEpisode(episode));
        }
        self.bookmarks.set(title_id, episode);
        let favorited = self.favorites.add(title_id);
        Ok(MarkOutcome { favorited })
    }

    pub fn unmark(&mut self, title_id: &str) -> bool {
        self.bookmarks.remove(title_id)
    }

    pub fn bookmark(&self, title_id: &str) -> Option<u32> {
        self.bookmarks.get(title_id)
    }

    pub fn is_bookmarked(&self, title_id: &str, episode: u32) -> bool {
        self.bookmarks.is_bookmarked(title_id, episode)
    }

    /// Bookmarks, most recently marked first.
    pub fn continue_watching(&self) -> Vec<WatchEntry> {
        let mut entries: Vec<WatchEntry> = self
            .bookmarks
            .entries()
            .map(|(id, bookmark)| WatchEntry {
                title_id: id.to_string(),
                episode: bookmark.episode,
                marked_at: bookmark.marked_at,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.marked_at
                .cmp(&a.marked_at)
                .then_with(|| a.title_id.cmp(&b.title_id))
        });
        entries
    }

    /// Favorites every bookmarked title that is missing from favorites.
    pub fn reconcile(&mut self) -> Vec<String> {
        let orphans: Vec<String> = self
            .bookmarks
            .entries()
            .map(|(id, _)| id)
            .filter(|id| !self.favorites.contains(id))
            .map(str::to_string)
            .collect();
        for id in &orphans {
            self.favorites.add(id);
        }
        if !orphans.is_empty() {
            info!(count = orphans.len(), "restored favorites for bookmarked titles");
        }
        orphans
    }
}

fn check_id(title_id: &str) -> Result<(), ShelfError> {
    if title_id.trim().is_empty() {
        return Err(ShelfError::EmptyId);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{BOOKMARKS_KEY, MemoryStorage};

    fn library() -> Library {
        Library::open(Arc::new(MemoryStorage::new()))
    }

    #[test]
    fn marking_an_episode_favorites_the_title() {
        let mut lib = library();
        let outcome = lib.mark_episode("spy-family", 5).expect("mark");
        assert!(outcome.favorited);
        assert!(lib.is_favorite("spy-family"));
        assert!(lib.is_bookmarked("spy-family", 5));
    }

    #[test]
    fn marking_an_existing_favorite_does_not_duplicate_it() {
        let mut lib = library();
        lib.add_favorite("a").expect("add");
        let outcome = lib.mark_episode("a", 1).expect("mark");
        assert!(!outcome.favorited);
        assert_eq!(lib.favorites().list(), vec!["a"]);
    }

    #[test]
    fn episode_zero_is_rejected_without_side_effects() {
        let mut lib = library();
        let err = lib.mark_episode("a", 0).expect_err("zero episode");
        assert!(matches!(err, ShelfError::InvalidEpisode(0)));
        assert!(!lib.is_favorite("a"));
        assert_eq!(lib.bookmark("a"), None);
    }

    #[test]
    fn remarking_moves_the_bookmark() {
        let mut lib = library();
        lib.mark_episode("a", 2).expect("mark");
        lib.mark_episode("a", 3).expect("mark");
        assert!(!lib.is_bookmarked("a", 2));
        assert!(lib.is_bookmarked("a", 3));
    }

    #[test]
    fn removing_a_favorite_keeps_its_bookmark() {
        let mut lib = library();
        lib.mark_episode("a", 4).expect("mark");
        assert!(lib.remove_favorite("a"));
        assert_eq!(lib.bookmark("a"), Some(4));
    }

    #[test]
    fn unmark_leaves_favorites_alone() {
        let mut lib = library();
        lib.mark_episode("a", 4).expect("mark");
        assert!(lib.unmark("a"));
        assert!(lib.is_favorite("a"));
        assert_eq!(lib.bookmark("a"), None);
    }

    #[test]
    fn reconcile_restores_missing_favorites() {
        let storage = Arc::new(MemoryStorage::with_value(
            BOOKMARKS_KEY,
            r#"{"orphan": 3, "kept": 1}"#,
        ));
        let mut lib = Library::open(storage);
        lib.add_favorite("kept").expect("add");

        let repaired = lib.reconcile();
        assert_eq!(repaired, vec!["orphan".to_string()]);
        assert!(lib.is_favorite("orphan"));
        assert!(lib.reconcile().is_empty());
    }

    #[test]
    fn continue_watching_is_most_recent_first() {
        let storage = Arc::new(MemoryStorage::with_value(
            BOOKMARKS_KEY,
            r#"{
                "old": {"episode": 1, "marked_at": "2023-05-01T10:00:00Z"},
                "new": {"episode": 9, "marked_at": "2024-05-01T10:00:00Z"}
            }"#,
        ));
        let lib = Library::open(storage);
        let ids: Vec<String> = lib
            .continue_watching()
            .into_iter()
            .map(|entry| entry.title_id)
            .collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[test]
    fn blank_ids_are_rejected_and_nothing_is_saved() {
        let storage = Arc::new(MemoryStorage::new());
        let mut lib = Library::open(storage.clone());
        assert!(matches!(lib.add_favorite(""), Err(ShelfError::EmptyId)));
        assert!(matches!(lib.add_favorite("  "), Err(ShelfError::EmptyId)));
        assert!(matches!(lib.mark_episode("", 3), Err(ShelfError::EmptyId)));
        assert!(lib.favorites().is_empty());
        assert_eq!(lib.bookmark(""), None);

        let reloaded = Library::open(storage);
        assert!(reloaded.favorites().is_empty());
    }
}
