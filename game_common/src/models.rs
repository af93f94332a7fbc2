//! Domain types for games moving from a Steam library into Notion

use crate::error::RecordError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Steam application id
pub type AppId = u32;

/// Platform tag attached to every game coming from the Steam library
pub const STEAM_PLATFORM: &str = "Steam";

/// Case and whitespace normalized title used to match games against
/// existing destination records.
///
/// Matching is exact on the normalized form, so "Portal 2" and " portal 2 "
/// collide while "Portal 2" and "Portal II" do not.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NaturalKey(String);

impl NaturalKey {
    pub fn from_name(name: &str) -> Self {
        Self(name.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata augmented from the Steam Store, as kept in the local cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMetadata {
    /// Release date exactly as rendered by the store
    #[serde(default)]
    pub release_date_raw: Option<String>,
    #[serde(default)]
    pub header_image: Option<String>,
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub is_free: bool,
    /// The store no longer lists this app
    #[serde(default)]
    pub delisted: bool,
}

impl StoreMetadata {
    /// Metadata for an app the store answered with `success: false`
    pub fn delisted() -> Self {
        Self {
            delisted: true,
            ..Self::default()
        }
    }
}

/// One title to synchronize
#[derive(Debug, Clone, PartialEq)]
pub struct GameRecord {
    id: AppId,
    name: String,
    pub platforms: BTreeSet<String>,
    pub playtime_minutes: u32,
    pub release_date: Option<NaiveDate>,
    pub release_date_raw: Option<String>,
    /// Header (store) or logo (library) image, used as the default cover
    pub logo_uri: Option<String>,
    pub icon_uri: Option<String>,
    pub background_uri: Option<String>,
    pub free: bool,
    pub delisted: bool,
}

impl GameRecord {
    /// Create a record tagged with the Steam platform.
    ///
    /// Fails when the trimmed name is empty, since the name is the natural
    /// key used for duplicate detection.
    pub fn new(id: AppId, name: &str) -> Result<Self, RecordError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RecordError::EmptyName(id));
        }

        Ok(Self {
            id,
            name: name.to_string(),
            platforms: BTreeSet::from([STEAM_PLATFORM.to_string()]),
            playtime_minutes: 0,
            release_date: None,
            release_date_raw: None,
            logo_uri: None,
            icon_uri: None,
            background_uri: None,
            free: false,
            delisted: false,
        })
    }

    pub fn id(&self) -> AppId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::from_name(&self.name)
    }

    /// Playtime in hours, rounded to two decimals
    pub fn playtime_hours(&self) -> f64 {
        (f64::from(self.playtime_minutes) / 60.0 * 100.0).round() / 100.0
    }

    /// Human readable playtime for the notes column
    pub fn playtime_label(&self) -> String {
        match self.playtime_minutes {
            0 => "Never played".to_string(),
            m if m < 120 => format!("{} minutes", m),
            m => format!("{} hours", m / 60),
        }
    }

    /// Merge store metadata into a record built from library data.
    ///
    /// Library images are kept when the store has none.
    pub fn with_store_metadata(mut self, meta: &StoreMetadata) -> Self {
        if meta.header_image.is_some() {
            self.logo_uri = meta.header_image.clone();
        }
        if meta.background.is_some() {
            self.background_uri = meta.background.clone();
        }
        self.release_date_raw = meta.release_date_raw.clone();
        self.free = meta.is_free;
        self.delisted = meta.delisted;
        self
    }

    /// Page cover: the store background when requested and available,
    /// otherwise the header/logo image
    pub fn cover_uri(&self, use_background: bool) -> Option<&str> {
        if use_background {
            if let Some(ref bg) = self.background_uri {
                return Some(bg);
            }
        }
        self.logo_uri.as_deref()
    }

    /// Page icon: the library icon, falling back to the logo
    pub fn icon(&self) -> Option<&str> {
        self.icon_uri.as_deref().or(self.logo_uri.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_key_trims_and_lowercases() {
        assert_eq!(NaturalKey::from_name("  Portal 2 ").as_str(), "portal 2");
        assert_eq!(
            NaturalKey::from_name("PORTAL 2"),
            NaturalKey::from_name("portal 2")
        );
    }

    #[test]
    fn natural_key_keeps_near_duplicates_distinct() {
        assert_ne!(
            NaturalKey::from_name("Portal 2"),
            NaturalKey::from_name("Portal  2")
        );
        assert_ne!(
            NaturalKey::from_name("Portal 2"),
            NaturalKey::from_name("Portal II")
        );
    }

    #[test]
    fn new_rejects_empty_name() {
        assert_eq!(GameRecord::new(10, "   "), Err(RecordError::EmptyName(10)));
    }

    #[test]
    fn new_tags_steam_platform() {
        let game = GameRecord::new(620, " Portal 2 ").unwrap();
        assert_eq!(game.name(), "Portal 2");
        assert!(game.platforms.contains(STEAM_PLATFORM));
        assert!(!game.free);
        assert!(!game.delisted);
    }

    #[test]
    fn playtime_hours_rounds_to_two_decimals() {
        let mut game = GameRecord::new(1, "Game").unwrap();
        game.playtime_minutes = 600;
        assert_eq!(game.playtime_hours(), 10.0);
        game.playtime_minutes = 100;
        assert_eq!(game.playtime_hours(), 1.67);
    }

    #[test]
    fn playtime_label_formats() {
        let mut game = GameRecord::new(1, "Game").unwrap();
        assert_eq!(game.playtime_label(), "Never played");
        game.playtime_minutes = 45;
        assert_eq!(game.playtime_label(), "45 minutes");
        game.playtime_minutes = 185;
        assert_eq!(game.playtime_label(), "3 hours");
    }

    #[test]
    fn store_metadata_overrides_library_images() {
        let mut game = GameRecord::new(1, "Game").unwrap();
        game.logo_uri = Some("https://library/logo.jpg".to_string());
        game.icon_uri = Some("https://library/icon.jpg".to_string());

        let meta = StoreMetadata {
            release_date_raw: Some("24 Feb, 2022".to_string()),
            header_image: Some("https://store/header.jpg".to_string()),
            background: None,
            is_free: true,
            delisted: false,
        };
        let game = game.with_store_metadata(&meta);

        assert_eq!(game.logo_uri.as_deref(), Some("https://store/header.jpg"));
        assert_eq!(game.icon(), Some("https://library/icon.jpg"));
        assert_eq!(game.release_date_raw.as_deref(), Some("24 Feb, 2022"));
        assert!(game.free);
    }

    #[test]
    fn cover_falls_back_to_logo_without_background() {
        let mut game = GameRecord::new(1, "Game").unwrap();
        game.logo_uri = Some("logo".to_string());
        assert_eq!(game.cover_uri(true), Some("logo"));

        game.background_uri = Some("bg".to_string());
        assert_eq!(game.cover_uri(true), Some("bg"));
        assert_eq!(game.cover_uri(false), Some("logo"));
    }

    #[test]
    fn store_metadata_roundtrips_through_json() {
        let meta = StoreMetadata {
            release_date_raw: Some("16. Nov. 2004".to_string()),
            header_image: Some("https://store/header.jpg".to_string()),
            background: Some("https://store/bg.jpg".to_string()),
            is_free: false,
            delisted: false,
        };
        let json = serde_json::to_string(&meta).unwrap();
        let back: StoreMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);

        // Older cache rows may lack newer fields
        let partial: StoreMetadata = serde_json::from_str(r#"{"is_free": true}"#).unwrap();
        assert!(partial.is_free);
        assert!(partial.header_image.is_none());
    }
}
