//! Genre/radio catalog.
//!
//! The catalog file is JSON:
//!
//! ```text
//! { "genres": [ { "name": "Jazz",
//!                 "radios": [ { "name": "...", "description": "...",
//!                               "url": "...", "playlist": true, "img": "..." } ] } ] }
//! ```
//!
//! The controller only needs `url` and `playlist`; the rest is display data
//! for the UI collaborator.
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::protocol::StreamRequest;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RadioCatalog {
    #[serde(default)]
    pub genres: Vec<Genre>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genre {
    pub name: String,
    #[serde(default)]
    pub radios: Vec<Radio>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Radio {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    /// The url is a playlist (.pls/.m3u) rather than a direct stream.
    #[serde(default)]
    pub playlist: bool,
    /// Logo path, relative to the catalog file.
    #[serde(default)]
    pub img: String,
}

impl Radio {
    pub fn to_request(&self) -> StreamRequest {
        StreamRequest {
            name: self.name.clone(),
            url: self.url.clone(),
            is_playlist: self.playlist,
        }
    }
}

impl RadioCatalog {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let catalog = Self::from_json_str(&content)?;
        tracing::info!(
            "Loaded {} radios in {} genres from {}",
            catalog.len(),
            catalog.genres.len(),
            path.display()
        );
        Ok(catalog)
    }

    pub fn from_json_str(content: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Every radio with the genre it is listed under, in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&Genre, &Radio)> {
        self.genres
            .iter()
            .flat_map(|g| g.radios.iter().map(move |r| (g, r)))
    }

    pub fn len(&self) -> usize {
        self.genres.iter().map(|g| g.radios.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First radio whose name matches, ignoring case.
    pub fn find(&self, name: &str) -> Option<&Radio> {
        let name = name.trim();
        self.iter()
            .map(|(_, r)| r)
            .find(|r| r.name.eq_ignore_ascii_case(name))
    }
}
