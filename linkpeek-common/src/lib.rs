//! Common types and utilities shared across linkpeek crates.
//!
//! This crate defines the content classification shared by the extractor,
//! configuration and CLI, the knobs that select how a preview is performed,
//! and the observability helpers. It is intentionally lightweight so that
//! every crate can depend on it without pulling in the HTTP or HTML stack.
//!
//! # Overview
//!
//! - [`ContentKind`]: what a previewed URL points to
//! - [`ExtractMode`]: fetch-then-parse or direct document load
//! - [`StatusPolicy`]: what to do with a non-2xx response
//! - [`observability`]: centralised tracing/logging initialisation
//!
//! # Examples
//!
//! ```rust
//! use linkpeek_common::{ContentKind, ExtractMode};
//!
//! let kind: ContentKind = "music.radio_station".parse().unwrap();
//! assert_eq!(kind, ContentKind::MusicRadioStation);
//! assert_eq!(ExtractMode::default(), ExtractMode::Basic);
//! ```
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod observability;

/// Classification of the resource behind a URL.
///
/// The serialized form is the Open Graph style raw value (`file.image`,
/// `video.tv_show`, ...), which is also what [`FromStr`] accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ContentKind {
    #[serde(rename = "article")]
    Article,
    #[serde(rename = "book")]
    Book,
    #[serde(rename = "profile")]
    Profile,
    #[default]
    #[serde(rename = "website")]
    Website,
    #[serde(rename = "file.image")]
    FileImage,
    #[serde(rename = "file.video")]
    FileVideo,
    #[serde(rename = "file.audio")]
    FileAudio,
    #[serde(rename = "file.document")]
    FileDocument,
    #[serde(rename = "file.archive")]
    FileArchive,
    #[serde(rename = "file.other")]
    FileOther,
    #[serde(rename = "music")]
    Music,
    #[serde(rename = "music.song")]
    MusicSong,
    #[serde(rename = "music.playlist")]
    MusicPlaylist,
    #[serde(rename = "music.album")]
    MusicAlbum,
    #[serde(rename = "music.radio_station")]
    MusicRadioStation,
    #[serde(rename = "video.movie")]
    VideoMovie,
    #[serde(rename = "video.episode")]
    VideoEpisode,
    #[serde(rename = "video.tv_show")]
    VideoTvShow,
    #[serde(rename = "video")]
    Video,
}

impl ContentKind {
    pub const ALL: [ContentKind; 19] = [
        ContentKind::Article,
        ContentKind::Book,
        ContentKind::Profile,
        ContentKind::Website,
        ContentKind::FileImage,
        ContentKind::FileVideo,
        ContentKind::FileAudio,
        ContentKind::FileDocument,
        ContentKind::FileArchive,
        ContentKind::FileOther,
        ContentKind::Music,
        ContentKind::MusicSong,
        ContentKind::MusicPlaylist,
        ContentKind::MusicAlbum,
        ContentKind::MusicRadioStation,
        ContentKind::VideoMovie,
        ContentKind::VideoEpisode,
        ContentKind::VideoTvShow,
        ContentKind::Video,
    ];

    /// Raw value as it appears in an `og:type` tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Article => "article",
            ContentKind::Book => "book",
            ContentKind::Profile => "profile",
            ContentKind::Website => "website",
            ContentKind::FileImage => "file.image",
            ContentKind::FileVideo => "file.video",
            ContentKind::FileAudio => "file.audio",
            ContentKind::FileDocument => "file.document",
            ContentKind::FileArchive => "file.archive",
            ContentKind::FileOther => "file.other",
            ContentKind::Music => "music",
            ContentKind::MusicSong => "music.song",
            ContentKind::MusicPlaylist => "music.playlist",
            ContentKind::MusicAlbum => "music.album",
            ContentKind::MusicRadioStation => "music.radio_station",
            ContentKind::VideoMovie => "video.movie",
            ContentKind::VideoEpisode => "video.episode",
            ContentKind::VideoTvShow => "video.tv_show",
            ContentKind::Video => "video",
        }
    }

    /// Whether the URL points at a downloadable file rather than a page.
    pub fn is_file(&self) -> bool {
        self.as_str().starts_with("file")
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContentKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ParseKindError::ContentKind(s.to_string()))
    }
}

/// How a preview obtains its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractMode {
    /// GET the URL, validate the response, decode and parse the body.
    #[default]
    Basic,
    /// Load the URL straight into the parser. The response status is not
    /// validated and the charset is taken from the document itself.
    DirectParse,
}

impl FromStr for ExtractMode {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(ExtractMode::Basic),
            "direct-parse" | "direct_parse" | "direct" => Ok(ExtractMode::DirectParse),
            other => Err(ParseKindError::Mode(other.to_string())),
        }
    }
}

/// Behavior when the server answers outside `[200, 300)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusPolicy {
    /// Build a record from the response metadata alone.
    #[default]
    Degrade,
    /// Surface the status as an error.
    Fail,
}

impl FromStr for StatusPolicy {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "degrade" => Ok(StatusPolicy::Degrade),
            "fail" => Ok(StatusPolicy::Fail),
            other => Err(ParseKindError::StatusPolicy(other.to_string())),
        }
    }
}

/// Unrecognised value for one of the enums in this crate.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseKindError {
    #[error("unknown content kind: {0}")]
    ContentKind(String),

    #[error("unknown extract mode: {0} (expected basic or direct-parse)")]
    Mode(String),

    #[error("unknown status policy: {0} (expected degrade or fail)")]
    StatusPolicy(String),
}
