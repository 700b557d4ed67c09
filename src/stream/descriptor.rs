//! Normalized stream descriptor and its parts.
//!
//! Field names on the wire follow the upstream player API (`file`, `type`,
//! `server`), so clients written against it keep working.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::servers::ServerType;

/// Playable HLS master playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSource {
    #[serde(rename = "file")]
    pub file_url: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl StreamSource {
    pub fn hls(file_url: impl Into<String>) -> Self {
        Self {
            file_url: file_url.into(),
            kind: "hls".to_string(),
        }
    }
}

/// Kind of a side track attached to a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Captions,
    Subtitles,
    Thumbnails,
    #[default]
    #[serde(other)]
    Other,
}

/// Subtitle, caption or thumbnail-sprite track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleTrack {
    #[serde(alias = "file")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub kind: TrackKind,
    #[serde(default, alias = "default")]
    pub is_default: bool,
}

impl SubtitleTrack {
    /// Captions and subtitles count as text tracks; thumbnails do not.
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self.kind, TrackKind::Captions | TrackKind::Subtitles)
    }
}

/// Intro/outro markers in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: u64,
    pub end: u64,
}

/// One decrypted source entry from the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    #[serde(default)]
    pub file: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Result of a stream resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamDescriptor {
    #[serde(rename = "id")]
    pub episode_id: String,
    #[serde(rename = "type")]
    pub server_type: ServerType,
    /// Absent only for embedded-provider passthrough results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<StreamSource>,
    pub tracks: Vec<SubtitleTrack>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intro: Option<TimeRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outro: Option<TimeRange>,
    #[serde(rename = "server")]
    pub server_name: String,
    pub used_fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streaming_link: Option<String>,
}

impl StreamDescriptor {
    /// Descriptor for a decrypted (or mirror-resolved) file, with side data
    /// taken from the player payload that produced it.
    pub fn decrypted(
        episode_id: &str,
        server_type: ServerType,
        server_name: &str,
        file_url: String,
        payload: &Value,
        used_fallback: bool,
    ) -> Self {
        Self {
            episode_id: episode_id.to_string(),
            server_type,
            link: Some(StreamSource::hls(file_url)),
            tracks: tracks_from(payload.get("tracks")),
            intro: time_range(payload.get("intro")),
            outro: time_range(payload.get("outro")),
            server_name: server_name.to_string(),
            used_fallback,
            referer: None,
            streaming_link: None,
        }
    }

    /// Passthrough descriptor for a mirror that plays by URL alone.
    pub fn embedded(
        episode_id: &str,
        server_type: ServerType,
        server_name: &str,
        streaming_link: String,
    ) -> Self {
        Self {
            episode_id: episode_id.to_string(),
            server_type,
            link: None,
            tracks: Vec::new(),
            intro: None,
            outro: None,
            server_name: server_name.to_string(),
            used_fallback: false,
            referer: None,
            streaming_link: Some(streaming_link),
        }
    }

    #[must_use]
    pub fn file_url(&self) -> Option<&str> {
        self.link.as_ref().map(|l| l.file_url.as_str())
    }

    pub fn text_tracks(&self) -> impl Iterator<Item = &SubtitleTrack> {
        self.tracks.iter().filter(|t| t.is_text())
    }

    #[must_use]
    pub fn has_text_tracks(&self) -> bool {
        self.text_tracks().next().is_some()
    }
}

/// Read tracks leniently: entries that do not look like a track are skipped.
fn tracks_from(value: Option<&Value>) -> Vec<SubtitleTrack> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

fn time_range(value: Option<&Value>) -> Option<TimeRange> {
    let value = value?;
    let seconds = |key: &str| {
        let field = value.get(key)?;
        field
            .as_u64()
            .or_else(|| field.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
    };
    Some(TimeRange {
        start: seconds("start")?,
        end: seconds("end")?,
    })
}
