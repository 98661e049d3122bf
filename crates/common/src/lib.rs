use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Canonical, container-independent view of one file's tags.
///
/// Every field is optional: an unset field means "not present in the source
/// container" on read and "leave untouched" on write.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSchema {
    pub album: Option<String>,
    pub artist: Option<String>,
    pub release_date: Option<String>,
    pub album_artist: Option<String>,
    pub artist_sort: Option<String>,
    pub album_sort: Option<String>,
    pub album_artist_sort: Option<String>,
    pub track: Option<u32>,
    pub total_tracks: Option<u32>,
    pub disc: Option<u32>,
    pub total_discs: Option<u32>,
    pub disambiguation: Option<String>,
    pub musicbrainz_release_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec_name: Option<CodecName>,
}

impl TagSchema {
    /// Enforces `track => total_tracks` and `disc => total_discs`.
    pub fn check_totals(&self) -> Result<(), InvariantViolation> {
        if self.track.is_some() && self.total_tracks.is_none() {
            return Err(InvariantViolation {
                field: "total_tracks",
            });
        }
        if self.disc.is_some() && self.total_discs.is_none() {
            return Err(InvariantViolation {
                field: "total_discs",
            });
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.pending_changes().is_empty()
    }

    /// Set fields as `(canonical name, value)` pairs, in mapping-table order.
    pub fn pending_changes(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        push_text(&mut out, "album", &self.album);
        push_text(&mut out, "artist", &self.artist);
        push_text(&mut out, "release_date", &self.release_date);
        push_text(&mut out, "album_artist", &self.album_artist);
        push_text(&mut out, "artist_sort", &self.artist_sort);
        push_text(&mut out, "album_sort", &self.album_sort);
        push_text(&mut out, "album_artist_sort", &self.album_artist_sort);
        push_number(&mut out, "track", self.track);
        push_number(&mut out, "total_tracks", self.total_tracks);
        push_number(&mut out, "disc", self.disc);
        push_number(&mut out, "total_discs", self.total_discs);
        push_text(&mut out, "disambiguation", &self.disambiguation);
        push_text(&mut out, "musicbrainz_release_id", &self.musicbrainz_release_id);
        out
    }
}

fn push_text(out: &mut Vec<(&'static str, String)>, name: &'static str, value: &Option<String>) {
    if let Some(value) = value {
        out.push((name, value.clone()));
    }
}

fn push_number(out: &mut Vec<(&'static str, String)>, name: &'static str, value: Option<u32>) {
    if let Some(value) = value {
        out.push((name, value.to_string()));
    }
}

/// A number field was set without its matching total.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InvariantViolation {
    pub field: &'static str,
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} must be set before writing", self.field)
    }
}

impl std::error::Error for InvariantViolation {}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecName {
    Flac,
    Mp3,
    Aac,
    Vorbis,
    Opus,
}

impl CodecName {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodecName::Flac => "flac",
            CodecName::Mp3 => "mp3",
            CodecName::Aac => "aac",
            CodecName::Vorbis => "vorbis",
            CodecName::Opus => "opus",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "flac" => Some(CodecName::Flac),
            "mp3" => Some(CodecName::Mp3),
            "aac" => Some(CodecName::Aac),
            "vorbis" => Some(CodecName::Vorbis),
            "opus" => Some(CodecName::Opus),
            _ => None,
        }
    }
}

impl fmt::Display for CodecName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn relpath_from(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(path_to_slash_string(rel))
}

pub fn join_relpath(root: &Path, relpath: &str) -> PathBuf {
    let mut out = PathBuf::from(root);
    for part in relpath.split('/') {
        if part.is_empty() {
            continue;
        }
        out.push(part);
    }
    out
}

/// Parent directory of a slash-separated relative path, `""` for top level.
pub fn relpath_parent(relpath: &str) -> &str {
    match relpath.rfind('/') {
        Some(idx) => &relpath[..idx],
        None => "",
    }
}

/// Makes a name safe to use as a single path component.
pub fn deslash(name: &str) -> String {
    name.replace('/', "\u{FF0F}")
}

fn path_to_slash_string(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::{deslash, join_relpath, relpath_from, relpath_parent, CodecName, TagSchema};
    use std::path::Path;

    #[test]
    fn totals_invariant_names_missing_field() {
        let tags = TagSchema {
            track: Some(3),
            ..TagSchema::default()
        };
        assert_eq!(tags.check_totals().unwrap_err().field, "total_tracks");

        let tags = TagSchema {
            track: Some(3),
            total_tracks: Some(9),
            disc: Some(1),
            ..TagSchema::default()
        };
        assert_eq!(tags.check_totals().unwrap_err().field, "total_discs");
    }

    #[test]
    fn totals_invariant_allows_bare_totals() {
        let tags = TagSchema {
            total_tracks: Some(9),
            ..TagSchema::default()
        };
        assert!(tags.check_totals().is_ok());
    }

    #[test]
    fn pending_changes_lists_only_set_fields() {
        let tags = TagSchema {
            album: Some("Album".to_string()),
            track: Some(2),
            total_tracks: Some(10),
            codec_name: Some(CodecName::Opus),
            ..TagSchema::default()
        };
        assert_eq!(
            tags.pending_changes(),
            vec![
                ("album", "Album".to_string()),
                ("track", "2".to_string()),
                ("total_tracks", "10".to_string()),
            ]
        );
        assert!(TagSchema::default().is_empty());
    }

    #[test]
    fn codec_names_parse_case_insensitively() {
        assert_eq!(CodecName::from_name("FLAC"), Some(CodecName::Flac));
        assert_eq!(CodecName::from_name(" vorbis "), Some(CodecName::Vorbis));
        assert_eq!(CodecName::from_name("wav"), None);
    }

    #[test]
    fn relpaths_round_trip() {
        let root = Path::new("/music/source");
        let path = join_relpath(root, "CD1/01 Intro.flac");
        assert_eq!(relpath_from(root, &path).as_deref(), Some("CD1/01 Intro.flac"));
        assert_eq!(relpath_parent("CD1/01 Intro.flac"), "CD1");
        assert_eq!(relpath_parent("01 Intro.flac"), "");
    }

    #[test]
    fn deslash_replaces_separators() {
        assert_eq!(deslash("AC/DC"), "AC\u{FF0F}DC");
    }
}
