use std::path::PathBuf;

use common::{deslash, CodecName};
use metadata::AudioFormat;

use crate::events::ReleaseDate;

/// Bitrates an MPEG-1/2 layer III encoder offers in CBR mode.
const MP3_CBR_KBPS: &[u32] = &[
    8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 192, 224, 256, 320,
];

pub fn format_label(format: &AudioFormat) -> String {
    match format.codec {
        CodecName::Flac => match (format.bit_depth, format.sample_rate) {
            (Some(16), _) | (None, _) | (_, None) => "FLAC".to_string(),
            (Some(bits), Some(rate)) => format!("FLAC {}-{}", bits, khz(rate)),
        },
        CodecName::Mp3 => match format.bitrate_kbps {
            Some(kbps) if MP3_CBR_KBPS.contains(&kbps) => format!("MP3 {}", kbps),
            _ => "MP3".to_string(),
        },
        CodecName::Vorbis => match format.bitrate_kbps {
            Some(kbps) => format!("Vorbis {}", kbps),
            None => "Vorbis".to_string(),
        },
        CodecName::Opus => "Opus".to_string(),
        CodecName::Aac => "AAC".to_string(),
    }
}

/// `44100` -> `44.1`, `96000` -> `96`.
fn khz(rate: u32) -> String {
    if rate % 1000 == 0 {
        (rate / 1000).to_string()
    } else {
        let text = format!("{:.3}", f64::from(rate) / 1000.0);
        text.trim_end_matches('0').to_string()
    }
}

/// `[date] [event] AlbumArtist - Album [format]`.
///
/// The album artist part is left out for the various-artists name.
pub fn folder_name(
    date: Option<&ReleaseDate>,
    event: Option<&str>,
    album_artist: Option<&str>,
    album: &str,
    format: &str,
    various_artists: &str,
) -> String {
    let date = date.map(ToString::to_string).unwrap_or_default();
    let mut out = format!("[{}]", date);
    if let Some(event) = event {
        out.push_str(&format!(" [{}]", event));
    }
    out.push(' ');
    match album_artist {
        Some(artist) if artist != various_artists => {
            out.push_str(artist);
            out.push_str(" - ");
        }
        _ => {}
    }
    out.push_str(album);
    out.push_str(&format!(" [{}]", format));
    out
}

/// Where a release lands in the library.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetPath {
    pub library_path: PathBuf,
    pub shelf_folder: Option<String>,
    pub album_artist_folder: Option<String>,
    pub folder_name: Option<String>,
    /// Set when the source is a single file.
    pub basename: Option<String>,
}

impl TargetPath {
    pub fn new(library_path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: library_path.into(),
            ..Self::default()
        }
    }

    pub fn with_album_artist(mut self, album_artist: &str) -> Self {
        self.album_artist_folder = Some(deslash(album_artist));
        self
    }

    pub fn with_folder_name(mut self, name: &str) -> Self {
        self.folder_name = Some(deslash(name));
        self
    }

    pub fn components(&self) -> Vec<&str> {
        [
            self.shelf_folder.as_deref(),
            self.album_artist_folder.as_deref(),
            self.folder_name.as_deref(),
            self.basename.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect()
    }

    pub fn to_path(&self) -> PathBuf {
        let mut out = self.library_path.clone();
        for part in self.components() {
            out.push(part);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::{folder_name, format_label, TargetPath};
    use crate::events::ReleaseDate;
    use common::CodecName;
    use metadata::AudioFormat;
    use std::path::PathBuf;
    use time::{Date, Month};

    fn format(codec: CodecName, rate: Option<u32>, bits: Option<u8>, kbps: Option<u32>) -> AudioFormat {
        AudioFormat {
            codec,
            sample_rate: rate,
            bit_depth: bits,
            bitrate_kbps: kbps,
        }
    }

    #[test]
    fn labels_per_codec() {
        assert_eq!(format_label(&format(CodecName::Flac, Some(44100), Some(16), None)), "FLAC");
        assert_eq!(
            format_label(&format(CodecName::Flac, Some(96000), Some(24), None)),
            "FLAC 24-96"
        );
        assert_eq!(
            format_label(&format(CodecName::Flac, Some(44100), Some(24), None)),
            "FLAC 24-44.1"
        );
        assert_eq!(
            format_label(&format(CodecName::Flac, Some(88200), Some(24), None)),
            "FLAC 24-88.2"
        );
        assert_eq!(format_label(&format(CodecName::Mp3, None, None, Some(320))), "MP3 320");
        assert_eq!(format_label(&format(CodecName::Mp3, None, None, Some(245))), "MP3");
        assert_eq!(
            format_label(&format(CodecName::Vorbis, None, None, Some(192))),
            "Vorbis 192"
        );
        assert_eq!(format_label(&format(CodecName::Opus, None, None, Some(128))), "Opus");
        assert_eq!(format_label(&format(CodecName::Aac, None, None, Some(256))), "AAC");
    }

    #[test]
    fn folder_names() {
        let date = ReleaseDate::Day(Date::from_calendar_date(2024, Month::April, 28).unwrap());
        assert_eq!(
            folder_name(Some(&date), Some("M3-53"), Some("Foo"), "Bar", "FLAC", "Various Artists"),
            "[2024-04-28] [M3-53] Foo - Bar [FLAC]"
        );
        assert_eq!(
            folder_name(
                Some(&ReleaseDate::Year(2019)),
                None,
                Some("Various Artists"),
                "Compilation",
                "MP3 320",
                "Various Artists"
            ),
            "[2019] Compilation [MP3 320]"
        );
        assert_eq!(folder_name(None, None, None, "Bar", "AAC", "VA"), "[] Bar [AAC]");
    }

    #[test]
    fn target_path_skips_unset_components() {
        let target = TargetPath {
            shelf_folder: Some("Doujin".to_string()),
            ..TargetPath::new("/music")
        }
        .with_album_artist("AC/DC")
        .with_folder_name("[2020] Live [FLAC]");
        assert_eq!(
            target.to_path(),
            PathBuf::from("/music/Doujin/AC\u{FF0F}DC/[2020] Live [FLAC]")
        );

        let single = TargetPath {
            basename: Some("01.flac".to_string()),
            ..TargetPath::new("/music")
        };
        assert_eq!(single.to_path(), PathBuf::from("/music/01.flac"));
    }
}
