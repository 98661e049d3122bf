mod id3v2;
mod mp4;
mod numbers;
mod xiph;

use std::fmt;
use std::path::{Path, PathBuf};

use common::{CodecName, InvariantViolation, TagSchema};
use lofty::config::ParseOptions;
use lofty::error::LoftyError;
use lofty::file::FileType;
use lofty::prelude::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;

/// Which Ogg-family or FLAC container carries a Vorbis comment block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XiphContainer {
    Flac,
    OggVorbis,
}

/// Tag codec for one container family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodecAdapter {
    Xiph(XiphContainer),
    Id3v2,
    Mp4,
    Unsupported(CodecName),
}

impl CodecAdapter {
    pub fn for_codec(codec: CodecName) -> Self {
        match codec {
            CodecName::Flac => CodecAdapter::Xiph(XiphContainer::Flac),
            CodecName::Vorbis => CodecAdapter::Xiph(XiphContainer::OggVorbis),
            CodecName::Mp3 => CodecAdapter::Id3v2,
            CodecName::Aac => CodecAdapter::Mp4,
            CodecName::Opus => CodecAdapter::Unsupported(codec),
        }
    }

    pub fn read(&self, path: &Path) -> Result<ReadOutcome, MetadataError> {
        match self {
            CodecAdapter::Xiph(container) => xiph::read(path, *container),
            CodecAdapter::Id3v2 => id3v2::read(path),
            CodecAdapter::Mp4 => mp4::read(path),
            CodecAdapter::Unsupported(codec) => Ok(ReadOutcome::with_diagnostic(
                Diagnostic::UnsupportedFormat { codec: *codec },
            )),
        }
    }

    /// Writes every set field of `tags`; unset fields stay as they are.
    ///
    /// The totals invariant is checked before the file is touched.
    pub fn write(&self, path: &Path, tags: &TagSchema) -> Result<(), MetadataError> {
        tags.check_totals()?;
        if let CodecAdapter::Unsupported(codec) = self {
            return Err(MetadataError::UnsupportedFormat {
                codec: *codec,
                pending: tags.pending_changes(),
            });
        }
        if !path.exists() {
            return Err(MetadataError::TargetMissing(path.to_path_buf()));
        }
        match self {
            CodecAdapter::Xiph(container) => xiph::write(path, *container, tags),
            CodecAdapter::Id3v2 => id3v2::write(path, tags),
            CodecAdapter::Mp4 => mp4::write(path, tags),
            CodecAdapter::Unsupported(_) => Ok(()),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ReadOutcome {
    pub tags: TagSchema,
    pub diagnostics: Vec<Diagnostic>,
}

impl ReadOutcome {
    fn with_diagnostic(diagnostic: Diagnostic) -> Self {
        Self {
            tags: TagSchema::default(),
            diagnostics: vec![diagnostic],
        }
    }

    fn missing(reason: &'static str) -> Self {
        Self::with_diagnostic(Diagnostic::MissingTagData { reason })
    }
}

/// Non-fatal findings of a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    MissingTagData { reason: &'static str },
    MalformedField { field: &'static str, value: String },
    UnsupportedFormat { codec: CodecName },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MissingTagData { reason } => write!(f, "missing tag data: {}", reason),
            Diagnostic::MalformedField { field, value } => {
                write!(f, "malformed {}: {:?}", field, value)
            }
            Diagnostic::UnsupportedFormat { codec } => {
                write!(f, "reading tags from {} files is not supported", codec)
            }
        }
    }
}

#[derive(Debug)]
pub enum MetadataError {
    Io(std::io::Error),
    Lofty(LoftyError),
    TargetMissing(PathBuf),
    UnsupportedFormat {
        codec: CodecName,
        pending: Vec<(&'static str, String)>,
    },
    InvariantViolation(InvariantViolation),
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataError::Io(err) => write!(f, "io error: {}", err),
            MetadataError::Lofty(err) => write!(f, "tag error: {}", err),
            MetadataError::TargetMissing(path) => {
                write!(f, "target file no longer exists: {}", path.display())
            }
            MetadataError::UnsupportedFormat { codec, pending } => {
                write!(f, "writing tags to {} files is not supported;", codec)?;
                write!(f, " apply manually:")?;
                for (field, value) in pending {
                    write!(f, " {}={:?}", field, value)?;
                }
                Ok(())
            }
            MetadataError::InvariantViolation(err) => write!(f, "invariant violation: {}", err),
        }
    }
}

impl std::error::Error for MetadataError {}

impl From<std::io::Error> for MetadataError {
    fn from(err: std::io::Error) -> Self {
        MetadataError::Io(err)
    }
}

impl From<LoftyError> for MetadataError {
    fn from(err: LoftyError) -> Self {
        MetadataError::Lofty(err)
    }
}

impl From<InvariantViolation> for MetadataError {
    fn from(err: InvariantViolation) -> Self {
        MetadataError::InvariantViolation(err)
    }
}

/// Stream properties used to label a release folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFormat {
    pub codec: CodecName,
    pub sample_rate: Option<u32>,
    pub bit_depth: Option<u8>,
    pub bitrate_kbps: Option<u32>,
}

/// Guesses the codec from the container signature.
pub fn probe_codec(path: &Path) -> Result<Option<CodecName>, MetadataError> {
    let probe = Probe::open(path)?.guess_file_type()?;
    Ok(probe.file_type().and_then(codec_for_file_type))
}

pub fn read_audio_format(path: &Path) -> Result<Option<AudioFormat>, MetadataError> {
    let tagged_file = lofty::read_from_path(path)?;
    let codec = match codec_for_file_type(tagged_file.file_type()) {
        Some(codec) => codec,
        None => return Ok(None),
    };
    let properties = tagged_file.properties();
    Ok(Some(AudioFormat {
        codec,
        sample_rate: properties.sample_rate(),
        bit_depth: properties.bit_depth(),
        bitrate_kbps: properties.audio_bitrate().or(properties.overall_bitrate()),
    }))
}

fn codec_for_file_type(file_type: FileType) -> Option<CodecName> {
    match file_type {
        FileType::Flac => Some(CodecName::Flac),
        FileType::Mpeg => Some(CodecName::Mp3),
        FileType::Mp4 => Some(CodecName::Aac),
        FileType::Vorbis => Some(CodecName::Vorbis),
        FileType::Opus => Some(CodecName::Opus),
        _ => None,
    }
}

/// Tag reads never need stream properties.
fn parse_options() -> ParseOptions {
    ParseOptions::new().read_properties(false)
}

/// Empty strings count as absent.
fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::write_bare_flac;
    use super::{CodecAdapter, Diagnostic, MetadataError, XiphContainer};
    use common::{CodecName, TagSchema};

    #[test]
    fn adapter_follows_codec() {
        assert_eq!(
            CodecAdapter::for_codec(CodecName::Flac),
            CodecAdapter::Xiph(XiphContainer::Flac)
        );
        assert_eq!(
            CodecAdapter::for_codec(CodecName::Vorbis),
            CodecAdapter::Xiph(XiphContainer::OggVorbis)
        );
        assert_eq!(CodecAdapter::for_codec(CodecName::Mp3), CodecAdapter::Id3v2);
        assert_eq!(CodecAdapter::for_codec(CodecName::Aac), CodecAdapter::Mp4);
        assert_eq!(
            CodecAdapter::for_codec(CodecName::Opus),
            CodecAdapter::Unsupported(CodecName::Opus)
        );
    }

    #[test]
    fn invariant_violation_precedes_any_file_access() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.flac");
        write_bare_flac(&path);
        let before = std::fs::read(&path).unwrap();

        let tags = TagSchema {
            album: Some("Album".to_string()),
            track: Some(1),
            ..TagSchema::default()
        };
        let err = CodecAdapter::for_codec(CodecName::Flac)
            .write(&path, &tags)
            .unwrap_err();
        assert!(matches!(
            err,
            MetadataError::InvariantViolation(violation) if violation.field == "total_tracks"
        ));
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn write_to_vanished_file_is_target_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.mp3");
        let err = CodecAdapter::Id3v2
            .write(&path, &TagSchema::default())
            .unwrap_err();
        assert!(matches!(err, MetadataError::TargetMissing(p) if p == path));
    }

    #[test]
    fn opus_surfaces_pending_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.opus");
        let adapter = CodecAdapter::for_codec(CodecName::Opus);

        let outcome = adapter.read(&path).unwrap();
        assert!(outcome.tags.is_empty());
        assert_eq!(
            outcome.diagnostics,
            vec![Diagnostic::UnsupportedFormat {
                codec: CodecName::Opus
            }]
        );

        let tags = TagSchema {
            artist_sort: Some("Beatles, The".to_string()),
            ..TagSchema::default()
        };
        match adapter.write(&path, &tags).unwrap_err() {
            MetadataError::UnsupportedFormat { codec, pending } => {
                assert_eq!(codec, CodecName::Opus);
                assert_eq!(pending, vec![("artist_sort", "Beatles, The".to_string())]);
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
