use std::borrow::Cow;
use std::fs::{File, OpenOptions};
use std::io::Seek;
use std::path::Path;

use common::TagSchema;
use lofty::config::WriteOptions;
use lofty::id3::v2::{Frame, FrameId, Id3v2Tag, TextInformationFrame};
use lofty::mpeg::MpegFile;
use lofty::prelude::AudioFile;
use lofty::TextEncoding;

use crate::numbers::{pack_pair, unpack_pair};
use crate::{non_empty, parse_options, MetadataError, ReadOutcome};

const ALBUM: FrameId<'static> = FrameId::Valid(Cow::Borrowed("TALB"));
const ARTIST: FrameId<'static> = FrameId::Valid(Cow::Borrowed("TPE1"));
const RECORDING_TIME: FrameId<'static> = FrameId::Valid(Cow::Borrowed("TDRC"));
const LEGACY_YEAR: FrameId<'static> = FrameId::Valid(Cow::Borrowed("TYER"));
const ALBUM_ARTIST: FrameId<'static> = FrameId::Valid(Cow::Borrowed("TPE2"));
const ARTIST_SORT: FrameId<'static> = FrameId::Valid(Cow::Borrowed("TSOP"));
const ALBUM_SORT: FrameId<'static> = FrameId::Valid(Cow::Borrowed("TSOA"));
const TRACK: FrameId<'static> = FrameId::Valid(Cow::Borrowed("TRCK"));
const DISC: FrameId<'static> = FrameId::Valid(Cow::Borrowed("TPOS"));
const COMMENT: FrameId<'static> = FrameId::Valid(Cow::Borrowed("COMM"));

const ALBUM_ARTIST_SORT_DESC: &str = "ALBUMARTISTSORT";
const DISAMBIGUATION_DESC: &str = "MusicBrainz Album Comment";
const RELEASE_ID_DESC: &str = "MusicBrainz Album Id";

pub(crate) fn read(path: &Path) -> Result<ReadOutcome, MetadataError> {
    let mut file = File::open(path)?;
    let mpeg = MpegFile::read_from(&mut file, parse_options())?;
    match mpeg.id3v2() {
        Some(tag) => Ok(read_tag(tag)),
        None if mpeg.id3v1().is_some() => Ok(ReadOutcome::missing(
            "file only has an ID3v1 tag, which is unsupported",
        )),
        None => Ok(ReadOutcome::missing("file has no ID3 tags")),
    }
}

pub(crate) fn write(path: &Path, tags: &TagSchema) -> Result<(), MetadataError> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let mut mpeg = MpegFile::read_from(&mut file, parse_options())?;
    let mut tag = mpeg.id3v2().cloned().unwrap_or_default();
    apply_tag(&mut tag, tags);
    mpeg.set_id3v2(tag);
    file.rewind()?;
    mpeg.save_to(&mut file, WriteOptions::default())?;
    Ok(())
}

pub(crate) fn read_tag(tag: &Id3v2Tag) -> ReadOutcome {
    let mut diagnostics = Vec::new();
    let mut tags = TagSchema {
        album: text(tag, &ALBUM),
        artist: text(tag, &ARTIST),
        release_date: text(tag, &RECORDING_TIME).or_else(|| text(tag, &LEGACY_YEAR)),
        album_artist: text(tag, &ALBUM_ARTIST),
        artist_sort: text(tag, &ARTIST_SORT),
        album_sort: text(tag, &ALBUM_SORT),
        album_artist_sort: tag.get_user_text(ALBUM_ARTIST_SORT_DESC).and_then(non_empty),
        disambiguation: tag.get_user_text(DISAMBIGUATION_DESC).and_then(non_empty),
        musicbrainz_release_id: tag.get_user_text(RELEASE_ID_DESC).and_then(non_empty),
        ..TagSchema::default()
    };
    if let Some(value) = text(tag, &TRACK) {
        let (track, total) = unpack_pair("track", "total_tracks", &value, &mut diagnostics);
        tags.track = track;
        tags.total_tracks = total;
    }
    if let Some(value) = text(tag, &DISC) {
        let (disc, total) = unpack_pair("disc", "total_discs", &value, &mut diagnostics);
        tags.disc = disc;
        tags.total_discs = total;
    }
    ReadOutcome { tags, diagnostics }
}

pub(crate) fn apply_tag(tag: &mut Id3v2Tag, tags: &TagSchema) {
    if let Some(value) = &tags.album {
        set_text(tag, ALBUM, value.clone());
    }
    if let Some(value) = &tags.artist {
        set_text(tag, ARTIST, value.clone());
    }
    if let Some(value) = &tags.release_date {
        set_text(tag, RECORDING_TIME, value.clone());
    }
    if let Some(value) = &tags.album_artist {
        set_text(tag, ALBUM_ARTIST, value.clone());
    }
    if let Some(value) = &tags.artist_sort {
        set_text(tag, ARTIST_SORT, value.clone());
    }
    if let Some(value) = &tags.album_sort {
        set_text(tag, ALBUM_SORT, value.clone());
    }
    if let Some(value) = &tags.album_artist_sort {
        set_user_text(tag, ALBUM_ARTIST_SORT_DESC, value);
    }
    if let Some(track) = tags.track {
        set_text(tag, TRACK, pack_pair(track, tags.total_tracks));
    }
    if let Some(disc) = tags.disc {
        set_text(tag, DISC, pack_pair(disc, tags.total_discs));
    }
    if let Some(value) = &tags.disambiguation {
        set_user_text(tag, DISAMBIGUATION_DESC, value);
    }
    if let Some(value) = &tags.musicbrainz_release_id {
        set_user_text(tag, RELEASE_ID_DESC, value);
    }
    tag.remove(&COMMENT).for_each(drop);
}

/// First value of a text or timestamp frame.
fn text(tag: &Id3v2Tag, id: &FrameId<'_>) -> Option<String> {
    match tag.get(id)? {
        Frame::Text(frame) => frame.value.split('\0').next().and_then(non_empty),
        Frame::Timestamp(frame) => non_empty(&frame.timestamp.to_string()),
        _ => None,
    }
}

/// Replaces every frame with `id`; TDRC read from disk is a timestamp frame.
fn set_text(tag: &mut Id3v2Tag, id: FrameId<'static>, value: String) {
    tag.remove(&id).for_each(drop);
    tag.insert(Frame::Text(TextInformationFrame::new(
        id,
        TextEncoding::UTF8,
        value,
    )));
}

fn set_user_text(tag: &mut Id3v2Tag, description: &str, value: &str) {
    let _ = tag.remove_user_text(description);
    let _ = tag.insert_user_text(description.to_string(), value.to_string());
}

#[cfg(test)]
mod tests {
    use super::{apply_tag, read_tag, set_text, COMMENT, TRACK};
    use crate::test_support::write_bare_mp3;
    use crate::{CodecAdapter, Diagnostic};
    use common::TagSchema;
    use lofty::id3::v2::{CommentFrame, Frame, Id3v2Tag};
    use lofty::TextEncoding;

    fn full_schema() -> TagSchema {
        TagSchema {
            album: Some("Rainy Season".to_string()),
            artist: Some("Foo".to_string()),
            release_date: Some("2019-04-28".to_string()),
            album_artist: Some("Foo".to_string()),
            artist_sort: Some("Foo".to_string()),
            album_sort: Some("Rainy Season".to_string()),
            album_artist_sort: Some("Foo".to_string()),
            track: Some(1),
            total_tracks: Some(8),
            disc: Some(1),
            total_discs: Some(1),
            disambiguation: Some("M3-43".to_string()),
            musicbrainz_release_id: Some("c2f3e0a4-3c4e-4a57-8d2a-9e6f7a3b1d22".to_string()),
            codec_name: None,
        }
    }

    #[test]
    fn tag_round_trips_every_field() {
        let mut tag = Id3v2Tag::default();
        apply_tag(&mut tag, &full_schema());
        let outcome = read_tag(&tag);
        assert_eq!(outcome.tags, full_schema());
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn numbers_are_packed_as_pairs() {
        let mut tag = Id3v2Tag::default();
        apply_tag(&mut tag, &full_schema());
        assert_eq!(tag.get_text(&TRACK), Some("1/8"));
    }

    #[test]
    fn bare_track_number_leaves_total_unset() {
        let mut tag = Id3v2Tag::default();
        set_text(&mut tag, TRACK, "5".to_string());
        let tags = read_tag(&tag).tags;
        assert_eq!(tags.track, Some(5));
        assert_eq!(tags.total_tracks, None);
    }

    #[test]
    fn malformed_disc_is_reported() {
        let mut tag = Id3v2Tag::default();
        set_text(&mut tag, super::DISC, "x/2".to_string());
        let outcome = read_tag(&tag);
        assert_eq!(outcome.tags.disc, None);
        assert_eq!(outcome.tags.total_discs, Some(2));
        assert_eq!(
            outcome.diagnostics,
            vec![Diagnostic::MalformedField {
                field: "disc",
                value: "x".to_string(),
            }]
        );
    }

    #[test]
    fn comments_are_removed_and_unset_fields_kept() {
        let mut tag = Id3v2Tag::default();
        set_text(&mut tag, super::ARTIST, "Original".to_string());
        tag.insert(Frame::Comment(CommentFrame::new(
            TextEncoding::UTF8,
            *b"eng",
            String::new(),
            "ripped by someone".to_string(),
        )));
        apply_tag(
            &mut tag,
            &TagSchema {
                album: Some("New".to_string()),
                ..TagSchema::default()
            },
        );
        assert!(tag.get(&COMMENT).is_none());
        let tags = read_tag(&tag).tags;
        assert_eq!(tags.artist.as_deref(), Some("Original"));
        assert_eq!(tags.album.as_deref(), Some("New"));
    }

    #[test]
    fn untagged_mp3_reports_missing_tag_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.mp3");
        write_bare_mp3(&path);
        let outcome = CodecAdapter::Id3v2.read(&path).unwrap();
        assert!(outcome.tags.is_empty());
        assert!(matches!(
            outcome.diagnostics.as_slice(),
            [Diagnostic::MissingTagData { .. }]
        ));
    }

    #[test]
    fn mp3_file_round_trip_and_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.mp3");
        write_bare_mp3(&path);

        CodecAdapter::Id3v2.write(&path, &full_schema()).unwrap();
        let outcome = CodecAdapter::Id3v2.read(&path).unwrap();
        assert_eq!(outcome.tags, full_schema());
        assert!(outcome.diagnostics.is_empty());

        let update = TagSchema {
            release_date: Some("2020-01-02".to_string()),
            album_sort: Some("Changed".to_string()),
            track: Some(2),
            total_tracks: Some(9),
            ..TagSchema::default()
        };
        CodecAdapter::Id3v2.write(&path, &update).unwrap();
        let reread = CodecAdapter::Id3v2.read(&path).unwrap().tags;
        assert_eq!(reread.release_date.as_deref(), Some("2020-01-02"));
        assert_eq!(reread.album_sort.as_deref(), Some("Changed"));
        assert_eq!(reread.track, Some(2));
        assert_eq!(reread.total_tracks, Some(9));
        assert_eq!(reread.artist.as_deref(), Some("Foo"));
        assert_eq!(reread.disambiguation.as_deref(), Some("M3-43"));
    }
}
