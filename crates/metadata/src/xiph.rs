use std::fs::{File, OpenOptions};
use std::io::Seek;
use std::path::Path;

use common::TagSchema;
use lofty::config::WriteOptions;
use lofty::flac::FlacFile;
use lofty::ogg::{VorbisComments, VorbisFile};
use lofty::prelude::AudioFile;

use crate::numbers::{parse_positive, unpack_pair};
use crate::{non_empty, parse_options, Diagnostic, MetadataError, ReadOutcome, XiphContainer};

const ALBUM_ARTIST_KEYS: [&str; 3] = ["ALBUMARTIST", "ALBUM_ARTIST", "ALBUM ARTIST"];
const TRACK_KEYS: [&str; 2] = ["TRACKNUMBER", "TRACK"];
const DISC_KEYS: [&str; 2] = ["DISCNUMBER", "DISC"];
const TOTAL_TRACKS_KEYS: [&str; 3] = ["TOTALTRACKS", "TRACKTOTAL", "TRACKC"];
const TOTAL_DISCS_KEYS: [&str; 3] = ["TOTALDISCS", "DISCTOTAL", "DISCC"];
const BLANKED_KEYS: [&str; 2] = ["DESCRIPTION", "COMMENT"];

pub(crate) fn read(path: &Path, container: XiphContainer) -> Result<ReadOutcome, MetadataError> {
    let mut file = File::open(path)?;
    match container {
        XiphContainer::Flac => {
            let flac = FlacFile::read_from(&mut file, parse_options())?;
            match flac.vorbis_comments() {
                Some(comments) => Ok(read_comments(comments)),
                None if flac.id3v2().is_some() => Ok(ReadOutcome::missing(
                    "FLAC file has an ID3 tag but no Vorbis comment block",
                )),
                None => Ok(ReadOutcome::missing("FLAC file has no tags at all")),
            }
        }
        XiphContainer::OggVorbis => {
            let vorbis = VorbisFile::read_from(&mut file, parse_options())?;
            Ok(read_comments(vorbis.vorbis_comments()))
        }
    }
}

pub(crate) fn write(
    path: &Path,
    container: XiphContainer,
    tags: &TagSchema,
) -> Result<(), MetadataError> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    match container {
        XiphContainer::Flac => {
            let mut flac = FlacFile::read_from(&mut file, parse_options())?;
            let mut comments = flac.vorbis_comments().cloned().unwrap_or_default();
            apply_comments(&mut comments, tags);
            flac.set_vorbis_comments(comments);
            file.rewind()?;
            flac.save_to(&mut file, WriteOptions::default())?;
        }
        XiphContainer::OggVorbis => {
            let mut vorbis = VorbisFile::read_from(&mut file, parse_options())?;
            let mut comments = vorbis.vorbis_comments().clone();
            apply_comments(&mut comments, tags);
            vorbis.set_vorbis_comments(comments);
            file.rewind()?;
            vorbis.save_to(&mut file, WriteOptions::default())?;
        }
    }
    Ok(())
}

pub(crate) fn read_comments(comments: &VorbisComments) -> ReadOutcome {
    let mut diagnostics = Vec::new();
    let text = |key: &str| comments.get(key).and_then(non_empty);

    let mut tags = TagSchema {
        album: text("ALBUM"),
        artist: text("ARTIST"),
        release_date: text("DATE").or_else(|| text("YEAR")),
        album_artist: first_of(comments, &ALBUM_ARTIST_KEYS),
        artist_sort: text("ARTISTSORT"),
        album_sort: text("ALBUMSORT"),
        album_artist_sort: text("ALBUMARTISTSORT"),
        disambiguation: text("MUSICBRAINZ_ALBUMCOMMENT"),
        musicbrainz_release_id: text("MUSICBRAINZ_ALBUMID"),
        ..TagSchema::default()
    };

    if let Some(value) = first_of(comments, &TRACK_KEYS) {
        let (track, packed_total) = unpack_pair("track", "total_tracks", &value, &mut diagnostics);
        tags.track = track;
        tags.total_tracks = packed_total;
    }
    if let Some(value) = first_of(comments, &TOTAL_TRACKS_KEYS) {
        if let Some(total) = parse_positive("total_tracks", &value, &mut diagnostics) {
            tags.total_tracks = Some(total);
        }
    }
    if let Some(value) = first_of(comments, &DISC_KEYS) {
        let (disc, packed_total) = unpack_pair("disc", "total_discs", &value, &mut diagnostics);
        tags.disc = disc;
        tags.total_discs = packed_total;
    }
    if let Some(value) = first_of(comments, &TOTAL_DISCS_KEYS) {
        if let Some(total) = parse_positive("total_discs", &value, &mut diagnostics) {
            tags.total_discs = Some(total);
        }
    }

    ReadOutcome { tags, diagnostics }
}

fn first_of(comments: &VorbisComments, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| comments.get(key).and_then(non_empty))
}

pub(crate) fn apply_comments(comments: &mut VorbisComments, tags: &TagSchema) {
    let mut set = |key: &str, value: &str| comments.insert(key.to_string(), value.to_string());

    if let Some(value) = &tags.album {
        set("ALBUM", value);
    }
    if let Some(value) = &tags.artist {
        set("ARTIST", value);
    }
    if let Some(value) = &tags.release_date {
        set("DATE", value);
    }
    if let Some(value) = &tags.album_artist {
        for key in ALBUM_ARTIST_KEYS {
            set(key, value);
        }
    }
    if let Some(value) = &tags.artist_sort {
        set("ARTISTSORT", value);
    }
    if let Some(value) = &tags.album_sort {
        set("ALBUMSORT", value);
    }
    if let Some(value) = &tags.album_artist_sort {
        set("ALBUMARTISTSORT", value);
    }
    if let Some(track) = tags.track {
        for key in TRACK_KEYS {
            set(key, &track.to_string());
        }
    }
    if let Some(total) = tags.total_tracks {
        for key in TOTAL_TRACKS_KEYS {
            set(key, &total.to_string());
        }
    }
    if let Some(disc) = tags.disc {
        for key in DISC_KEYS {
            set(key, &disc.to_string());
        }
    }
    if let Some(total) = tags.total_discs {
        for key in TOTAL_DISCS_KEYS {
            set(key, &total.to_string());
        }
    }
    if let Some(value) = &tags.disambiguation {
        set("MUSICBRAINZ_ALBUMCOMMENT", value);
    }
    if let Some(value) = &tags.musicbrainz_release_id {
        set("MUSICBRAINZ_ALBUMID", value);
    }
    for key in BLANKED_KEYS {
        set(key, "");
    }
}

#[cfg(test)]
mod tests {
    use super::{apply_comments, read_comments};
    use crate::test_support::write_bare_flac;
    use crate::{CodecAdapter, Diagnostic, XiphContainer};
    use common::TagSchema;
    use lofty::ogg::VorbisComments;

    fn full_schema() -> TagSchema {
        TagSchema {
            album: Some("Hypnagogia".to_string()),
            artist: Some("Foo".to_string()),
            release_date: Some("2021-08-14".to_string()),
            album_artist: Some("Foo & Bar".to_string()),
            artist_sort: Some("Foo, The".to_string()),
            album_sort: Some("Hypnagogia".to_string()),
            album_artist_sort: Some("Foo & Bar, The".to_string()),
            track: Some(4),
            total_tracks: Some(11),
            disc: Some(2),
            total_discs: Some(2),
            disambiguation: Some("limited edition".to_string()),
            musicbrainz_release_id: Some("5b1b3c9e-0d3c-4b4e-9d0f-6b4d2a1c0e11".to_string()),
            codec_name: None,
        }
    }

    #[test]
    fn comments_round_trip_every_field() {
        let mut comments = VorbisComments::default();
        apply_comments(&mut comments, &full_schema());
        let outcome = read_comments(&comments);
        assert_eq!(outcome.tags, full_schema());
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn album_artist_is_written_under_all_synonyms() {
        let mut comments = VorbisComments::default();
        apply_comments(&mut comments, &full_schema());
        assert_eq!(comments.get("ALBUMARTIST"), Some("Foo & Bar"));
        assert_eq!(comments.get("ALBUM_ARTIST"), Some("Foo & Bar"));
        assert_eq!(comments.get("ALBUM ARTIST"), Some("Foo & Bar"));
        assert_eq!(comments.get("TRACKC"), Some("11"));
        assert_eq!(comments.get("TRACK"), Some("4"));
        assert_eq!(comments.get("DISC"), Some("2"));
        assert_eq!(comments.get("DISCTOTAL"), Some("2"));
    }

    #[test]
    fn unset_fields_are_left_untouched() {
        let mut comments = VorbisComments::default();
        comments.insert("ARTIST".to_string(), "Original".to_string());
        comments.insert("COMMENT".to_string(), "ripped by someone".to_string());
        apply_comments(
            &mut comments,
            &TagSchema {
                album: Some("New".to_string()),
                ..TagSchema::default()
            },
        );
        assert_eq!(comments.get("ARTIST"), Some("Original"));
        assert_eq!(comments.get("ALBUM"), Some("New"));
        assert_ne!(comments.get("COMMENT"), Some("ripped by someone"));
    }

    #[test]
    fn stale_short_number_keys_are_overwritten() {
        let mut comments = VorbisComments::default();
        comments.insert("TRACK".to_string(), "9".to_string());
        comments.insert("DISC".to_string(), "3".to_string());
        apply_comments(
            &mut comments,
            &TagSchema {
                track: Some(1),
                total_tracks: Some(5),
                disc: Some(1),
                total_discs: Some(1),
                ..TagSchema::default()
            },
        );
        assert_eq!(comments.get("TRACK"), Some("1"));
        assert_eq!(comments.get("DISC"), Some("1"));
        assert_eq!(comments.get("TRACKNUMBER"), Some("1"));
    }

    #[test]
    fn packed_track_number_and_fallback_keys() {
        let mut comments = VorbisComments::default();
        comments.insert("TRACKNUMBER".to_string(), "3/12".to_string());
        comments.insert("DISC".to_string(), "1".to_string());
        comments.insert("DISCC".to_string(), "2".to_string());
        comments.insert("YEAR".to_string(), "1999".to_string());
        let tags = read_comments(&comments).tags;
        assert_eq!(tags.track, Some(3));
        assert_eq!(tags.total_tracks, Some(12));
        assert_eq!(tags.disc, Some(1));
        assert_eq!(tags.total_discs, Some(2));
        assert_eq!(tags.release_date.as_deref(), Some("1999"));
    }

    #[test]
    fn malformed_track_is_reported() {
        let mut comments = VorbisComments::default();
        comments.insert("TRACKNUMBER".to_string(), "side A".to_string());
        let outcome = read_comments(&comments);
        assert_eq!(outcome.tags.track, None);
        assert_eq!(
            outcome.diagnostics,
            vec![Diagnostic::MalformedField {
                field: "track",
                value: "side A".to_string(),
            }]
        );
    }

    #[test]
    fn flac_without_comment_block_reports_missing_tag_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.flac");
        write_bare_flac(&path);
        let outcome = CodecAdapter::Xiph(XiphContainer::Flac).read(&path).unwrap();
        assert!(outcome.tags.is_empty());
        assert!(matches!(
            outcome.diagnostics.as_slice(),
            [Diagnostic::MissingTagData { .. }]
        ));
    }

    #[test]
    fn flac_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.flac");
        write_bare_flac(&path);
        let adapter = CodecAdapter::Xiph(XiphContainer::Flac);

        adapter.write(&path, &full_schema()).unwrap();
        let outcome = adapter.read(&path).unwrap();
        assert_eq!(outcome.tags, full_schema());

        let update = TagSchema {
            album_sort: Some("Hypnagogia (Deluxe)".to_string()),
            ..TagSchema::default()
        };
        adapter.write(&path, &update).unwrap();
        let reread = adapter.read(&path).unwrap().tags;
        assert_eq!(reread.album_sort.as_deref(), Some("Hypnagogia (Deluxe)"));
        assert_eq!(reread.artist.as_deref(), Some("Foo"));
        assert_eq!(reread.track, Some(4));
    }
}
