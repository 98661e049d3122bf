use std::fs::{File, OpenOptions};
use std::io::Seek;
use std::path::Path;

use common::TagSchema;
use lofty::config::WriteOptions;
use lofty::mp4::{Atom, AtomData, AtomIdent, Ilst, Mp4File};
use lofty::prelude::{Accessor, AudioFile};

use crate::{non_empty, parse_options, MetadataError, ReadOutcome};

const ALBUM: AtomIdent<'static> = AtomIdent::Fourcc(*b"\xa9alb");
const ARTIST: AtomIdent<'static> = AtomIdent::Fourcc(*b"\xa9ART");
const RELEASE_DATE: AtomIdent<'static> = AtomIdent::Fourcc(*b"\xa9day");
const ALBUM_ARTIST: AtomIdent<'static> = AtomIdent::Fourcc(*b"aART");
const ARTIST_SORT: AtomIdent<'static> = AtomIdent::Fourcc(*b"soar");
const ALBUM_SORT: AtomIdent<'static> = AtomIdent::Fourcc(*b"soal");
const ALBUM_ARTIST_SORT: AtomIdent<'static> = AtomIdent::Fourcc(*b"soaa");
const COMMENT: AtomIdent<'static> = AtomIdent::Fourcc(*b"\xa9cmt");

pub(crate) fn read(path: &Path) -> Result<ReadOutcome, MetadataError> {
    let mut file = File::open(path)?;
    let mp4 = Mp4File::read_from(&mut file, parse_options())?;
    match mp4.ilst() {
        Some(ilst) => Ok(read_ilst(ilst)),
        None => Ok(ReadOutcome::missing("MP4 file has no ilst atom")),
    }
}

pub(crate) fn write(path: &Path, tags: &TagSchema) -> Result<(), MetadataError> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let mut mp4 = Mp4File::read_from(&mut file, parse_options())?;
    let mut ilst = mp4.ilst().cloned().unwrap_or_default();
    apply_ilst(&mut ilst, tags);
    mp4.set_ilst(ilst);
    file.rewind()?;
    mp4.save_to(&mut file, WriteOptions::default())?;
    Ok(())
}

/// `trkn`/`disk` hold native integer pairs, so no malformed text can occur.
pub(crate) fn read_ilst(ilst: &Ilst) -> ReadOutcome {
    let tags = TagSchema {
        album: text(ilst, &ALBUM),
        artist: text(ilst, &ARTIST),
        release_date: text(ilst, &RELEASE_DATE),
        album_artist: text(ilst, &ALBUM_ARTIST),
        artist_sort: text(ilst, &ARTIST_SORT),
        album_sort: text(ilst, &ALBUM_SORT),
        album_artist_sort: text(ilst, &ALBUM_ARTIST_SORT),
        track: ilst.track().filter(|n| *n > 0),
        total_tracks: ilst.track_total().filter(|n| *n > 0),
        disc: ilst.disk().filter(|n| *n > 0),
        total_discs: ilst.disk_total().filter(|n| *n > 0),
        ..TagSchema::default()
    };
    ReadOutcome {
        tags,
        diagnostics: Vec::new(),
    }
}

/// MP4 has no atoms for the disambiguation comment or release id.
pub(crate) fn apply_ilst(ilst: &mut Ilst, tags: &TagSchema) {
    if let Some(value) = &tags.album {
        set_text(ilst, ALBUM, value);
    }
    if let Some(value) = &tags.artist {
        set_text(ilst, ARTIST, value);
    }
    if let Some(value) = &tags.release_date {
        set_text(ilst, RELEASE_DATE, value);
    }
    if let Some(value) = &tags.album_artist {
        set_text(ilst, ALBUM_ARTIST, value);
    }
    if let Some(value) = &tags.artist_sort {
        set_text(ilst, ARTIST_SORT, value);
    }
    if let Some(value) = &tags.album_sort {
        set_text(ilst, ALBUM_SORT, value);
    }
    if let Some(value) = &tags.album_artist_sort {
        set_text(ilst, ALBUM_ARTIST_SORT, value);
    }
    if let Some(track) = tags.track {
        ilst.set_track(track);
    }
    if let Some(total) = tags.total_tracks {
        ilst.set_track_total(total);
    }
    if let Some(disc) = tags.disc {
        ilst.set_disk(disc);
    }
    if let Some(total) = tags.total_discs {
        ilst.set_disk_total(total);
    }
    ilst.remove(&COMMENT).for_each(drop);
}

fn text(ilst: &Ilst, ident: &AtomIdent<'_>) -> Option<String> {
    ilst.get(ident)?.data().find_map(|data| match data {
        AtomData::UTF8(value) => non_empty(value),
        _ => None,
    })
}

fn set_text(ilst: &mut Ilst, ident: AtomIdent<'static>, value: &str) {
    ilst.remove(&ident).for_each(drop);
    ilst.insert(Atom::new(ident, AtomData::UTF8(value.to_string())));
}
