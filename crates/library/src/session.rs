//! One source at a time: read every file, reconcile names and numbering,
//! then write the merged tags back.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use common::{join_relpath, relpath_from, CodecName, TagSchema};
use metadata::{probe_codec, CodecAdapter, MetadataError};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::continuity::{has_duplicate_tracks, resolve_continuity, Continuity, Position, Renumbering};
use crate::events::ReleaseDate;
use crate::sort_order::{BatchReconciliation, SortOrderPrompt, SortOrderRegistry};
use crate::LibraryError;

const AUDIO_EXTS: &[&str] = &["flac", "mp3", "m4a", "ogg", "opus"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackEntry {
    pub relpath: String,
    pub codec: Option<CodecName>,
    pub tags: TagSchema,
}

#[derive(Clone, Debug)]
pub struct SourceBatch {
    pub source: PathBuf,
    pub is_dir: bool,
    /// Directory the track relpaths are relative to.
    pub source_dir: PathBuf,
    pub tracks: Vec<TrackEntry>,
}

impl SourceBatch {
    /// Tags of the first file; used as prompt defaults.
    pub fn first_tags(&self) -> Option<&TagSchema> {
        self.tracks.first().map(|track| &track.tags)
    }

    pub fn first_path(&self) -> Option<PathBuf> {
        self.tracks
            .first()
            .map(|track| join_relpath(&self.source_dir, &track.relpath))
    }

    pub fn relpaths(&self) -> Vec<String> {
        self.tracks.iter().map(|track| track.relpath.clone()).collect()
    }

    /// Distinct album values in file order.
    pub fn distinct_albums(&self) -> Vec<Option<String>> {
        let mut out: Vec<Option<String>> = Vec::new();
        for track in &self.tracks {
            if !out.contains(&track.tags.album) {
                out.push(track.tags.album.clone());
            }
        }
        out
    }

    /// True when the tags disagree with each other or with `album`.
    pub fn needs_album_unification(&self, album: &str) -> bool {
        match self.distinct_albums().as_slice() {
            [] => false,
            [only] => only.as_deref() != Some(album),
            _ => true,
        }
    }

    pub fn positions(&self) -> Vec<Position> {
        self.tracks
            .iter()
            .map(|track| Position::new(track.tags.disc, track.tags.track))
            .collect()
    }

    pub fn has_track_numbers(&self) -> bool {
        self.tracks.iter().any(|track| track.tags.track.is_some())
    }

    pub fn has_duplicate_tracks(&self) -> bool {
        has_duplicate_tracks(&self.positions())
    }

    pub fn resolve_continuity(&self) -> Continuity {
        resolve_continuity(&self.positions())
    }

    /// Takes track numbers from `<digits>-<digits>-<rest>.flac` basenames.
    /// Returns how many files matched.
    pub fn remap_booth_tracks(&mut self) -> usize {
        let mut matched = 0;
        for track in &mut self.tracks {
            let basename = track.relpath.rsplit('/').next().unwrap_or(&track.relpath);
            if let Some(number) = booth_track_number(basename) {
                info!("Found track number {} from filename {}", number, track.relpath);
                track.tags.track = Some(number);
                matched += 1;
            }
        }
        matched
    }

    pub fn apply_renumbering(&mut self, renumbering: &Renumbering) {
        for (track, assignment) in self.tracks.iter_mut().zip(&renumbering.assignments) {
            track.tags.track = Some(assignment.track);
            track.tags.total_tracks = Some(assignment.total_tracks);
            track.tags.total_discs = Some(assignment.total_discs);
        }
        for span in &renumbering.spans {
            info!("Disc {}: tracks {}-{}", span.disc, span.first, span.last);
        }
    }

    fn max_track(&self) -> Option<u32> {
        self.tracks.iter().filter_map(|track| track.tags.track).max()
    }

    fn max_disc(&self) -> Option<u32> {
        self.tracks.iter().filter_map(|track| track.tags.disc).max()
    }
}

fn booth_track_number(basename: &str) -> Option<u32> {
    let parts: Vec<&str> = basename.split('-').collect();
    for idx in 0..parts.len().saturating_sub(2) {
        let lead_digit = parts[idx]
            .chars()
            .last()
            .map(|c| c.is_ascii_digit())
            .unwrap_or(false);
        let number = parts[idx + 1];
        let rest = parts[idx + 2..].join("-");
        if lead_digit
            && !number.is_empty()
            && number.bytes().all(|b| b.is_ascii_digit())
            && rest.contains(".flac")
        {
            if let Ok(value) = number.parse() {
                return Some(value);
            }
        }
    }
    None
}

/// Release-wide answers that apply to every file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReleasePlan {
    pub album_artist: Option<String>,
    pub album_sort: Option<String>,
    pub unify_album: Option<String>,
    pub release_date: Option<ReleaseDate>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedWrite {
    pub relpath: String,
    pub codec: Option<CodecName>,
    pub tags: TagSchema,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManualAction {
    pub relpath: String,
    pub codec: CodecName,
    pub pending: Vec<(&'static str, String)>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteFailure {
    pub relpath: String,
    pub reason: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub written: usize,
    pub missing: Vec<String>,
    pub manual: Vec<ManualAction>,
    pub failed: Vec<WriteFailure>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.manual.is_empty() && self.failed.is_empty()
    }
}

/// Lists audio files under `source` (or `source` itself) as relpaths.
pub fn enumerate_audio(source: &Path) -> Result<(bool, PathBuf, Vec<String>), LibraryError> {
    if !source.exists() {
        return Err(LibraryError::SourceMissing(source.to_path_buf()));
    }
    if source.is_dir() {
        let mut files = Vec::new();
        for entry in WalkDir::new(source).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Skipping unreadable entry under {:?}: {}", source, err);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_audio_file(entry.path()) {
                continue;
            }
            if let Some(relpath) = relpath_from(source, entry.path()) {
                files.push(relpath);
            }
        }
        files.sort();
        return Ok((true, source.to_path_buf(), files));
    }

    let basename = source
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| LibraryError::SourceMissing(source.to_path_buf()))?;
    let dir = source
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok((false, dir, vec![basename]))
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| AUDIO_EXTS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn read_track(source_dir: &Path, relpath: &str) -> TrackEntry {
    let path = join_relpath(source_dir, relpath);
    let codec = match probe_codec(&path) {
        Ok(Some(codec)) => Some(codec),
        Ok(None) => {
            warn!("Unknown container for {:?}", path);
            None
        }
        Err(err) => {
            warn!("Could not probe {:?}: {}", path, err);
            None
        }
    };

    let mut tags = match codec.map(CodecAdapter::for_codec) {
        Some(adapter) => match adapter.read(&path) {
            Ok(outcome) => {
                for diagnostic in &outcome.diagnostics {
                    warn!("{:?}: {}", path, diagnostic);
                }
                outcome.tags
            }
            Err(err) => {
                warn!("Could not read tags from {:?}: {}", path, err);
                TagSchema::default()
            }
        },
        None => TagSchema::default(),
    };
    tags.codec_name = codec;
    TrackEntry {
        relpath: relpath.to_string(),
        codec,
        tags,
    }
}

pub struct NormalizationSession {
    registry: SortOrderRegistry,
    artist_remap: BTreeMap<String, String>,
}

impl NormalizationSession {
    pub fn new(registry: SortOrderRegistry, artist_remap: BTreeMap<String, String>) -> Self {
        Self {
            registry,
            artist_remap,
        }
    }

    pub fn registry(&self) -> &SortOrderRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SortOrderRegistry {
        &mut self.registry
    }

    /// Reads every audio file of `source` without reconciling anything.
    pub fn read_source(&self, source: &Path) -> Result<SourceBatch, LibraryError> {
        let (is_dir, source_dir, relpaths) = enumerate_audio(source)?;
        info!("Reading tags of {} files under {:?}", relpaths.len(), source_dir);
        let tracks = relpaths
            .iter()
            .map(|relpath| read_track(&source_dir, relpath))
            .collect();
        Ok(SourceBatch {
            source: source.to_path_buf(),
            is_dir,
            source_dir,
            tracks,
        })
    }

    /// Reads `source` and feeds its embedded sort orders to the registry.
    pub fn read_batch(
        &mut self,
        source: &Path,
        prompt: &mut dyn SortOrderPrompt,
    ) -> Result<(SourceBatch, BatchReconciliation), LibraryError> {
        let batch = self.read_source(source)?;
        let reconciliation = self.ingest_sort_orders(&batch, prompt);
        Ok((batch, reconciliation))
    }

    pub fn ingest_sort_orders(
        &mut self,
        batch: &SourceBatch,
        prompt: &mut dyn SortOrderPrompt,
    ) -> BatchReconciliation {
        let pairs = batch.tracks.iter().flat_map(|track| {
            [
                (track.tags.artist.as_deref(), track.tags.artist_sort.as_deref()),
                (
                    track.tags.album_artist.as_deref(),
                    track.tags.album_artist_sort.as_deref(),
                ),
            ]
        });
        self.registry.reconcile_batch(pairs, prompt)
    }

    /// Builds the tags to write for every file of `batch`.
    ///
    /// The artist is only rewritten when it has a remap entry. Sort orders
    /// come from the registry, prompting for artists it has not seen.
    pub fn plan_writes(
        &mut self,
        batch: &SourceBatch,
        plan: &ReleasePlan,
        prompt: &mut dyn SortOrderPrompt,
    ) -> Vec<PlannedWrite> {
        let max_track = batch.max_track();
        let max_disc = batch.max_disc();
        let album_artist_sort = plan
            .album_artist
            .as_deref()
            .map(|artist| self.registry.lookup_or_create(artist, prompt));
        let release_date = plan.release_date.map(|date| date.to_string());

        let mut out = Vec::with_capacity(batch.tracks.len());
        for track in &batch.tracks {
            let mut tags = track.tags.clone();
            tags.artist = track
                .tags
                .artist
                .as_ref()
                .and_then(|artist| self.artist_remap.get(artist).cloned());
            if let Some(album) = &plan.unify_album {
                tags.album = Some(album.clone());
            }
            tags.album_artist = plan.album_artist.clone();
            tags.album_sort = plan.album_sort.clone();
            tags.album_artist_sort = album_artist_sort.clone();
            tags.artist_sort = track
                .tags
                .artist
                .as_deref()
                .map(|artist| self.registry.lookup_or_create(artist, prompt));
            tags.release_date = release_date.clone();
            if tags.track.is_some() && tags.total_tracks.is_none() {
                tags.total_tracks = max_track;
            }
            if tags.disc.is_some() && tags.total_discs.is_none() {
                tags.total_discs = max_disc;
            }
            debug!("Planned {}: {:?}", track.relpath, tags.pending_changes());
            out.push(PlannedWrite {
                relpath: track.relpath.clone(),
                codec: track.codec,
                tags,
            });
        }
        out
    }

    /// Writes every plan below `target_dir`, skipping failures, then saves
    /// the registry.
    pub fn write_batch(
        &mut self,
        target_dir: &Path,
        plans: &[PlannedWrite],
    ) -> Result<BatchReport, LibraryError> {
        let mut report = BatchReport::default();
        for plan in plans {
            let path = join_relpath(target_dir, &plan.relpath);
            let Some(codec) = plan.codec else {
                warn!("Skipping {:?}: unknown codec", path);
                report.failed.push(WriteFailure {
                    relpath: plan.relpath.clone(),
                    reason: "unknown codec".to_string(),
                });
                continue;
            };
            match CodecAdapter::for_codec(codec).write(&path, &plan.tags) {
                Ok(()) => report.written += 1,
                Err(MetadataError::TargetMissing(path)) => {
                    warn!("Target vanished before write: {:?}", path);
                    report.missing.push(plan.relpath.clone());
                }
                Err(MetadataError::UnsupportedFormat { codec, pending }) => {
                    warn!(
                        "Cannot write {} tags to {:?}; set these manually: {:?}",
                        codec, path, pending
                    );
                    report.manual.push(ManualAction {
                        relpath: plan.relpath.clone(),
                        codec,
                        pending,
                    });
                }
                Err(err) => {
                    warn!("Failed to write {:?}: {}", path, err);
                    report.failed.push(WriteFailure {
                        relpath: plan.relpath.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        self.persist()?;
        info!(
            "Wrote {} files ({} missing, {} manual, {} failed)",
            report.written,
            report.missing.len(),
            report.manual.len(),
            report.failed.len()
        );
        Ok(report)
    }

    pub fn persist(&self) -> Result<(), LibraryError> {
        self.registry.persist()
    }
}
