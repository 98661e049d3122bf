use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use common::{join_relpath, relpath_from, relpath_parent};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::LibraryError;

const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageFile {
    pub relpath: String,
    pub size: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CoverSelection {
    /// A file named `cover*` or `folder*`.
    Definitive(PathBuf),
    /// No obvious cover; the caller picks one of these.
    Candidates(Vec<ImageFile>),
    NoImages,
}

pub fn find_images(source_dir: &Path) -> Vec<ImageFile> {
    let mut out = Vec::new();
    for entry in WalkDir::new(source_dir).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Skipping unreadable entry under {:?}: {}", source_dir, err);
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_image(entry.path()) {
            continue;
        }
        let Some(relpath) = relpath_from(source_dir, entry.path()) else {
            continue;
        };
        let size = entry.metadata().map(|meta| meta.len()).unwrap_or(0);
        out.push(ImageFile { relpath, size });
    }
    out.sort_by(|a, b| a.relpath.cmp(&b.relpath));
    out
}

pub fn select_cover(source_dir: &Path) -> CoverSelection {
    let images = find_images(source_dir);
    if images.is_empty() {
        return CoverSelection::NoImages;
    }
    let definitive = images.iter().find(|image| {
        let name = image
            .relpath
            .rsplit('/')
            .next()
            .unwrap_or(&image.relpath)
            .to_ascii_lowercase();
        name.starts_with("cover") || name.starts_with("folder")
    });
    match definitive {
        Some(image) => CoverSelection::Definitive(join_relpath(source_dir, &image.relpath)),
        None => CoverSelection::Candidates(images),
    }
}

/// Copies `cover` as `cover.<ext>` into `target_dir` and every directory
/// holding one of `audio_relpaths`. Existing covers are left alone.
pub fn install_cover(
    cover: &Path,
    target_dir: &Path,
    audio_relpaths: &[String],
) -> Result<Vec<PathBuf>, LibraryError> {
    let ext = match cover_extension(cover) {
        Some(ext) => ext,
        None => return Err(LibraryError::UnsupportedImage(cover.to_path_buf())),
    };
    let mut dirs: BTreeSet<&str> = audio_relpaths
        .iter()
        .map(|relpath| relpath_parent(relpath))
        .collect();
    dirs.insert("");

    let mut written = Vec::new();
    for dir in dirs {
        let dest = join_relpath(target_dir, dir).join(format!("cover.{}", ext));
        if dest.exists() {
            continue;
        }
        fs::copy(cover, &dest)?;
        info!("Copied cover to {:?}", dest);
        written.push(dest);
    }
    Ok(written)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn cover_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("jpg"),
        "png" => Some("png"),
        _ => None,
    }
}
