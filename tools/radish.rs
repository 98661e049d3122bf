use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use library::cover::{install_cover, select_cover, CoverSelection};
use library::events::{parse_release_input, suggested_events};
use library::process::{copy_with, run_command};
use library::{
    config_path_from_env, folder_name, format_label, load_or_create_config, resolve_path,
    ConflictChoice, Continuity, EventCalendar, MappingStore, NormalizationSession, RadishConfig,
    ReleaseChoice, ReleasePlan, SortOrderPrompt, SortOrderRegistry, TargetPath,
};
use metadata::read_audio_format;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error>;

fn read_line() -> io::Result<String> {
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Prints `prompt` with `%%` replaced by the default and reads one answer.
///
/// `-` means "leave empty"; an empty answer takes the default.
fn ask(prompt: &str, default: Option<&str>) -> io::Result<Option<String>> {
    let shown = match default {
        Some(value) if !value.is_empty() => value,
        _ => " ",
    };
    print!("{}", prompt.replace("%%", shown));
    io::stdout().flush()?;
    let answer = read_line()?;
    if answer == "-" {
        return Ok(None);
    }
    if answer.is_empty() {
        return Ok(default.filter(|value| !value.is_empty()).map(str::to_string));
    }
    Ok(Some(answer))
}

struct TerminalPrompt;

impl SortOrderPrompt for TerminalPrompt {
    fn new_sort_order(&mut self, artist: &str) -> Option<String> {
        ask(&format!("Enter sort order for artist [{}]: ", artist), None)
            .ok()
            .flatten()
    }

    fn resolve_conflict(&mut self, artist: &str, primary: &str, observed: &str) -> ConflictChoice {
        let answer = ask(
            &format!(
                "Found sort order [{}] for artist [{}], but different sort order [{}] is already stored. Enter to ignore, [r] to replace, [q] to stop: ",
                observed, artist, primary
            ),
            None,
        );
        match answer.ok().flatten().as_deref() {
            Some("r") => ConflictChoice::Replace,
            Some("q") => ConflictChoice::Abort,
            _ => ConflictChoice::Keep,
        }
    }
}

fn absolute(path: &str) -> io::Result<PathBuf> {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(env::current_dir()?.join(path))
    }
}

fn load_calendar(config: &RadishConfig, config_path: &Path) -> EventCalendar {
    let Some(events_path) = config.events_path.as_deref() else {
        return EventCalendar::default();
    };
    match EventCalendar::load(&resolve_path(config_path, events_path)) {
        Ok(calendar) => calendar,
        Err(err) => {
            warn!("Event calendar not loaded: {}", err);
            EventCalendar::default()
        }
    }
}

struct Context {
    config: RadishConfig,
    config_path: PathBuf,
    calendar: EventCalendar,
    mapping: MappingStore,
    session: NormalizationSession,
}

fn main() -> Result<(), BoxError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = config_path_from_env();
    let (config, created) = load_or_create_config(&config_path)?;
    if created {
        info!("Wrote config to {:?}", config_path);
    }

    let registry = SortOrderRegistry::load(&resolve_path(&config_path, &config.registry_path))?;
    let mapping = MappingStore::load(&resolve_path(&config_path, &config.mapping_path))?;
    let calendar = load_calendar(&config, &config_path);
    let session = NormalizationSession::new(registry, config.artist_remap.clone());
    let mut ctx = Context {
        config,
        config_path,
        calendar,
        mapping,
        session,
    };

    let sources: Vec<String> = env::args().skip(1).collect();
    if sources.is_empty() {
        return Err("usage: radish SOURCE...".into());
    }
    for source in sources {
        let source = absolute(&source)?;
        println!("{}", "=".repeat(80));
        run_source(&mut ctx, &source);
    }
    Ok(())
}

/// Processes one source and saves the registry however it ended.
fn run_source(ctx: &mut Context, source: &Path) {
    if let Err(err) = process_source(ctx, source) {
        warn!("Failed to process {:?}: {}", source, err);
    }
    if let Err(err) = ctx.session.persist() {
        warn!("Failed to save sort orders: {}", err);
    }
}

fn process_source(ctx: &mut Context, source: &Path) -> Result<(), BoxError> {
    if !source.exists() {
        warn!("File/folder does not exist: {:?}", source);
        return Ok(());
    }
    if ctx.mapping.contains(source) {
        warn!("File/folder has already been processed: {:?}", source);
        if ctx.config.always_skip_mapped {
            return Ok(());
        }
        if ask("Enter to skip, [y] to process again: ", None)?.as_deref() != Some("y") {
            return Ok(());
        }
    }
    info!("Processing: {:?}", source);

    let mut prompt = TerminalPrompt;
    let (mut batch, reconciliation) = ctx.session.read_batch(source, &mut prompt)?;
    if reconciliation.aborted {
        ctx.session.persist()?;
        warn!("Sort order reconciliation stopped; skipping {:?}", source);
        return Ok(());
    }

    if let Some(tagger) = ctx.config.tagger_command.clone() {
        let answer = ask("Running tagger; [n] to skip, [f] to enter CLI flags: ", None)?;
        if answer.as_deref() != Some("n") {
            let mut command = tagger;
            if answer.as_deref() == Some("f") {
                print!("Enter flags: ");
                io::stdout().flush()?;
                command.extend(read_line()?.split_whitespace().map(str::to_string));
            }
            run_command(&command, [source.as_os_str()])?;
        }
        let (reread, reconciliation) = ctx.session.read_batch(source, &mut prompt)?;
        if reconciliation.aborted {
            ctx.session.persist()?;
            return Ok(());
        }
        batch = reread;
    }

    info!("Found {} audio files", batch.tracks.len());
    let first_path = match batch.first_path() {
        Some(path) => path,
        None => return Ok(()),
    };
    let global = batch.first_tags().cloned().unwrap_or_default();

    println!("Enter [-] to leave a field empty.");
    let label = match read_audio_format(&first_path) {
        Ok(Some(format)) => Some(format_label(&format)),
        Ok(None) => None,
        Err(err) => {
            warn!("Could not read stream properties of {:?}: {}", first_path, err);
            None
        }
    };
    let label = ask("Audio format [%%]: ", label.as_deref())?.unwrap_or_default();
    let album = ask("Album [%%]: ", global.album.as_deref())?;
    let mut album_artist = ask(
        "Album artist [%%]; [v] for various: ",
        global.album_artist.as_deref(),
    )?;
    if album_artist.as_deref() == Some("v") {
        album_artist = Some(ctx.config.various_artists.clone());
    }

    let release = ask_release(ctx, global.release_date.as_deref())?;

    let mut target = TargetPath::new(&ctx.config.library_path);
    let aa_group = ask_shelf(ctx, &mut target)?;
    if aa_group {
        if let Some(artist) = album_artist.as_deref() {
            target = target.with_album_artist(artist);
        }
    }
    if let Some(album) = album.as_deref() {
        let name = folder_name(
            release.date.as_ref(),
            release.event.as_deref(),
            album_artist.as_deref(),
            album,
            &label,
            &ctx.config.various_artists,
        );
        target = target.with_folder_name(&name);
    }
    if !batch.is_dir {
        target.basename = source.file_name().map(|name| name.to_string_lossy().to_string());
    }
    let target_path = confirm_target(ctx, &mut target)?;

    let mut unify_album = None;
    if let Some(album) = album.as_deref() {
        if batch.needs_album_unification(album) {
            let found: Vec<String> = batch
                .distinct_albums()
                .into_iter()
                .map(|value| value.unwrap_or_default())
                .collect();
            println!("Album tags in files: {} (entered: {})", found.join(", "), album);
            let prompt_text = format!(
                "Unify albums? Enter to ignore, [y] to unify to [{}], or enter unified album tag: ",
                album
            );
            unify_album = match ask(&prompt_text, None)? {
                Some(answer) if answer == "y" => Some(album.to_string()),
                other => other,
            };
        }
    }

    if !batch.has_track_numbers() {
        let answer = ask(
            "No track numbers found! Enter to ignore, or [y] to try to remap from Booth-style filenames: ",
            None,
        )?;
        if answer.as_deref() == Some("y") && batch.remap_booth_tracks() == 0 {
            warn!("Found no matching filenames");
        }
    }

    if batch.has_duplicate_tracks() {
        warn!("Found duplicate track numbers");
        match batch.resolve_continuity() {
            Continuity::Feasible(renumbering) => {
                info!("Continuous remapping appears possible");
                if ask("Remap? [y] (default) or [n]: ", None)?.as_deref() != Some("n") {
                    batch.apply_renumbering(&renumbering);
                }
            }
            Continuity::Infeasible(reason) => {
                warn!("Unable to remap continuously: {:?}", reason);
                ask("Press enter to continue: ", None)?;
            }
        }
    }

    let album_sort = match album.as_deref() {
        Some(album) => ask(
            "Enter album sort order [%%]: ",
            Some(global.album_sort.as_deref().unwrap_or(album)),
        )?,
        None => None,
    };

    let cover = if batch.is_dir { ask_cover(source)? } else { None };

    if let Some(parent) = target_path.parent() {
        fs::create_dir_all(parent)?;
    }
    copy_with(&ctx.config.copy_command, source, &target_path)?;
    ctx.mapping.record(source, &target_path)?;
    info!("Copied to {:?}", target_path);

    let target_dir = if batch.is_dir {
        target_path.clone()
    } else {
        target_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| target_path.clone())
    };

    let plan = ReleasePlan {
        album_artist,
        album_sort,
        unify_album,
        release_date: release.date,
    };
    let plans = ctx.session.plan_writes(&batch, &plan, &mut prompt);
    let report = ctx.session.write_batch(&target_dir, &plans)?;
    for action in &report.manual {
        println!("Set manually on {} ({}):", action.relpath, action.codec);
        for (field, value) in &action.pending {
            println!("  {} = {}", field, value);
        }
    }

    if let Some(cover) = cover {
        install_cover(&cover, &target_dir, &batch.relpaths())?;
    }

    info!("Done");
    Ok(())
}

fn ask_release(ctx: &mut Context, previous: Option<&str>) -> Result<ReleaseChoice, BoxError> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        let events = suggested_events(previous, &ctx.calendar);
        let mut prompt = "Release date [%%]".to_string();
        if !events.is_empty() {
            let options: Vec<String> = events
                .iter()
                .enumerate()
                .map(|(idx, event)| format!("[{}] for [{}]", idx, event))
                .collect();
            prompt.push_str("; ");
            prompt.push_str(&options.join(", "));
        }
        if attempts > 1 {
            prompt.push_str("; [r] to reload event list");
        }
        prompt.push_str(": ");

        print!("{}", prompt.replace("%%", previous.unwrap_or(" ")));
        io::stdout().flush()?;
        let answer = read_line()?;
        if answer == "r" {
            ctx.calendar = load_calendar(&ctx.config, &ctx.config_path);
            continue;
        }
        match parse_release_input(&answer, previous, &ctx.calendar) {
            Ok(choice) => return Ok(choice),
            Err(err) => warn!("{}", err),
        }
    }
}

/// Returns whether the chosen shelf groups by album artist.
fn ask_shelf(ctx: &Context, target: &mut TargetPath) -> Result<bool, BoxError> {
    if ctx.config.shelves.is_empty() {
        info!("No shelves found. Copying to main library path.");
        return Ok(false);
    }
    let width = ctx
        .config
        .shelves
        .iter()
        .map(|shelf| shelf.short.len())
        .max()
        .unwrap_or(0);
    println!("Shelves:");
    for shelf in &ctx.config.shelves {
        println!(" [{:>width$}]: {}", shelf.short, shelf.folder, width = width);
    }
    loop {
        match ask("Select shelf: ", None)? {
            None => {
                info!("No shelf selected. Copying to main library path.");
                return Ok(false);
            }
            Some(short) => match ctx.config.shelf(&short) {
                Some(shelf) => {
                    target.shelf_folder = Some(shelf.folder.clone());
                    return Ok(shelf.aa_group);
                }
                None => warn!("Invalid shelf!"),
            },
        }
    }
}

fn confirm_target(ctx: &Context, target: &mut TargetPath) -> Result<PathBuf, BoxError> {
    loop {
        let path = target.to_path();
        println!("Target: {}", path.display());
        if path.exists() {
            warn!("Target already exists! Consider deleting it before proceeding");
        }
        if target.album_artist_folder.as_deref() == Some(ctx.config.various_artists.as_str()) {
            warn!(
                "Album artist folder is '{}'; consider setting a different one.",
                ctx.config.various_artists
            );
        }
        match ask("Press enter to continue; [a] to set album artist folder: ", None)? {
            Some(answer) if answer == "a" => {
                match ask("Enter new album artist folder: ", None)? {
                    Some(folder) => *target = target.clone().with_album_artist(&folder),
                    None => target.album_artist_folder = None,
                }
            }
            _ => return Ok(path),
        }
    }
}

fn ask_cover(source: &Path) -> Result<Option<PathBuf>, BoxError> {
    match select_cover(source) {
        CoverSelection::Definitive(path) => Ok(Some(path)),
        CoverSelection::NoImages => Ok(None),
        CoverSelection::Candidates(images) => {
            println!("Could not find definitive cover image. Image files found:");
            let width = images.len().saturating_sub(1).to_string().len();
            for (idx, image) in images.iter().enumerate() {
                println!(
                    " [{:>width$}]: {} ({} bytes)",
                    idx,
                    image.relpath,
                    image.size,
                    width = width
                );
            }
            loop {
                let Some(answer) = ask("Select one of the above, or press enter for no cover art: ", None)? else {
                    return Ok(None);
                };
                match answer.parse::<usize>().ok().and_then(|idx| images.get(idx)) {
                    Some(image) => return Ok(Some(common::join_relpath(source, &image.relpath))),
                    None => warn!("Invalid selection"),
                }
            }
        }
    }
}
