//! Folder import and JSON export.

use log::{debug, info, warn};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{Error, Result};
use crate::state::schema::{extract_collection, parse_resource_document, records_from_array};
use crate::state::{AppState, Collection, Record};

/// Accepted names for the links file, most preferred first. It also carries sections.
const LINK_FILES: &[&str] = &["linkhub-links.json", "links.json", "bookmarks.json"];
const SECTION_FILES: &[&str] = &["sections.json"];
const OPEN_POINT_FILES: &[&str] = &["open-points.json", "openpoints.json", "op.json"];
const SERVICE_FILES: &[&str] = &["services.json"];
const CHANGE_REQUEST_FILES: &[&str] = &["crq.json"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Replaced collections with their new record counts.
    pub replaced: Vec<(Collection, usize)>,
    /// Files that contributed data.
    pub files: Vec<PathBuf>,
    /// Links moved to the first section because their section was unknown.
    pub reassigned_links: usize,
}

/// Import every recognized file in `dir` on top of `current`.
///
/// Only collections found in the folder are replaced; the rest are kept.
/// File names are matched case-insensitively.
pub fn import_directory(dir: &Path, current: &AppState) -> Result<(AppState, ImportSummary)> {
    let files = list_json_files(dir)?;
    let mut found: HashMap<Collection, Vec<Record>> = HashMap::new();
    let mut summary = ImportSummary::default();

    if let Some(path) = pick(&files, LINK_FILES) {
        let value = read_json(path)?;
        let mut used = false;
        if let Value::Array(items) = &value {
            found.insert(Collection::Links, records_from_array(items));
            used = true;
        }
        for collection in [Collection::Links, Collection::Sections] {
            if let Some(records) = extract_collection(&value, collection) {
                found.insert(collection, records);
                used = true;
            }
        }
        if used {
            summary.files.push(path.clone());
        } else {
            warn!("[Import] {} holds neither links nor sections", path.display());
        }
    }

    let single_files = [
        (Collection::Sections, SECTION_FILES),
        (Collection::OpenPoints, OPEN_POINT_FILES),
        (Collection::Services, SERVICE_FILES),
        (Collection::ChangeRequests, CHANGE_REQUEST_FILES),
    ];
    for (collection, names) in single_files {
        // Sections embedded in the links file take precedence.
        if found.contains_key(&collection) {
            continue;
        }
        let Some(path) = pick(&files, names) else {
            continue;
        };
        match parse_resource_document(&read_json(path)?, collection) {
            Some(records) => {
                found.insert(collection, records);
                summary.files.push(path.clone());
            }
            None => warn!("[Import] {} holds no {} array", path.display(), collection),
        }
    }

    if found.is_empty() {
        return Err(Error::import(format!(
            "no recognized data files in {}",
            dir.display()
        )));
    }

    let mut next = current.clone();
    for collection in Collection::ALL {
        if let Some(records) = found.remove(&collection) {
            summary.replaced.push((collection, records.len()));
            next.set_collection(collection, records);
        }
    }

    if summary.replaced.iter().any(|(c, _)| *c == Collection::Links) {
        summary.reassigned_links = assign_orphan_links(&mut next);
    }

    info!(
        "[Import] Imported {} collections from {} files",
        summary.replaced.len(),
        summary.files.len()
    );
    Ok((next, summary))
}

/// Point links whose `sectionId` is missing or unknown at the first section.
fn assign_orphan_links(state: &mut AppState) -> usize {
    let Some(first) = state.sections.first().and_then(Record::id).map(str::to_string) else {
        return 0;
    };
    let known: HashSet<String> = state
        .sections
        .iter()
        .filter_map(Record::id)
        .map(str::to_string)
        .collect();

    let mut reassigned = 0;
    let links = std::mem::take(&mut state.links);
    state.links = links
        .into_iter()
        .map(|link| {
            let known_section = link
                .fields()
                .get("sectionId")
                .and_then(Value::as_str)
                .is_some_and(|id| known.contains(id));
            if known_section {
                link
            } else {
                reassigned += 1;
                link.with_field("sectionId", first.clone())
            }
        })
        .collect();
    if reassigned > 0 {
        debug!("[Import] Reassigned {} links to section {}", reassigned, first);
    }
    reassigned
}

/// Pretty-printed canonical JSON of the whole state.
pub fn export_json(state: &AppState) -> Result<String> {
    Ok(serde_json::to_string_pretty(state)?)
}

pub fn write_export(path: &Path, state: &AppState) -> Result<()> {
    fs::write(path, export_json(state)?)?;
    info!("[Import] Exported {} records to {}", state.total_records(), path.display());
    Ok(())
}

fn list_json_files(dir: &Path) -> Result<HashMap<String, PathBuf>> {
    let mut files = HashMap::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if name.ends_with(".json") {
            files.insert(name, entry.path());
        }
    }
    Ok(files)
}

fn pick<'a>(files: &'a HashMap<String, PathBuf>, names: &[&str]) -> Option<&'a PathBuf> {
    names.iter().find_map(|name| files.get(*name))
}

fn read_json(path: &Path) -> Result<Value> {
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw)
        .map_err(|e| Error::import(format!("{} is not valid JSON: {}", path.display(), e)))
}
