use std::path::{Path, PathBuf};

use tracing::debug;

use super::record::Record;
use crate::session::SessionManager;

pub const ACTIVE_KEY: &str = "Tab.Active";
pub const OPEN_PREFIX: &str = "Tab.Open.";
pub const CLASSPATH_PREFIX: &str = "Classpath.Entry";

/// The restorable part of an editing session set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Project {
    pub active: Option<PathBuf>,
    pub open: Vec<PathBuf>,
    pub classpath: Vec<PathBuf>,
}

impl Project {
    /// Snapshot the manager's file-backed sessions in tab order.
    /// Untitled sessions have nothing to restore and are left out.
    pub fn capture(manager: &SessionManager, classpath: &[PathBuf]) -> Self {
        let open = manager
            .tabs()
            .iter()
            .filter_map(|&id| manager.session(id))
            .filter_map(|s| s.path().map(|p| p.to_path_buf()))
            .collect();
        let active = manager
            .selected_session()
            .and_then(|s| s.path().map(|p| p.to_path_buf()));

        Self {
            active,
            open,
            classpath: classpath.to_vec(),
        }
    }
}

/// Key for the `index`th open file: `A`..`Z`, then `ZA`..`ZZ`, `ZZA`..,
/// which keeps lexicographic order equal to position.
pub fn position_key(index: usize) -> String {
    let mut key = "Z".repeat(index / 26);
    key.push((b'A' + (index % 26) as u8) as char);
    key
}

pub fn serialize(project: &Project) -> Record {
    let mut record = Record::new();

    if let Some(active) = &project.active {
        record.insert(ACTIVE_KEY, active.to_string_lossy());
    }
    for (i, path) in project.open.iter().enumerate() {
        record.insert(format!("{}{}", OPEN_PREFIX, position_key(i)), path.to_string_lossy());
    }
    for (i, entry) in project.classpath.iter().enumerate() {
        record.insert(format!("{}{}", CLASSPATH_PREFIX, i), entry.to_string_lossy());
    }

    record
}

/// Rebuild a project from `record`. Paths that no longer exist are dropped.
pub fn deserialize(record: &Record) -> Project {
    let open = record
        .with_prefix(OPEN_PREFIX)
        .map(|(_, v)| PathBuf::from(v))
        .filter(|p| keep(p, p.is_file()))
        .collect();

    let mut indexed: Vec<(usize, PathBuf)> = record
        .with_prefix(CLASSPATH_PREFIX)
        .filter_map(|(suffix, v)| match suffix.parse::<usize>() {
            Ok(i) => Some((i, PathBuf::from(v))),
            Err(_) => {
                debug!("Ignoring classpath key with suffix {:?}", suffix);
                None
            }
        })
        .collect();
    // Entry10 sorts before Entry2 as text
    indexed.sort_by_key(|(i, _)| *i);
    let classpath = indexed
        .into_iter()
        .map(|(_, p)| p)
        .filter(|p| keep(p, p.exists()))
        .collect();

    let active = record
        .get(ACTIVE_KEY)
        .map(PathBuf::from)
        .filter(|p| keep(p, p.is_file()));

    Project {
        active,
        open,
        classpath,
    }
}

fn keep(path: &Path, exists: bool) -> bool {
    if !exists {
        debug!("Skipping missing project path {}", path.display());
    }
    exists
}
