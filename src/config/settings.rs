use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default number of sessions that may be open at once
pub const DEFAULT_CAPACITY: usize = 12;

/// Default delay before the busy indicator shows for a running program
pub const DEFAULT_BUSY_DELAY_MS: u64 = 2000;

/// Shell settings that can be customized via the Rhai init script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    // Sessions
    pub capacity: usize,

    // Execution
    pub busy_delay_ms: u64,
    pub max_operations: u64, // 0 means unlimited
    pub runtime_root: Option<PathBuf>,
    pub classpath: Vec<PathBuf>,

    // Projects
    pub projects_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,

            busy_delay_ms: DEFAULT_BUSY_DELAY_MS,
            max_operations: 0,
            runtime_root: None,
            classpath: Vec::new(),

            projects_dir: None,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory holding one subdirectory per project
    pub fn projects_dir(&self) -> PathBuf {
        self.projects_dir
            .clone()
            .or_else(|| crate::scripting::ScriptEngine::config_dir().map(|p| p.join("projects")))
            .unwrap_or_else(|| PathBuf::from("projects"))
    }

    /// Runtime-library root excluded from the program classpath.
    /// Falls back to the directory the executable was installed in.
    pub fn runtime_root(&self) -> Option<PathBuf> {
        self.runtime_root.clone().or_else(|| {
            std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.capacity, 12);
        assert_eq!(settings.busy_delay_ms, 2000);
        assert_eq!(settings.max_operations, 0);
        assert!(settings.classpath.is_empty());
    }

    #[test]
    fn explicit_projects_dir_wins() {
        let settings = Settings {
            projects_dir: Some(PathBuf::from("/tmp/tabula-projects")),
            ..Settings::default()
        };
        assert_eq!(settings.projects_dir(), PathBuf::from("/tmp/tabula-projects"));
    }

    #[test]
    fn settings_serialize_to_json() {
        let json = serde_json::to_string(&Settings::default()).unwrap();
        assert!(json.contains("\"capacity\":12"));
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Settings::default());
    }
}
