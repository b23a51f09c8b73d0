//! The Rhai engine that evaluates the user's init script
//!
//! Provides the `tabula` namespace:
//! - `tabula::config::*` - capacity, execution and project settings

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use rhai::{Engine, Scope};

use super::api;
use crate::config::Settings;

/// Evaluates `init.rhai` against a shared `Settings`
pub struct ScriptEngine {
    engine: Engine,
    settings: Arc<RwLock<Settings>>,
}

impl ScriptEngine {
    /// Create a new script engine with fresh settings
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    /// Create a script engine seeded with existing settings
    pub fn with_settings(settings: Settings) -> Self {
        let settings = Arc::new(RwLock::new(settings));
        let engine = Self::create_engine(Arc::clone(&settings));

        Self { engine, settings }
    }

    fn create_engine(settings: Arc<RwLock<Settings>>) -> Engine {
        let mut engine = Engine::new();

        // Init scripts are small; keep them bounded
        engine.set_max_expr_depths(64, 64);
        engine.set_max_operations(100_000);

        let mut tabula_module = rhai::Module::new();
        let config_module = api::config::create_module(settings);
        tabula_module.set_sub_module("config", config_module);

        engine.register_static_module("tabula", tabula_module.into());

        engine.on_print(|msg| tracing::info!(target: "tabula::init", "{}", msg));
        engine.on_debug(|msg, _, pos| {
            tracing::debug!(target: "tabula::init", "{} at {}", msg, pos)
        });

        engine
    }

    /// Load and execute a script file
    pub fn load_file(&mut self, path: &Path) -> Result<(), String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read script file: {}", e))?;

        self.eval(&content)
    }

    /// Evaluate a Rhai script string
    pub fn eval(&mut self, script: &str) -> Result<(), String> {
        let ast = self
            .engine
            .compile(script)
            .map_err(|e| format!("Script parse error: {}", e))?;

        let mut scope = Scope::new();
        self.engine
            .run_ast_with_scope(&mut scope, &ast)
            .map_err(|e| format!("Script error: {}", e))?;

        Ok(())
    }

    /// Get the current settings (cloned)
    pub fn settings(&self) -> Settings {
        self.settings.read().map(|s| s.clone()).unwrap_or_default()
    }

    /// Get the config directory path.
    /// Uses ~/.config/tabula/ on all platforms for consistency
    pub fn config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join("tabula"))
    }

    /// Get the default init script path
    pub fn config_file() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("init.rhai"))
    }

    /// Load the default init script if it exists
    pub fn load_default(&mut self) -> Result<(), String> {
        if let Some(config_file) = Self::config_file() {
            if config_file.exists() {
                tracing::info!("loading {}", config_file.display());
                return self.load_file(&config_file);
            }
        }
        Ok(()) // No init script is fine
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_set_capacity() {
        let mut engine = ScriptEngine::new();
        engine.eval("tabula::config::set_capacity(8);").unwrap();
        assert_eq!(engine.settings().capacity, 8);
    }

    #[test]
    fn test_config_set_capacity_clamped() {
        let mut engine = ScriptEngine::new();
        engine.eval("tabula::config::set_capacity(0);").unwrap();
        assert_eq!(engine.settings().capacity, 1);
    }

    #[test]
    fn test_config_get_capacity() {
        let mut engine = ScriptEngine::new();
        engine
            .eval(
                r#"
                if tabula::config::get_capacity() != 12 {
                    throw "unexpected default capacity";
                }
            "#,
            )
            .unwrap();
    }

    #[test]
    fn test_config_add_classpath_dedupes() {
        let mut engine = ScriptEngine::new();
        engine
            .eval(
                r#"
                tabula::config::add_classpath("/opt/lib");
                tabula::config::add_classpath("/opt/lib");
                tabula::config::add_classpath("/srv/scripts");
            "#,
            )
            .unwrap();
        assert_eq!(
            engine.settings().classpath,
            vec![PathBuf::from("/opt/lib"), PathBuf::from("/srv/scripts")]
        );
    }

    #[test]
    fn test_config_multiple() {
        let mut engine = ScriptEngine::new();
        engine
            .eval(
                r#"
                tabula::config::set_busy_delay(250);
                tabula::config::set_max_operations(5000);
                tabula::config::set_runtime_root("/usr/lib/tabula");
                tabula::config::set_projects_dir("/tmp/projects");
            "#,
            )
            .unwrap();

        let settings = engine.settings();
        assert_eq!(settings.busy_delay_ms, 250);
        assert_eq!(settings.max_operations, 5000);
        assert_eq!(settings.runtime_root, Some(PathBuf::from("/usr/lib/tabula")));
        assert_eq!(settings.projects_dir, Some(PathBuf::from("/tmp/projects")));
    }

    #[test]
    fn test_script_error_is_reported() {
        let mut engine = ScriptEngine::new();
        let err = engine.eval("tabula::config::no_such_fn(1);").unwrap_err();
        assert!(err.starts_with("Script error"));
    }
}
