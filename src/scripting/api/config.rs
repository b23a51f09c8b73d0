//! tabula::config - Session capacity, execution limits, classpath
//!
//! Usage in Rhai:
//! ```rhai
//! tabula::config::set_capacity(8);
//! tabula::config::set_busy_delay(500);
//! tabula::config::add_classpath("~/scripts/lib");
//! ```

use rhai::plugin::*;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::config::Settings;

/// Expand a leading `~/` so init scripts can use home-relative paths
fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

/// Create the config module with access to settings
pub fn create_module(settings: Arc<RwLock<Settings>>) -> rhai::Module {
    let mut module = rhai::Module::new();

    // set_capacity(count: i64)
    {
        let s = Arc::clone(&settings);
        module.set_native_fn("set_capacity", move |count: i64| {
            if let Ok(mut settings) = s.write() {
                settings.capacity = count.clamp(1, 64) as usize;
            }
            Ok(())
        });
    }

    // get_capacity() -> i64
    {
        let s = Arc::clone(&settings);
        module.set_native_fn(
            "get_capacity",
            move || -> Result<i64, Box<EvalAltResult>> {
                Ok(s.read()
                    .map(|s| s.capacity as i64)
                    .unwrap_or(crate::config::DEFAULT_CAPACITY as i64))
            },
        );
    }

    // set_busy_delay(millis: i64)
    {
        let s = Arc::clone(&settings);
        module.set_native_fn("set_busy_delay", move |millis: i64| {
            if let Ok(mut settings) = s.write() {
                settings.busy_delay_ms = millis.max(0) as u64;
            }
            Ok(())
        });
    }

    // set_max_operations(limit: i64), 0 = unlimited
    {
        let s = Arc::clone(&settings);
        module.set_native_fn("set_max_operations", move |limit: i64| {
            if let Ok(mut settings) = s.write() {
                settings.max_operations = limit.max(0) as u64;
            }
            Ok(())
        });
    }

    // set_runtime_root(path: &str)
    {
        let s = Arc::clone(&settings);
        module.set_native_fn("set_runtime_root", move |path: &str| {
            if let Ok(mut settings) = s.write() {
                settings.runtime_root = Some(expand_home(path));
            }
            Ok(())
        });
    }

    // add_classpath(path: &str)
    {
        let s = Arc::clone(&settings);
        module.set_native_fn("add_classpath", move |path: &str| {
            if let Ok(mut settings) = s.write() {
                let entry = expand_home(path);
                if !settings.classpath.contains(&entry) {
                    settings.classpath.push(entry);
                }
            }
            Ok(())
        });
    }

    // set_projects_dir(path: &str)
    {
        let s = Arc::clone(&settings);
        module.set_native_fn("set_projects_dir", move |path: &str| {
            if let Ok(mut settings) = s.write() {
                settings.projects_dir = Some(expand_home(path));
            }
            Ok(())
        });
    }

    module
}
