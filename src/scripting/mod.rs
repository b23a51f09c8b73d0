//! Scripting module - Rhai runtime for the user init script
//!
//! Shell functions are exposed under the `tabula` namespace:
//! - `tabula::config::*` - session capacity, execution limits, classpath, projects

mod api;
mod engine;

pub use engine::ScriptEngine;
