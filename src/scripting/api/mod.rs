//! API modules for the `tabula` namespace
//!
//! Each submodule provides functions under `tabula::<module>::*`

pub mod config;
