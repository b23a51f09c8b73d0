use std::path::PathBuf;

/// Supplies a file path when an untitled session has to be saved.
///
/// Front ends implement this with whatever dialog or prompt they have.
/// Returning `None` means the user declined.
pub trait FilePicker {
    fn pick_save_path(&mut self, suggested_name: &str) -> Option<PathBuf>;
}

/// Picker for front ends that pass paths explicitly: always declines
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPicker;

impl FilePicker for NoPicker {
    fn pick_save_path(&mut self, _suggested_name: &str) -> Option<PathBuf> {
        None
    }
}
