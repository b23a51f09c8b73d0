use ropey::Rope;
use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Write},
    path::Path,
};

/// Text content of a session
pub struct Buffer {
    text: Rope,
}

impl Buffer {
    pub fn new() -> Self {
        Self { text: Rope::new() }
    }

    pub fn from_file(path: &Path) -> io::Result<Self> {
        let text = Rope::from_reader(BufReader::new(File::open(path)?))?;
        Ok(Self { text })
    }

    pub fn from_text(s: &str) -> Self {
        Self {
            text: Rope::from_str(s),
        }
    }

    /// Write the whole buffer to `path`, creating the file if needed
    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.text.write_to(&mut writer)?;
        writer.flush()
    }

    pub fn text(&self) -> String {
        self.text.to_string()
    }

    /// Append text at the end of the buffer
    pub fn append(&mut self, s: &str) {
        let end = self.text.len_chars();
        self.text.insert(end, s);
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_is_empty() {
        let buf = Buffer::new();
        assert_eq!(buf.text(), "");
    }

    #[test]
    fn append_adds_to_end() {
        let mut buf = Buffer::from_text("let x = 1;\n");
        buf.append("x + 1\n");
        assert_eq!(buf.text(), "let x = 1;\nx + 1\n");
    }

    #[test]
    fn write_then_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.rhai");
        Buffer::from_text("40 + 2").write_to(&path).unwrap();

        let buf = Buffer::from_file(&path).unwrap();
        assert_eq!(buf.text(), "40 + 2");
    }

    #[test]
    fn from_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Buffer::from_file(&dir.path().join("absent.rhai")).is_err());
    }
}
