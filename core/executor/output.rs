use std::io::Write;
use std::sync::{Arc, Mutex};

/// Where an executor writes a stream of lines to.
///
#[derive(Clone, Debug, Default)]
pub enum OutputStream {
    #[default]
    Stdout,
    Stderr,
    Null,
    Buffer(SharedBuffer),
}

impl OutputStream {
    pub fn buffer() -> (Self, SharedBuffer) {
        let buffer = SharedBuffer::default();
        (Self::Buffer(buffer.clone()), buffer)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, OutputStream::Null)
    }

    pub fn write_line(&self, line: &str) {
        match self {
            OutputStream::Stdout => {
                let _ = writeln!(std::io::stdout().lock(), "{}", line);
            }
            OutputStream::Stderr => {
                let _ = writeln!(std::io::stderr().lock(), "{}", line);
            }
            OutputStream::Null => (),
            OutputStream::Buffer(buffer) => buffer.push_line(line),
        }
    }
}

/// An in-memory sink, mostly useful to capture the output of a command.
///
#[derive(Clone, Debug, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<String>>>);

impl SharedBuffer {
    fn push_line(&self, line: &str) {
        if let Ok(mut lines) = self.0.lock() {
            lines.push(line.to_string());
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.0.lock().map(|lines| lines.clone()).unwrap_or_default()
    }

    pub fn contents(&self) -> String {
        self.lines().join("\n")
    }
}
