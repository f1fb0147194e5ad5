use std::io::{self, Write};

use crate::core::model::ProgressSnapshot;

/// Width of the progress bar in cells.
pub const BAR_WIDTH: usize = 20;

const FILLED: char = '■';
const EMPTY: char = '□';

/// Renders the single in-place progress line. Every call starts with a
/// carriage return and overwrites the previous line; the remembered line
/// length pads shorter lines with spaces so no stale characters survive.
pub struct Renderer {
    out: Box<dyn Write + Send>,
    last_line_chars: usize,
}

impl Renderer {
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self { out, last_line_chars: 0 }
    }

    pub fn render(&mut self, status: &str, snapshot: &ProgressSnapshot) -> io::Result<()> {
        let line = self.compose(status, snapshot);
        write!(self.out, "\r{line}")?;
        self.out.flush()
    }

    /// Terminate the in-place line and print a closing message on its own
    /// row. Keeps the whole stdout contract inside the renderer.
    pub fn finish(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "{message}")?;
        self.out.flush()
    }

    fn compose(&mut self, status: &str, snapshot: &ProgressSnapshot) -> String {
        let ratio = snapshot.ratio();
        let filled = (ratio * BAR_WIDTH as f64) as usize;

        let mut line = String::new();
        line.push_str(status);
        line.push_str(" [");
        for cell in 0..BAR_WIDTH {
            line.push(if cell < filled { FILLED } else { EMPTY });
        }
        line.push_str(&format!(
            "] {:.1}%    {}/s    {}",
            ratio * 100.0,
            human_bytes(snapshot.speed_bps),
            human_bytes(snapshot.total_size.unwrap_or(0)),
        ));

        // Pad up to the previous line so a shorter line erases the rest of
        // a longer one, but remember only the unpadded length.
        let unpadded_chars = line.chars().count();
        if self.last_line_chars > unpadded_chars {
            line.extend(std::iter::repeat(' ').take(self.last_line_chars - unpadded_chars));
        }
        self.last_line_chars = unpadded_chars;
        line
    }
}

/// Largest unit that keeps the value under 1024, one decimal place.
pub fn human_bytes(n: u64) -> String {
    const UNITS: [&str; 7] = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1}{}", value, UNITS[unit])
}
