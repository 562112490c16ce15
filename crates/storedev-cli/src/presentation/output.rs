//! Merged, prefixed process output.

use std::io::Write;

use console::{Color, Style, style};
use storedev_runtime::{OutputLine, OutputStream};
use tokio::sync::mpsc;

/// Prefixes are padded to at least this width so columns line up.
const MIN_PREFIX_WIDTH: usize = 10;

const PALETTE: &[Color] = &[
    Color::Cyan,
    Color::Magenta,
    Color::Yellow,
    Color::Green,
    Color::Blue,
];

/// Prints output lines from every running task, one at a time.
pub struct OutputRenderer<W> {
    writer: W,
    width: usize,
    colors: Vec<String>,
}

impl OutputRenderer<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> OutputRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            width: MIN_PREFIX_WIDTH,
            colors: Vec::new(),
        }
    }

    /// Print lines until every sender is gone.
    pub async fn run(mut self, mut lines: mpsc::UnboundedReceiver<OutputLine>) {
        while let Some(line) = lines.recv().await {
            self.render(&line);
        }
        let _ = self.writer.flush();
    }

    pub fn render(&mut self, line: &OutputLine) {
        self.width = self.width.max(line.prefix.len());
        let color = self.color_for(&line.prefix);
        let prefix = style(format!("{:<width$}", line.prefix, width = self.width))
            .fg(color)
            .bold();
        let text = line.text();
        let text = match line.stream {
            OutputStream::Stdout => Style::new().apply_to(text),
            OutputStream::Stderr => Style::new().red().apply_to(text),
        };
        // A closed stdout is not worth failing the session for.
        let _ = writeln!(self.writer, "{prefix} {} {text}", style("│").dim());
    }

    /// Colors are handed out in order of first appearance.
    fn color_for(&mut self, prefix: &str) -> Color {
        let index = match self.colors.iter().position(|known| known == prefix) {
            Some(index) => index,
            None => {
                self.colors.push(prefix.to_string());
                self.colors.len() - 1
            }
        };
        PALETTE[index % PALETTE.len()]
    }
}

/// Uncolored rendering of one line.
pub fn format_line(line: &OutputLine, width: usize) -> String {
    format!("{:<width$} │ {}", line.prefix, line.text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use storedev_runtime::OutputMux;

    #[test]
    fn plain_lines_are_padded() {
        let (mux, mut rx) = OutputMux::new();
        mux.sink("backend", OutputStream::Stdout).line("listening");
        let line = rx.try_recv().unwrap();
        assert_eq!(format_line(&line, 10), "backend    │ listening");
    }

    #[test]
    fn renderer_prints_every_line_in_order() {
        console::set_colors_enabled(false);
        let (mux, mut rx) = OutputMux::new();
        let (stdout, stderr) = mux.pair("frontend");
        stdout.line("ready");
        stderr.line("warning: slow");
        mux.sink("a-very-long-prefix", OutputStream::Stdout).line("done");
        drop((mux, stdout, stderr));

        let mut buffer = Vec::new();
        let mut renderer = OutputRenderer::new(&mut buffer);
        while let Ok(line) = rx.try_recv() {
            renderer.render(&line);
        }
        drop(renderer);

        let printed = String::from_utf8(buffer).unwrap();
        let lines: Vec<_> = printed.lines().collect();
        assert_eq!(lines[0], "frontend   │ ready");
        assert_eq!(lines[1], "frontend   │ warning: slow");
        assert_eq!(lines[2], "a-very-long-prefix │ done");
    }

    #[test]
    fn colors_are_stable_per_prefix() {
        let mut renderer = OutputRenderer::new(Vec::new());
        let first = renderer.color_for("backend");
        let second = renderer.color_for("frontend");
        assert_ne!(first, second);
        assert_eq!(renderer.color_for("backend"), first);
    }
}
