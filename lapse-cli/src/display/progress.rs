//! Progress display for report runs, with tracing routed around it.
//!
//! While a bar is active, log lines are printed through it so they do not
//! tear the bar's redraws.

use indicatif::{ProgressBar, ProgressStyle};
use lapse_core::ProgressCallback;
use std::io::Write;
use std::sync::{Mutex, PoisonError};

static ACTIVE_BAR: Mutex<Option<ProgressBar>> = Mutex::new(None);

pub fn set_active_bar(pb: ProgressBar) {
    *ACTIVE_BAR.lock().unwrap_or_else(PoisonError::into_inner) = Some(pb);
}

pub fn clear_active_bar() {
    *ACTIVE_BAR.lock().unwrap_or_else(PoisonError::into_inner) = None;
}

fn active_bar() -> Option<ProgressBar> {
    ACTIVE_BAR
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

fn emit_line(line: &str) -> std::io::Result<()> {
    match active_bar() {
        Some(pb) => {
            pb.println(line);
            Ok(())
        }
        None => {
            let mut stderr = std::io::stderr();
            stderr.write_all(line.as_bytes())?;
            stderr.write_all(b"\n")
        }
    }
}

/// Line-buffered writer that prints through the active bar, or stderr.
#[derive(Default)]
pub struct ProgressWriter {
    buffer: Vec<u8>,
}

impl Write for ProgressWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);

        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            let line = String::from_utf8_lossy(&line);
            emit_line(line.trim_end_matches('\n'))?;
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if !self.buffer.is_empty() {
            let rest = String::from_utf8_lossy(&self.buffer).trim_end().to_string();
            self.buffer.clear();
            if !rest.is_empty() {
                emit_line(&rest)?;
            }
        }
        Ok(())
    }
}

impl Drop for ProgressWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[derive(Default)]
pub struct ProgressWriterFactory;

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for ProgressWriterFactory {
    type Writer = ProgressWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ProgressWriter::default()
    }
}

/// Bar tracking how many domains of a report have been resolved.
pub struct ReportProgress {
    bar: ProgressBar,
}

impl ReportProgress {
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("█▓░"));
        }
        set_active_bar(bar.clone());
        Self { bar }
    }

    /// Callback for the resolver; reports each domain as it settles.
    pub fn callback(&self) -> ProgressCallback {
        let bar = self.bar.clone();
        Box::new(move |completed, _total, domain| {
            bar.set_position(completed as u64);
            bar.set_message(domain.to_string());
        })
    }
}

impl Drop for ReportProgress {
    fn drop(&mut self) {
        clear_active_bar();
        self.bar.finish_and_clear();
    }
}
