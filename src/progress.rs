use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

/// Terminal bar advanced once per collected image. Disabled when log lines
/// would interleave with it.
pub struct Progress {
    bar: Option<ProgressBar>,
}

impl Progress {
    pub fn new(total: usize, show: bool) -> Self {
        if !show {
            return Self::hidden();
        }
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { bar: Some(bar) }
    }

    pub fn hidden() -> Self {
        Self { bar: None }
    }

    pub fn is_visible(&self) -> bool {
        self.bar.is_some()
    }

    pub fn position(&self) -> u64 {
        self.bar.as_ref().map_or(0, |b| b.position())
    }

    pub fn collected(&self, path: &Path) {
        if let Some(bar) = &self.bar {
            bar.set_message(
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
            bar.inc(1);
        }
    }

    pub fn finish(&self, interrupted: bool) {
        if let Some(bar) = &self.bar {
            if interrupted {
                bar.abandon_with_message("interrupted");
            } else {
                bar.finish_with_message("done");
            }
        }
    }
}
