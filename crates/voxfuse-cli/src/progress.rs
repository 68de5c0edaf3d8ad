use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};
use voxfuse_core::pipeline::{PipelineStage, ProgressReporter};

/// Drives one terminal progress bar per pipeline stage.
pub struct BarReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl BarReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }
}

fn counted_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg:30} [{bar:40}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner} {msg:30} {elapsed}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

impl ProgressReporter for BarReporter {
    fn begin_stage(&self, stage: PipelineStage, total_items: Option<usize>) {
        let bar = match total_items {
            Some(total) => ProgressBar::new(total as u64).with_style(counted_style()),
            None => {
                let bar = ProgressBar::new_spinner().with_style(spinner_style());
                bar.enable_steady_tick(std::time::Duration::from_millis(120));
                bar
            }
        };
        bar.set_message(stage.to_string());
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(previous) = slot.replace(bar) {
                previous.finish();
            }
        }
    }

    fn advance(&self, items_done: usize) {
        if let Ok(slot) = self.bar.lock() {
            if let Some(bar) = slot.as_ref() {
                bar.set_position(items_done as u64);
            }
        }
    }

    fn finish_stage(&self) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.finish();
            }
        }
    }
}
