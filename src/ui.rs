use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

use crate::pipeline::PipelineStats;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

/// Terminal feedback for the demo binary: setup stages and a live status line.
#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self { mode, is_tty }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty && self.mode != UiMode::Plain
    }

    fn spinner(&self, message: String) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        spinner.set_draw_target(ProgressDrawTarget::stderr());
        spinner.enable_steady_tick(Duration::from_millis(120));
        let style = ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.set_message(message);
        spinner
    }

    /// Announce a setup stage; completion is reported when the guard drops.
    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = self.spinner(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Status line refreshed with pipeline counters while the session runs.
    pub fn live(&self) -> LiveStatus {
        let spinner = self
            .use_pretty()
            .then(|| self.spinner("waiting for frames".to_string()));
        LiveStatus {
            spinner,
            started: Instant::now(),
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

pub struct LiveStatus {
    spinner: Option<ProgressBar>,
    started: Instant,
}

impl LiveStatus {
    /// Refresh the line. In plain mode this prints one line per call.
    pub fn update(&self, stats: &PipelineStats, boxes_on_screen: usize) {
        let line = status_line(stats, boxes_on_screen, self.started.elapsed());
        match &self.spinner {
            Some(spinner) => spinner.set_message(line),
            None => eprintln!("    {line}"),
        }
    }

    pub fn finish(self, stats: &PipelineStats) {
        let line = format!("✔ session ({})", status_line(stats, 0, self.started.elapsed()));
        match self.spinner {
            Some(spinner) => spinner.finish_with_message(line),
            None => eprintln!("{line}"),
        }
    }
}

fn status_line(stats: &PipelineStats, boxes_on_screen: usize, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    let rate = if secs > 0.0 {
        stats.detection_passes as f64 / secs
    } else {
        0.0
    };
    format!(
        "{:.1} det/s, {} boxes, {} dropped, {} failed [{}]",
        rate,
        boxes_on_screen,
        stats.frames_dropped,
        stats.detection_failures,
        format_duration(elapsed)
    )
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_flag_disables_pretty_output() {
        assert!(!Ui::from_args(Some("plain"), true).use_pretty());
        assert!(Ui::from_args(None, true).use_pretty());
        assert!(!Ui::from_args(Some("pretty"), false).use_pretty());
    }

    #[test]
    fn status_line_reports_rate_and_counters() {
        let stats = PipelineStats {
            detection_passes: 20,
            frames_dropped: 5,
            ..PipelineStats::default()
        };
        let line = status_line(&stats, 2, Duration::from_secs(2));
        assert!(line.starts_with("10.0 det/s, 2 boxes, 5 dropped"));
    }

    #[test]
    fn short_durations_use_milliseconds() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
