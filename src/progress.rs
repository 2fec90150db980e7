//! Extraction progress bar.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Number of cells in the bar.
pub const BAR_WIDTH: usize = 70;

/// `round(100 * index / total)`, clamped to 100. Zero when `total` is unknown.
pub fn percent_complete(index: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (100.0 * index as f64 / total as f64).round();
    pct.min(100.0) as u8
}

/// `[==========>       ] 14 %`: `=` before the boundary cell, `>` on it.
pub fn render_bar(percent: u8) -> String {
    let percent = percent.min(100) as usize;
    let pos = BAR_WIDTH * percent / 100;
    let mut out = String::with_capacity(BAR_WIDTH + 8);
    out.push('[');
    for i in 0..BAR_WIDTH {
        out.push(match i {
            i if i < pos => '=',
            i if i == pos => '>',
            _ => ' ',
        });
    }
    out.push_str(&format!("] {} %", percent));
    out
}

/// Receives one call per extracted frame.
pub trait ProgressReporter {
    fn report(&mut self, percent: u8);
    fn finish(&mut self) {}
}

/// Discards all updates.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&mut self, _percent: u8) {}
}

/// Draws the bar on stderr, redrawing the same line in place.
pub struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    pub fn new() -> Self {
        let bar = ProgressBar::with_draw_target(Some(100), ProgressDrawTarget::stderr());
        if let Ok(style) = ProgressStyle::with_template("Converting frames...  {msg}") {
            bar.set_style(style);
        }
        bar.set_message(render_bar(0));
        Self { bar }
    }
}

impl Default for BarReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for BarReporter {
    fn report(&mut self, percent: u8) {
        self.bar.set_position(percent as u64);
        self.bar.set_message(render_bar(percent));
    }

    fn finish(&mut self) {
        self.bar.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(bar: &str) -> &str {
        &bar[1..=BAR_WIDTH]
    }

    #[test]
    fn empty_bar() {
        let bar = render_bar(0);
        assert!(!cells(&bar).contains('='));
        assert_eq!(cells(&bar).find('>'), Some(0));
        assert!(bar.ends_with("] 0 %"));
    }

    #[test]
    fn full_bar() {
        let bar = render_bar(100);
        assert_eq!(cells(&bar), "=".repeat(BAR_WIDTH));
        assert!(bar.ends_with("] 100 %"));
    }

    #[test]
    fn half_bar() {
        let bar = render_bar(50);
        let c = cells(&bar);
        assert_eq!(c.matches('=').count(), 35);
        assert_eq!(c.find('>'), Some(35));
        assert_eq!(c.len(), BAR_WIDTH);
    }

    #[test]
    fn percentages() {
        assert_eq!(percent_complete(0, 3), 0);
        assert_eq!(percent_complete(1, 3), 33);
        assert_eq!(percent_complete(2, 3), 67);
        assert_eq!(percent_complete(5, 3), 100);
        assert_eq!(percent_complete(4, 0), 0);
    }
}
