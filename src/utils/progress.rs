//! Progress reporting for batch runs; a no-op without the `progress` feature

#[cfg(feature = "progress")]
pub use indicatif::{ProgressBar, ProgressStyle};

#[cfg(not(feature = "progress"))]
pub use self::noop::*;

/// Bar over the queries of a batch run, `None` when disabled or empty
pub fn query_bar(len: usize, enabled: bool) -> Option<ProgressBar> {
    if !enabled || len == 0 {
        return None;
    }

    let bar = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} queries")
    {
        bar.set_style(style.progress_chars("█▓▒░  "));
    }
    Some(bar)
}

#[cfg(not(feature = "progress"))]
mod noop {
    /// Stand-in for `indicatif::ProgressBar`
    #[derive(Clone)]
    pub struct ProgressBar;

    impl ProgressBar {
        pub fn new(_len: u64) -> Self {
            ProgressBar
        }

        pub fn set_style(&self, _style: ProgressStyle) {}
        pub fn inc(&self, _delta: u64) {}
        pub fn finish_and_clear(&self) {}
    }

    pub struct ProgressStyle;

    impl ProgressStyle {
        pub fn default_bar() -> Self {
            ProgressStyle
        }

        pub fn template(self, _template: &str) -> Result<Self, std::convert::Infallible> {
            Ok(self)
        }

        pub fn progress_chars(self, _chars: &str) -> Self {
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_bar() {
        assert!(query_bar(10, false).is_none());
        assert!(query_bar(0, true).is_none());
    }
}
