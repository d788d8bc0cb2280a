//! Interactive capture: parsing of typed or scanned lines and suppression
//! of scanner double-reads.

use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use dockcount_core::normalize;

/// One line of capture input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Blank,
    Count { code: String, qty: i64 },
    Report,
    Progress,
    Finalize,
    Resync,
    Quit,
}

/// Parse `<code> [qty]` or a `:command`.
pub fn parse_entry(line: &str) -> anyhow::Result<Entry> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Entry::Blank);
    }
    if let Some(cmd) = line.strip_prefix(':') {
        return Ok(match cmd.trim() {
            "report" | "r" => Entry::Report,
            "progress" | "p" => Entry::Progress,
            "finalize" => Entry::Finalize,
            "resync" => Entry::Resync,
            "quit" | "q" => Entry::Quit,
            other => bail!("unknown command :{other}"),
        });
    }

    let mut parts = line.split_whitespace();
    let code = parts.next().unwrap_or_default().to_string();
    let qty = match parts.next() {
        Some(q) => q
            .parse::<i64>()
            .with_context(|| format!("quantity {q:?} is not a whole number"))?,
        None => 1,
    };
    if parts.next().is_some() {
        bail!("expected `<code> [qty]`, got {line:?}");
    }
    Ok(Entry::Count { code, qty })
}

/// Drops a repeat of the last accepted code that arrives inside `window`.
///
/// Scanners often fire twice on one trigger pull. Only the immediately
/// preceding code is remembered, and a suppressed read does not extend the
/// window.
#[derive(Debug)]
pub struct DuplicateFilter {
    window: Duration,
    last: Option<(String, Instant)>,
}

impl DuplicateFilter {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// `true` if the read at `now` should be counted.
    pub fn admit(&mut self, code: &str, now: Instant) -> bool {
        if self.window.is_zero() {
            return true;
        }
        let key = normalize(code);
        if let Some((prev, at)) = &self.last
            && *prev == key
            && now.saturating_duration_since(*at) < self.window
        {
            return false;
        }
        self.last = Some((key, now));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_code_with_default_quantity() {
        assert_eq!(
            parse_entry("  00123 ").unwrap(),
            Entry::Count {
                code: "00123".into(),
                qty: 1
            }
        );
    }

    #[test]
    fn parses_code_and_quantity() {
        assert_eq!(
            parse_entry("123 6").unwrap(),
            Entry::Count {
                code: "123".into(),
                qty: 6
            }
        );
    }

    #[test]
    fn negative_quantity_is_left_to_the_engine() {
        assert!(matches!(
            parse_entry("123 -2").unwrap(),
            Entry::Count { qty: -2, .. }
        ));
    }

    #[test]
    fn rejects_bad_quantity_and_extra_tokens() {
        assert!(parse_entry("123 two").is_err());
        assert!(parse_entry("123 2 3").is_err());
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse_entry(":report").unwrap(), Entry::Report);
        assert_eq!(parse_entry(":q").unwrap(), Entry::Quit);
        assert_eq!(parse_entry(":finalize").unwrap(), Entry::Finalize);
        assert_eq!(parse_entry(":resync").unwrap(), Entry::Resync);
        assert_eq!(parse_entry("").unwrap(), Entry::Blank);
        assert!(parse_entry(":nope").is_err());
    }

    #[test]
    fn repeat_inside_window_is_dropped() {
        let mut filter = DuplicateFilter::new(Duration::from_millis(500));
        let t0 = Instant::now();
        assert!(filter.admit("123", t0));
        assert!(!filter.admit("123", t0 + Duration::from_millis(100)));
        // Same item, different padding.
        assert!(!filter.admit("00123", t0 + Duration::from_millis(200)));
        assert!(filter.admit("123", t0 + Duration::from_millis(600)));
    }

    #[test]
    fn different_code_resets_the_window() {
        let mut filter = DuplicateFilter::new(Duration::from_millis(500));
        let t0 = Instant::now();
        assert!(filter.admit("123", t0));
        assert!(filter.admit("456", t0 + Duration::from_millis(10)));
        assert!(filter.admit("123", t0 + Duration::from_millis(20)));
    }

    #[test]
    fn suppressed_read_does_not_extend_window() {
        let mut filter = DuplicateFilter::new(Duration::from_millis(500));
        let t0 = Instant::now();
        assert!(filter.admit("7", t0));
        assert!(!filter.admit("7", t0 + Duration::from_millis(400)));
        assert!(filter.admit("7", t0 + Duration::from_millis(550)));
    }

    #[test]
    fn zero_window_admits_everything() {
        let mut filter = DuplicateFilter::new(Duration::ZERO);
        let t0 = Instant::now();
        assert!(filter.admit("1", t0));
        assert!(filter.admit("1", t0));
    }
}
