//! Item code normalisation.
//!
//! The manifest carries zero-padded SAP codes ("00123"), while a barcode scan
//! or a keyboard entry of the same item may arrive as "123" or "0123". Every
//! comparison between manifest rows, persisted rows and count events goes
//! through [`normalize`] so all three spellings meet on one key.

/// Canonicalise an item code.
///
/// # Algorithm
///
/// 1. Trim surrounding whitespace.
/// 2. Strip leading `'0'` characters, together with any whitespace the
///    stripping uncovers, so the result never starts with `0` or a space.
///
/// Total (any input yields a value) and idempotent. An all-zero code
/// normalises to the empty string, which callers treat as "no code".
pub fn normalize(raw: &str) -> String {
    raw.trim()
        .trim_start_matches(|c: char| c == '0' || c.is_whitespace())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_leading_zeros() {
        assert_eq!(normalize("007"), "7");
        assert_eq!(normalize("7"), "7");
        assert_eq!(normalize("00123"), "123");
    }

    #[test]
    fn keeps_inner_and_trailing_zeros() {
        assert_eq!(normalize("1020"), "1020");
        assert_eq!(normalize("0100"), "100");
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(normalize("  00123 \t"), "123");
        assert_eq!(normalize("\n42\n"), "42");
    }

    #[test]
    fn all_zero_and_blank_become_empty() {
        assert_eq!(normalize("000"), "");
        assert_eq!(normalize("0"), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn idempotent() {
        for raw in ["007", " 0 5", "0 0 5 ", "ABC", "00A1", "  ", "10", "0\t0\t9"] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn alphanumeric_codes_pass_through() {
        assert_eq!(normalize("0A12"), "A12");
        assert_eq!(normalize("X0001"), "X0001");
    }
}
