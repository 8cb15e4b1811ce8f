/// Parses a floating-point value that crossed the process boundary as text.
///
/// Parsing is locale-independent: `.` is the only decimal separator and no digit grouping is
/// accepted.  The runtime renders infinities as `∞`, so those are mapped explicitly.  Empty or
/// whitespace-only text is not a value.
pub(crate) fn parse_f64(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    match trimmed {
        "" => None,
        "∞" | "+∞" => Some(f64::INFINITY),
        "-∞" => Some(f64::NEG_INFINITY),
        _ => trimmed.parse::<f64>().ok(),
    }
}

/// Folds a provider name for case-insensitive comparison.
pub(crate) fn fold_case(name: &str) -> String { name.to_lowercase() }

#[cfg(test)]
mod tests {
    use super::{fold_case, parse_f64};

    #[test]
    fn test_parse_f64_invariant() {
        assert_eq!(parse_f64("12.5"), Some(12.5));
        assert_eq!(parse_f64(" 42 "), Some(42.0));
        assert_eq!(parse_f64("1E+15"), Some(1e15));
        assert_eq!(parse_f64("-0.25"), Some(-0.25));
        assert_eq!(parse_f64("∞"), Some(f64::INFINITY));
        assert_eq!(parse_f64("-∞"), Some(f64::NEG_INFINITY));
    }

    #[test]
    fn test_parse_f64_rejects_garbage() {
        assert_eq!(parse_f64(""), None);
        assert_eq!(parse_f64("   "), None);
        assert_eq!(parse_f64("x"), None);
        assert_eq!(parse_f64("1,5"), None);
        assert_eq!(parse_f64("1,000.5"), None);
    }

    #[test]
    fn test_fold_case() {
        assert_eq!(fold_case("System.Runtime"), fold_case("SYSTEM.RUNTIME"));
        assert_ne!(fold_case("System.Runtime"), fold_case("System.Net"));
    }
}
