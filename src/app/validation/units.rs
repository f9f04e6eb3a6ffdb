//! Size literal conversion

const MULTIPLIERS: [(&str, i64); 10] = [
    ("kib", 1 << 10),
    ("mib", 1 << 20),
    ("gib", 1 << 30),
    ("tib", 1 << 40),
    ("pib", 1 << 50),
    ("kb", 1_000),
    ("mb", 1_000_000),
    ("gb", 1_000_000_000),
    ("tb", 1_000_000_000_000),
    ("pb", 1_000_000_000_000_000),
];

/// Convert a size literal such as `1KiB`, `2TB`, `10b` or `500` to bytes
///
/// Binary suffixes multiply by powers of 1024, decimal ones by powers of 1000.
/// Matching is case-insensitive. Returns `None` for anything else, including
/// negative values and results that overflow.
pub fn convert_size_to_bytes(literal: &str) -> Option<i64> {
    let lowered = literal.trim().to_lowercase();

    let (number, multiplier) = MULTIPLIERS
        .iter()
        .find_map(|(suffix, multiplier)| {
            lowered
                .strip_suffix(*suffix)
                .map(|number| (number, *multiplier))
        })
        .or_else(|| lowered.strip_suffix('b').map(|number| (number, 1)))
        .unwrap_or((lowered.as_str(), 1));

    let value: i64 = number.trim().parse().ok()?;
    if value < 0 {
        return None;
    }
    value.checked_mul(multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_and_decimal_suffixes() {
        assert_eq!(convert_size_to_bytes("1KiB"), Some(1024));
        assert_eq!(convert_size_to_bytes("2TB"), Some(2_000_000_000_000));
        assert_eq!(convert_size_to_bytes("3gib"), Some(3 * 1024 * 1024 * 1024));
        assert_eq!(convert_size_to_bytes("5 MB"), Some(5_000_000));
    }

    #[test]
    fn test_plain_bytes() {
        assert_eq!(convert_size_to_bytes("500"), Some(500));
        assert_eq!(convert_size_to_bytes("10b"), Some(10));
        assert_eq!(convert_size_to_bytes("10B"), Some(10));
    }

    #[test]
    fn test_malformed_literals() {
        assert_eq!(convert_size_to_bytes("1024x"), None);
        assert_eq!(convert_size_to_bytes("TB"), None);
        assert_eq!(convert_size_to_bytes(""), None);
        assert_eq!(convert_size_to_bytes("-5GB"), None);
        assert_eq!(convert_size_to_bytes("99999999PiB"), None);
    }
}
