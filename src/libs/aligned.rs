//! Checks whether a candidate row is a plain gapped copy of its reference row.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Leading,
    Core,
    Trailing,
}

/// Accepts one block of leading gaps, an exact core, then one block of trailing gaps.
///
/// Lowercase letters (insertions) are rejected everywhere. The reference must
/// be consumed completely; a longer candidate may only run on with gaps.
///
/// ```
/// use cxmsa::libs::aligned::is_aligned;
///
/// assert!(is_aligned("ABCDE", "-BCD-"));
/// assert!(is_aligned("ABCDE", "ABCDE"));
/// assert!(is_aligned("ABCDE", "-BCDE-"));
/// assert!(!is_aligned("ABCDE", "A-C-E"));
/// assert!(!is_aligned("ABCDE", "-bCD-"));
/// ```
pub fn is_aligned(target: &str, seq: &str) -> bool {
    let target = target.as_bytes();
    let seq = seq.as_bytes();

    let (mut i, mut j) = (0, 0);
    let mut state = State::Leading;
    while i < target.len() && j < seq.len() {
        let c = seq[j];
        if c.is_ascii_lowercase() {
            return false;
        }

        state = match (state, c) {
            (State::Leading, b'-') => State::Leading,
            (State::Leading, c) if c == target[i] => State::Core,
            (State::Core, b'-') => State::Trailing,
            (State::Core, c) if c == target[i] => State::Core,
            (State::Trailing, b'-') => State::Trailing,
            _ => return false,
        };
        i += 1;
        j += 1;
    }

    i == target.len() && seq[j..].iter().all(|&c| c == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_and_trailing_gaps() {
        assert!(is_aligned("ABCDE", "--CDE"));
        assert!(is_aligned("ABCDE", "ABC--"));
        assert!(is_aligned("ABCDE", "-BCD-"));
        assert!(is_aligned("ABCDE", "-----"));
    }

    #[test]
    fn test_internal_gap() {
        assert!(!is_aligned("ABCDE", "A-C-E"));
        assert!(!is_aligned("ABCDE", "AB-DE"));
    }

    #[test]
    fn test_mismatch() {
        assert!(!is_aligned("ABCDE", "ABXDE"));
        assert!(!is_aligned("ABCDE", "XBCDE"));
        // the leading gaps shift nothing: the third column compares C with B
        assert!(!is_aligned("ABCDE", "--BCD--"));
    }

    #[test]
    fn test_lowercase() {
        assert!(!is_aligned("ABCDE", "ABCDe"));
        assert!(!is_aligned("ABCDE", "aBCDE"));
        assert!(!is_aligned("ABCDE", "--c--"));
    }

    #[test]
    fn test_length() {
        assert!(!is_aligned("ABCDE", "ABC"));
        assert!(!is_aligned("ABCDE", ""));
        assert!(is_aligned("", ""));
    }

    #[test]
    fn test_longer_candidate() {
        assert!(is_aligned("ABCDE", "ABCDE--"));
        assert!(is_aligned("ABCDE", "-BCDE-"));
        assert!(is_aligned("ABC", "--C--"));
        assert!(!is_aligned("ABCDE", "ABCDE-F"));
        assert!(!is_aligned("ABCDE", "ABCDEa"));
        assert!(!is_aligned("ABCDE", "ABCDEF"));
    }
}
