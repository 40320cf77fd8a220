//! Relevance score parsing for LLM rerank replies
//!
//! The reply is untrusted free-form text. The first decimal literal in it is
//! the score; anything without one, or with one outside [0, 1], yields
//! `None` ("no score"), never a default of zero.

/// First decimal literal in `text`: optional sign, digits, optional
/// fraction. Exponents are not recognised.
pub fn first_decimal(text: &str) -> Option<f64> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        let mut end = i;
        if matches!(bytes[end], b'-' | b'+') {
            end += 1;
        }

        let int_start = end;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        let mut digits = end - int_start;

        if end < bytes.len() && bytes[end] == b'.' {
            let frac_start = end + 1;
            let mut frac_end = frac_start;
            while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
                frac_end += 1;
            }
            if frac_end > frac_start {
                digits += frac_end - frac_start;
                end = frac_end;
            }
        }

        if digits > 0 {
            return text[start..end].parse().ok();
        }
        i += 1;
    }
    None
}

/// Rerank score in [0, 1], or `None`
pub fn parse_score(text: &str) -> Option<f32> {
    first_decimal(text)
        .filter(|v| v.is_finite() && (0.0..=1.0).contains(v))
        .map(|v| v as f32)
}
