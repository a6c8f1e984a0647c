//! Domain-specific assertions for study guide tests

use predicates::prelude::*;

/// Assert that stderr does NOT contain any of the given strings
///
/// # Example
///
/// ```rust
/// use sg_test_helpers::assertions::stderr_not_contains;
/// use predicates::prelude::*;
///
/// assert!(stderr_not_contains(&["ERROR", "WARN"]).eval("all good"));
/// ```
pub fn stderr_not_contains(values: &[&str]) -> impl Predicate<str> {
    let owned_values: Vec<String> = values.iter().map(|&s| s.to_string()).collect();
    predicate::function(move |s: &str| {
        !owned_values.iter().any(|v| s.contains(v.as_str()))
    })
}

/// Assert that a string contains a participant colour such as `hsl(97, 70%, 50%)`
///
/// # Example
/// ```rust
/// use sg_test_helpers::assertions::contains_hsl_color;
/// use predicates::prelude::*;
///
/// assert!(contains_hsl_color().eval("alice hsl(97, 70%, 50%)"));
/// ```
pub fn contains_hsl_color() -> impl Predicate<str> {
    predicate::function(|s: &str| {
        s.match_indices("hsl(").any(|(start, _)| {
            let rest = &s[start + 4..];
            let Some(end) = rest.find(')') else {
                return false;
            };
            let parts: Vec<&str> = rest[..end].split(", ").collect();
            parts.len() == 3
                && parts[0].parse::<u16>().map(|h| h < 360).unwrap_or(false)
                && parts[1..]
                    .iter()
                    .all(|p| p.strip_suffix('%').and_then(|n| n.parse::<u8>().ok()).is_some())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_not_contains() {
        let stderr = "Some output without errors";
        assert!(stderr_not_contains(&["ERROR", "WARN"]).eval(stderr));

        let stderr_with_error = "ERROR: something went wrong";
        assert!(!stderr_not_contains(&["ERROR"]).eval(stderr_with_error));
    }

    #[test]
    fn test_contains_hsl_color() {
        assert!(contains_hsl_color().eval("hsl(0, 70%, 50%)"));
        assert!(contains_hsl_color().eval("bob -> hsl(225, 70%, 50%)\n"));
        assert!(!contains_hsl_color().eval("hsl(400, 70%, 50%)"));
        assert!(!contains_hsl_color().eval("hsl(12, 70, 50)"));
        assert!(!contains_hsl_color().eval("no colour here"));
    }
}
