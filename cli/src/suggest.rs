//! "Did you mean" suggestions.

/// Largest edit distance still considered a typo.
const MAX_DISTANCE: usize = 2;

/// Closest candidate within typo distance, first one wins on ties.
///
/// # Examples
///
/// ```
/// use packcli::suggest;
///
/// assert_eq!(suggest("buidl", ["build", "watch"]), Some("build".to_string()));
/// assert_eq!(suggest("deploy", ["build", "watch"]), None);
/// ```
pub fn suggest<'a, I>(unknown: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best_match: Option<(&str, usize)> = None;

    for candidate in candidates {
        let distance = levenshtein_distance(unknown, candidate);
        if distance <= MAX_DISTANCE {
            match best_match {
                None => best_match = Some((candidate, distance)),
                Some((_, best)) if distance < best => best_match = Some((candidate, distance)),
                _ => {}
            }
        }
    }

    best_match.map(|(candidate, _)| candidate.to_string())
}

/// Levenshtein distance between two strings.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0usize; b_chars.len() + 1];
    for (i, a_char) in a_chars.iter().enumerate() {
        current[0] = i + 1;
        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = usize::from(a_char != b_char);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b_chars.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("serve", "serve"), 0);
    }

    #[test]
    fn test_prefers_closest() {
        assert_eq!(
            suggest("wath", ["watch", "what"]),
            Some("watch".to_string())
        );
        assert_eq!(suggest("mdoe", ["mode", "name"]), Some("mode".to_string()));
    }
}
