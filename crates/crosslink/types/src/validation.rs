//! Input validation for externally supplied names and identifiers.
//!
//! Validation happens before any store or platform call; malformed input
//! never reaches the repositories.

/// Secondary-platform account names: 3 to 16 word characters.
pub fn is_valid_secondary_name(name: &str) -> bool {
    (3..=16).contains(&name.len())
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Secondary identifiers in canonical dashed form (8-4-4-4-12 hex groups).
pub fn is_valid_secondary_id(id: &str) -> bool {
    let groups: Vec<&str> = id.split('-').collect();
    if groups.len() != 5 {
        return false;
    }
    let lens = [8, 4, 4, 4, 12];
    groups
        .iter()
        .zip(lens)
        .all(|(group, len)| group.len() == len && group.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// Re-dash a secondary identifier given with or without separators.
///
/// Returns `None` when the input is not 32 hex digits after stripping.
pub fn normalize_secondary_id(id: &str) -> Option<String> {
    let clean: String = id
        .chars()
        .filter(|c| *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if clean.len() != 32 || !clean.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!(
        "{}-{}-{}-{}-{}",
        &clean[0..8],
        &clean[8..12],
        &clean[12..16],
        &clean[16..20],
        &clean[20..32]
    ))
}

/// Trim, bound, and strip markup-significant characters from a display tag.
pub fn sanitize_tag(input: &str, max_len: usize) -> String {
    input
        .trim()
        .chars()
        .take(max_len)
        .filter(|c| !matches!(c, '<' | '>' | '@' | '#' | '&' | '!'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names_pass() {
        assert!(is_valid_secondary_name("Steve"));
        assert!(is_valid_secondary_name("under_score_99"));
        assert!(is_valid_secondary_name("abc"));
    }

    #[test]
    fn invalid_names_fail() {
        assert!(!is_valid_secondary_name("ab"));
        assert!(!is_valid_secondary_name("seventeen_chars__"));
        assert!(!is_valid_secondary_name("bad name"));
        assert!(!is_valid_secondary_name("bad-name"));
    }

    #[test]
    fn normalize_secondary_id_redashes() {
        let id = normalize_secondary_id("069A79F444E94726A5BEFCA90E38AAF5").unwrap();
        assert_eq!(id, "069a79f4-44e9-4726-a5be-fca90e38aaf5");
        assert!(is_valid_secondary_id(&id));
    }

    #[test]
    fn normalize_secondary_id_rejects_garbage() {
        assert!(normalize_secondary_id("nope").is_none());
        assert!(normalize_secondary_id("069a79f444e94726a5befca90e38aaf").is_none());
        assert!(normalize_secondary_id("zzza79f444e94726a5befca90e38aaf5").is_none());
    }

    #[test]
    fn sanitize_tag_strips_markup() {
        assert_eq!(sanitize_tag("  @user<1>! ", 32), "user1");
        assert_eq!(sanitize_tag("abcdef", 3), "abc");
    }
}
