/// Returns true when `needle` occurs in `haystack` at the start of a word.
///
/// Both sides are expected to be lower-cased already. Needles that begin with
/// punctuation (">", "<=") match anywhere.
pub fn mentions(haystack: &str, needle: &str) -> bool {
    find_mention(haystack, needle).is_some()
}

/// Byte offset of the first word-start occurrence of `needle`.
pub fn find_mention(haystack: &str, needle: &str) -> Option<usize> {
    let first = needle.chars().next()?;
    if !is_word_char(first) {
        return haystack.find(needle);
    }

    haystack.match_indices(needle).map(|(idx, _)| idx).find(|&idx| {
        haystack[..idx]
            .chars()
            .next_back()
            .map_or(true, |prev| !is_word_char(prev))
    })
}

/// Returns true when `word` occurs in `haystack` as a whole word, optionally
/// followed by a plural "s" or "es" ("user" matches "users" but not
/// "usernames").
pub fn mentions_word(haystack: &str, word: &str) -> bool {
    if word.is_empty() {
        return false;
    }

    haystack.match_indices(word).any(|(idx, _)| {
        let starts_word = haystack[..idx]
            .chars()
            .next_back()
            .map_or(true, |prev| !is_word_char(prev));
        let rest = &haystack[idx + word.len()..];
        let rest = rest
            .strip_prefix("es")
            .filter(|after| ends_word(after))
            .or_else(|| rest.strip_prefix('s'))
            .unwrap_or(rest);
        starts_word && ends_word(rest)
    })
}

fn ends_word(rest: &str) -> bool {
    rest.chars().next().map_or(true, |next| !is_word_char(next))
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Naive English singular of a table name, lower-cased.
pub fn singularize(word: &str) -> String {
    let lower = word.to_ascii_lowercase();

    if let Some(stem) = lower.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{}y", stem);
        }
    }

    for suffix in ["sses", "xes", "ches", "shes"] {
        if lower.ends_with(suffix) {
            return lower[..lower.len() - 2].to_string();
        }
    }

    if lower.ends_with('s') && !lower.ends_with("ss") && !lower.ends_with("us") && lower.len() > 1 {
        return lower[..lower.len() - 1].to_string();
    }

    lower
}

/// Renders a string as a single-quoted SQL literal.
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mentions_requires_word_start() {
        assert!(mentions("count orders per user", "count"));
        assert!(mentions("counting rows", "count"));
        assert!(!mentions("list accounts", "count"));
        assert!(mentions("orders_count", "orders"));
        assert!(!mentions("", "count"));
        assert!(!mentions("anything", ""));
    }

    #[test]
    fn mentions_word_allows_plural_only() {
        assert!(mentions_word("list users", "user"));
        assert!(mentions_word("each user's orders", "user"));
        assert!(mentions_word("all addresses", "address"));
        assert!(mentions_word("orders", "orders"));
        assert!(!mentions_word("usernames of people", "user"));
        assert!(!mentions_word("products ordered by price", "order"));
        assert!(!mentions_word("anything", ""));
    }

    #[test]
    fn punctuation_needles_match_anywhere() {
        assert!(mentions("price>50", ">"));
        assert_eq!(find_mention("a <= 3", "<="), Some(2));
    }

    #[test]
    fn singularize_common_table_names() {
        assert_eq!(singularize("Users"), "user");
        assert_eq!(singularize("Categories"), "category");
        assert_eq!(singularize("Addresses"), "address");
        assert_eq!(singularize("Boxes"), "box");
        assert_eq!(singularize("Status"), "status");
        assert_eq!(singularize("Class"), "class");
        assert_eq!(singularize("Person"), "person");
    }

    #[test]
    fn sql_literal_doubles_quotes() {
        assert_eq!(sql_literal("pending"), "'pending'");
        assert_eq!(sql_literal("O'Brien"), "'O''Brien'");
    }
}
