/// Normalizes a project name for index lookups.
///
/// Names are compared case-insensitively and any run of `-`, `_` or `.` is treated as a single
/// `-`, so `Zope.Interface` and `zope_interface` resolve to the same project.
pub fn normalize_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut pending_separator = false;

    for c in name.trim().chars() {
        if matches!(c, '-' | '_' | '.') {
            pending_separator = true;
            continue;
        }
        if pending_separator && !normalized.is_empty() {
            normalized.push('-');
        }
        pending_separator = false;
        normalized.extend(c.to_lowercase());
    }

    normalized
}

/// Splits a comma or whitespace separated list into its trimmed, non-empty items.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Django"), "django");
        assert_eq!(normalize_name("zope.interface"), "zope-interface");
        assert_eq!(normalize_name("Foo__Bar-.baz"), "foo-bar-baz");
        assert_eq!(normalize_name("  spaced  "), "spaced");
        assert_eq!(normalize_name("trailing-"), "trailing");
    }

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list("web, http  server,"),
            vec!["web", "http", "server"]
        );
        assert!(split_list(" , ").is_empty());
    }
}
