/// Expand `$VAR` and `${VAR}` references using the process environment.
pub fn expand_env_vars(input: &str) -> String {
    expand_with(input, |name| std::env::var(name).ok())
}

/// Expand `$VAR` and `${VAR}` references with a custom lookup.
///
/// An unknown `${VAR}` expands to nothing, an unknown `$VAR` is left as
/// written. A lone `$` or an unterminated `${` is copied through.
pub fn expand_with<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        result.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => {
                    if let Some(value) = lookup(&braced[..end]) {
                        result.push_str(&value);
                    }
                    rest = &braced[end + 1..];
                }
                None => {
                    result.push_str(&rest[pos..]);
                    rest = "";
                }
            }
            continue;
        }

        let name_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let name = &after[..name_len];

        match lookup(name).filter(|_| !name.is_empty()) {
            Some(value) => result.push_str(&value),
            None => {
                result.push('$');
                result.push_str(name);
            }
        }
        rest = &after[name_len..];
    }

    result.push_str(rest);
    result
}

/// Interpret a boolean-like setting such as `yes`, `true`, `1` or `on`.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "yes" | "true" | "1" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_dollar_style() {
        let env = lookup(&[("HOME", "/home/backup"), ("USER", "ops")]);
        assert_eq!(expand_with("$HOME", &env), "/home/backup");
        assert_eq!(expand_with("$HOME/servers", &env), "/home/backup/servers");
        assert_eq!(expand_with("$USER-logs", &env), "ops-logs");
    }

    #[test]
    fn test_brace_style() {
        let env = lookup(&[("DATA", "/srv/data")]);
        assert_eq!(expand_with("${DATA}", &env), "/srv/data");
        assert_eq!(expand_with("${DATA}/daemons", &env), "/srv/data/daemons");
        assert_eq!(expand_with("pre-${DATA}-post", &env), "pre-/srv/data-post");
    }

    #[test]
    fn test_unknown_variables() {
        let env = lookup(&[]);
        assert_eq!(expand_with("$MISSING/path", &env), "$MISSING/path");
        assert_eq!(expand_with("${MISSING}/path", &env), "/path");
    }

    #[test]
    fn test_edge_cases() {
        let env = lookup(&[("VAR", "value")]);
        assert_eq!(expand_with("$", &env), "$");
        assert_eq!(expand_with("$$", &env), "$$");
        assert_eq!(expand_with("${", &env), "${");
        assert_eq!(expand_with("${incomplete", &env), "${incomplete");
        assert_eq!(expand_with("$VAR123", &env), "$VAR123");
        assert_eq!(expand_with("$VAR-123", &env), "value-123");
        assert_eq!(expand_with("$VAR/${VAR}", &env), "value/value");
    }

    #[test]
    fn test_parse_flag() {
        for value in ["yes", "YES", "true", "1", "on", " Yes "] {
            assert!(parse_flag(value), "{} should be set", value);
        }
        for value in ["no", "false", "0", "", "public"] {
            assert!(!parse_flag(value), "{} should be unset", value);
        }
    }
}
