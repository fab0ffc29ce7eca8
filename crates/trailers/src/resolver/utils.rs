use regex::Regex;

#[inline]
pub fn capture_group_1<'a>(re: &Regex, input: &'a str) -> Option<&'a str> {
    re.captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Returns `s` unless it is empty or whitespace only.
#[inline]
pub fn non_empty(s: &str) -> Option<&str> {
    if s.trim().is_empty() { None } else { Some(s) }
}

/// Expand `{name}` placeholders in a registry template.
///
/// Unknown placeholders are left untouched.
pub fn expand_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_owned();
    for (name, value) in vars {
        let needle = format!("{{{name}}}");
        if out.contains(&needle) {
            out = out.replace(&needle, value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_known_placeholders_only() {
        let out = expand_template(
            "https://{application_id}-dsn.example.net/{domain}/{other}",
            &[("application_id", "APP"), ("domain", "site.com")],
        );
        assert_eq!(out, "https://APP-dsn.example.net/site.com/{other}");
    }

    #[test]
    fn non_empty_rejects_blank() {
        assert_eq!(non_empty(""), None);
        assert_eq!(non_empty("  "), None);
        assert_eq!(non_empty("x"), Some("x"));
    }
}
