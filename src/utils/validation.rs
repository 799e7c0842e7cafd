use regex::Regex;

pub fn is_valid_repo_name(name: &str) -> bool {
    let re =
        Regex::new(r"^[a-z0-9]+((\.|_|__|-+)[a-z0-9]+)*(\/[a-z0-9]+((\.|_|__|-+)[a-z0-9]+)*)*$")
            .unwrap();
    re.is_match(name)
}

pub fn is_valid_tag(tag: &str) -> bool {
    let re = Regex::new(r"^[a-zA-Z0-9_][a-zA-Z0-9._-]{0,127}$").unwrap();
    re.is_match(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_names() {
        assert!(is_valid_repo_name("library/ubuntu"));
        assert!(is_valid_repo_name("a/b/c"));
        assert!(!is_valid_repo_name("Library/Ubuntu"));
        assert!(!is_valid_repo_name("library//ubuntu"));
        assert!(!is_valid_repo_name(""));
    }

    #[test]
    fn tags() {
        assert!(is_valid_tag("latest"));
        assert!(is_valid_tag("v1.2.3"));
        assert!(!is_valid_tag("-leading-dash"));
        assert!(!is_valid_tag(""));
    }
}
