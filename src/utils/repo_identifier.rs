/// Owning project prefix of a repository identifier: everything before the
/// last `/`. Identifiers without a `/` have no resolvable project.
pub fn project_prefix(repo_name: &str) -> &str {
    match repo_name.rfind('/') {
        Some(idx) => &repo_name[..idx],
        None => "",
    }
}

/// Last path segment of a repository identifier.
pub fn image_name(repo_name: &str) -> &str {
    match repo_name.rfind('/') {
        Some(idx) => &repo_name[idx + 1..],
        None => repo_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_everything_before_the_last_slash() {
        assert_eq!(project_prefix("lib/app-server"), "lib");
        assert_eq!(project_prefix("team/sub/app"), "team/sub");
    }

    #[test]
    fn identifier_without_slash_has_no_project() {
        assert_eq!(project_prefix("app"), "");
        assert_eq!(image_name("app"), "app");
    }

    #[test]
    fn image_name_is_the_last_segment() {
        assert_eq!(image_name("lib/app-server"), "app-server");
        assert_eq!(image_name("team/sub/app"), "app");
    }
}
