//! Conversions between dotted package names, slash-separated binary names and entry paths.

pub const CLASS_SUFFIX: &str = ".class";

pub const MODULE_INFO: &str = "module-info.class";

/// `org.example.Foo` -> `org/example/Foo`
pub fn to_path(binary_name: &str) -> String {
    binary_name.replace('.', "/")
}

/// `org/example/Foo` -> `org.example.Foo`
pub fn to_package(path: &str) -> String {
    path.replace('/', ".")
}

pub fn strip_class_suffix(name: &str) -> Option<&str> {
    name.strip_suffix(CLASS_SUFFIX).filter(|s| !s.is_empty())
}

pub fn is_class_file(name: &str) -> bool {
    strip_class_suffix(name).is_some() && !is_directory(name)
}

pub fn is_directory(name: &str) -> bool {
    name.ends_with('/')
}

/// Splits a path into its non-empty `/` segments.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Package segments of a class entry path, e.g. `a/b/C.class` -> `["a", "b"]`.
pub fn package_segments(path: &str) -> Vec<&str> {
    let mut segs = segments(path);
    segs.pop();
    segs
}

/// Every ancestor directory of `path`, outermost first, each with a trailing `/`.
///
/// `a/b/c.txt` yields `a/` and `a/b/`; a directory path does not list itself.
pub fn ancestor_directories(path: &str) -> Vec<String> {
    let trimmed = path.trim_end_matches('/');
    let mut out = Vec::new();
    let mut end = 0;
    while let Some(pos) = trimmed[end..].find('/') {
        end += pos + 1;
        out.push(trimmed[..end].to_string());
    }
    out
}

/// Normalizes a relocation prefix to slash form without leading or trailing separators.
pub fn normalize_prefix(prefix: &str) -> String {
    let slashed = if prefix.contains('/') {
        prefix.to_string()
    } else {
        to_path(prefix)
    };
    slashed.trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_and_package_round_trip() {
        for name in ["org/example/Foo", "a/B$Inner", "Top", "x/y/z/W"] {
            assert_eq!(to_path(&to_package(name)), name);
        }
        for name in ["org.example.Foo", "a.B$Inner"] {
            assert_eq!(to_package(&to_path(name)), name);
        }
    }

    #[test]
    fn class_suffix_handling() {
        assert_eq!(strip_class_suffix("a/B.class"), Some("a/B"));
        assert_eq!(strip_class_suffix(".class"), None);
        assert!(is_class_file("a/B.class"));
        assert!(!is_class_file("a/B.class/"));
        assert!(!is_class_file("a/B.txt"));
    }

    #[test]
    fn ancestors_are_listed_outermost_first() {
        assert_eq!(ancestor_directories("a/b/c.txt"), vec!["a/", "a/b/"]);
        assert_eq!(ancestor_directories("a/b/"), vec!["a/"]);
        assert!(ancestor_directories("top.txt").is_empty());
    }

    #[test]
    fn package_segments_drop_the_leaf() {
        assert_eq!(package_segments("com/acme/Widget.class"), vec!["com", "acme"]);
        assert!(package_segments("Widget.class").is_empty());
    }

    #[test]
    fn prefixes_normalize_to_slash_form() {
        assert_eq!(normalize_prefix("vendored.lib"), "vendored/lib");
        assert_eq!(normalize_prefix("/vendored/lib/"), "vendored/lib");
        assert_eq!(normalize_prefix("vendored"), "vendored");
    }
}
