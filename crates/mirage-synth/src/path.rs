//! Path normalization.
//!
//! Pure string operations, no I/O. Every classification decision runs on
//! the output of [`normalize`], so idempotence here is load-bearing for
//! the whole dispatch layer.

/// Normalize a path: drop `.` segments, collapse `..` against the previous
/// segment (clamped at root), collapse duplicate separators, and strip any
/// trailing separator except for root itself.
///
/// Relative inputs stay relative; an input that collapses to nothing
/// becomes `"."` (or `"/"` when absolute).
pub fn normalize(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    let absolute = path.starts_with('/');
    let mut stack: Vec<&str> = Vec::new();

    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                match stack.last() {
                    Some(&"..") => stack.push(".."),
                    Some(_) => {
                        stack.pop();
                    }
                    // Above an absolute root ".." is a no-op; a relative
                    // path keeps climbing
                    None if !absolute => stack.push(".."),
                    None => {}
                }
            }
            seg => stack.push(seg),
        }
    }

    if stack.is_empty() {
        return if absolute { "/".to_string() } else { ".".to_string() };
    }
    let joined = stack.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Map any `/proc/<digits>/...` path onto `/proc/self/...` for matching:
/// a numeric first segment under `/proc` refers to "the querying process"
/// as far as the virtual-entity catalogue is concerned, alongside the
/// literal `self` alias. Paths outside `/proc` pass through unchanged.
pub fn canonical_proc(normalized: &str) -> String {
    let Some(rest) = normalized.strip_prefix("/proc/") else {
        return normalized.to_string();
    };
    let first = rest.split('/').next().unwrap_or("");
    if !first.is_empty() && first.bytes().all(|b| b.is_ascii_digit()) {
        let tail = &rest[first.len()..];
        format!("/proc/self{tail}")
    } else {
        normalized.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_examples() {
        assert_eq!(normalize("/a/./b/../c"), "/a/c");
        assert_eq!(normalize("/a//b"), "/a/b");
        assert_eq!(normalize("/a/b/"), "/a/b");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("//"), "/");
        assert_eq!(normalize("/.."), "/");
        assert_eq!(normalize("/../../etc"), "/etc");
        assert_eq!(normalize("/proc/self/../1/maps"), "/proc/1/maps");
    }

    #[test]
    fn test_normalize_relative() {
        assert_eq!(normalize("a/./b"), "a/b");
        assert_eq!(normalize("./a"), "a");
        assert_eq!(normalize("a/.."), ".");
        assert_eq!(normalize("../a"), "../a");
        assert_eq!(normalize("a/../../b"), "../b");
    }

    #[test]
    fn test_normalize_idempotent() {
        let cases = [
            "/a/./b/../c",
            "/a//b",
            "/proc/1234/./status",
            "/sys/class/dmi/id/../id/product_name",
            "relative/../x",
            "../x/..",
            "/",
            "/..",
        ];
        for case in cases {
            let once = normalize(case);
            assert_eq!(normalize(&once), once, "not idempotent for {case:?}");
        }
    }

    #[test]
    fn test_canonical_proc() {
        assert_eq!(canonical_proc("/proc/1234/maps"), "/proc/self/maps");
        assert_eq!(canonical_proc("/proc/self/maps"), "/proc/self/maps");
        assert_eq!(canonical_proc("/proc/cpuinfo"), "/proc/cpuinfo");
        assert_eq!(canonical_proc("/proc/12"), "/proc/self");
        assert_eq!(canonical_proc("/sys/class/net"), "/sys/class/net");
        // Mixed segment is not a pid
        assert_eq!(canonical_proc("/proc/12ab/maps"), "/proc/12ab/maps");
    }
}
