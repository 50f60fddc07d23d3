//! Cross-platform path canonicalisation for comparing client-reported paths.
//!
//! # Design
//! - Pure string transforms; never touches the filesystem and never fails.
//! - Malformed input degrades to a best-effort canonical form.
//! - Windows drive roots stay rooted (`C:/`), UNC prefixes keep their double slash.

/// Canonicalise a path string.
///
/// Backslashes become forward slashes, `.` segments are dropped, `..` collapses
/// the previous segment, and trailing slashes are removed except on a root.
#[must_use]
pub fn normalize(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }

    let unified = path.replace('\\', "/");
    let (prefix, rest) = split_root(&unified);

    let mut segments: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else if prefix.is_empty() {
                    segments.push("..");
                }
                // `..` above a root stays at the root.
            }
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    match (prefix.is_empty(), joined.is_empty()) {
        (true, true) => ".".to_string(),
        (true, false) => joined,
        (false, _) => format!("{prefix}{joined}"),
    }
}

/// Canonicalise and case-fold a path for case-insensitive comparison.
#[must_use]
pub fn normalize_fold(path: &str) -> String {
    normalize(path).to_lowercase()
}

/// Top-level directory shared by every path, if one exists.
///
/// Paths are compared after normalisation; a single path without a directory
/// component has no root.
#[must_use]
pub fn common_root<'a, I>(paths: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut root: Option<String> = None;
    let mut seen_any = false;
    for path in paths {
        seen_any = true;
        let normalized = normalize(path);
        let (first, remainder) = normalized.split_once('/')?;
        if remainder.is_empty() || first == ".." {
            return None;
        }
        match &root {
            Some(existing) if existing != first => return None,
            Some(_) => {}
            None => root = Some(first.to_string()),
        }
    }
    if seen_any { root } else { None }
}

/// Strip `root/` from the front of a normalised relative path.
#[must_use]
pub fn strip_root<'a>(path: &'a str, root: &str) -> &'a str {
    path.strip_prefix(root)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(path)
}

/// Extension of the final path segment, lower-cased.
#[must_use]
pub fn extension_fold(path: &str) -> Option<String> {
    let name = path.rsplit('/').next()?;
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

fn split_root(path: &str) -> (String, &str) {
    let bytes = path.as_bytes();
    // A drive needs a separator after the colon; `a:b` is a relative name.
    if bytes.len() >= 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && bytes.get(2).is_none_or(|next| *next == b'/')
    {
        let drive = &path[..2];
        return (format!("{drive}/"), &path[2..]);
    }
    if let Some(rest) = path.strip_prefix("//")
        && !rest.starts_with('/')
    {
        return ("//".to_string(), rest);
    }
    if let Some(rest) = path.strip_prefix('/') {
        return ("/".to_string(), rest);
    }
    (String::new(), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_converts_separators_and_collapses_segments() {
        assert_eq!(normalize(r"downloads\tv\.\show\..\movie\"), "downloads/tv/movie");
        assert_eq!(normalize("/data//torrents/./a/../b/"), "/data/torrents/b");
        assert_eq!(normalize("a/b/../../.."), "..");
        assert_eq!(normalize("./"), ".");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn normalize_preserves_roots() {
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("/.."), "/");
        assert_eq!(normalize("C:"), "C:/");
        assert_eq!(normalize(r"C:\"), "C:/");
        assert_eq!(normalize(r"C:\Downloads\..\..\Movies\"), "C:/Movies");
        assert_eq!(normalize("a:b/c"), "a:b/c");
        assert_eq!(normalize("a:b/../.."), "..");
        assert_eq!(common_root(["a:b/one.mkv", "a:b/two.mkv"]), Some("a:b".to_string()));
        assert_eq!(normalize(r"\\nas\share\tv"), "//nas/share/tv");
    }

    #[test]
    fn normalize_fold_is_case_insensitive() {
        assert_eq!(normalize_fold(r"D:\Media\TV"), normalize_fold("d:/media/tv/"));
    }

    #[test]
    fn common_root_requires_shared_top_level_directory() {
        assert_eq!(
            common_root(["Movie/video.mkv", "Movie/subs.srt"]),
            Some("Movie".to_string())
        );
        assert_eq!(common_root(["video.mkv", "subs.srt"]), None);
        assert_eq!(common_root(["A/video.mkv", "B/subs.srt"]), None);
        assert_eq!(common_root(["Movie/video.mkv", "extra.nfo"]), None);
        assert_eq!(common_root(Vec::<&str>::new()), None);
        assert_eq!(
            common_root([r"Show\S01\e01.mkv"]),
            Some("Show".to_string())
        );
    }

    #[test]
    fn strip_root_and_extension_helpers() {
        assert_eq!(strip_root("Movie/video.mkv", "Movie"), "video.mkv");
        assert_eq!(strip_root("video.mkv", "Movie"), "video.mkv");
        assert_eq!(extension_fold("Movie/Video.MKV"), Some("mkv".to_string()));
        assert_eq!(extension_fold(".hidden"), None);
        assert_eq!(extension_fold("README"), None);
    }
}
