//! Slash-separated path helpers.
//!
//! Manifest paths are plain strings with `/` separators regardless of where
//! they came from, so that relpaths from different sources compare equal.

use std::path::Path;

pub fn to_slash(path: &Path) -> String {
    let s = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        s.into_owned()
    } else {
        s.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

/// Splits `dir/name` into `("dir", "name")`. A bare name has an empty directory.
pub fn split_dir_file(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some(("", name)) if path.starts_with('/') => ("/", name),
        Some((dir, name)) => (dir, name),
        None => ("", path),
    }
}

pub fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Uppercased extension without the dot. Leading dots do not start an extension.
pub fn extension(filename: &str) -> String {
    filename
        .trim_start_matches('.')
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_uppercase())
        .unwrap_or_default()
}

/// Longest common directory prefix of a set of file paths.
///
/// Only whole segments count, so `/a/bc/x` and `/a/bd/y` share `/a`, not `/a/b`.
pub fn common_root<'a, I>(paths: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut common: Option<Vec<&str>> = None;
    let mut absolute = true;

    for path in paths {
        absolute &= path.starts_with('/');
        let segments: Vec<&str> = path.split('/').collect();
        let dir = &segments[..segments.len() - 1];

        common = Some(match common {
            None => dir.to_vec(),
            Some(prefix) => prefix
                .into_iter()
                .zip(dir.iter())
                .take_while(|(a, b)| a == *b)
                .map(|(a, _)| a)
                .collect(),
        });
    }

    let Some(prefix) = common else {
        return String::new();
    };

    let root = prefix.join("/");
    if root.is_empty() && absolute {
        "/".to_string()
    } else {
        root
    }
}

/// Path relative to `root`. Paths outside the root are returned unchanged.
pub fn relative_to<'a>(path: &'a str, root: &str) -> &'a str {
    if root.is_empty() {
        return path;
    }
    if root == "/" {
        return path.trim_start_matches('/');
    }
    match path.strip_prefix(root) {
        Some(rest) if rest.starts_with('/') => &rest[1..],
        _ => path,
    }
}

pub fn segment_count(path: &str) -> usize {
    path.split('/').count()
}

/// Drops the first `n` segments. `None` when nothing would remain.
pub fn strip_leading_segments(path: &str, n: usize) -> Option<&str> {
    let mut rest = path;
    for _ in 0..n {
        rest = rest.split_once('/')?.1;
    }
    Some(rest)
}
