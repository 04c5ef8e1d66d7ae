//! Remote path resolution rules.
//!
//! A configured remote path carries up to two pieces of information:
//! the directory chain to create/enter, and the name to store the file
//! under. A trailing `/` means the path is directories only and the
//! local file name is kept.

/// The name the file is stored under on the server.
///
/// - `"dir/"` → the local file name
/// - `"dir/name.txt"` → `"name.txt"`
/// - `"name.txt"` → `"name.txt"`
pub fn remote_file_name<'a>(remote_path: &'a str, local_name: &'a str) -> &'a str {
    if remote_path.ends_with('/') {
        return local_name;
    }
    match remote_path.rfind('/') {
        Some(idx) => &remote_path[idx + 1..],
        None => remote_path,
    }
}

/// The directory segments to create/enter, in order.
///
/// The last path element is the file name unless the path ends with
/// `/`; empty segments (leading or doubled slashes) are skipped. A
/// path without `/` names no directories at all.
pub fn directory_segments(remote_path: &str) -> Vec<&str> {
    if !remote_path.contains('/') {
        return Vec::new();
    }
    let parts: Vec<&str> = remote_path.split('/').collect();
    let last = if remote_path.ends_with('/') {
        parts.len()
    } else {
        parts.len() - 1
    };
    parts[..last]
        .iter()
        .copied()
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_keeps_the_local_name() {
        assert_eq!(remote_file_name("dir/", "x.txt"), "x.txt");
        assert_eq!(remote_file_name("a/b/c/", "x.txt"), "x.txt");
    }

    #[test]
    fn embedded_name_wins() {
        assert_eq!(remote_file_name("dir/name.txt", "x.txt"), "name.txt");
        assert_eq!(remote_file_name("/a/b/name.txt", "x.txt"), "name.txt");
    }

    #[test]
    fn bare_name_is_used_verbatim() {
        assert_eq!(remote_file_name("name.txt", "x.txt"), "name.txt");
    }

    #[test]
    fn file_paths_yield_their_directory_chain() {
        assert_eq!(directory_segments("/a/b/c.txt"), vec!["a", "b"]);
        assert_eq!(directory_segments("a/b/c.txt"), vec!["a", "b"]);
    }

    #[test]
    fn directory_only_paths_use_every_segment() {
        assert_eq!(directory_segments("/a/b/"), vec!["a", "b"]);
        assert_eq!(directory_segments("incoming/"), vec!["incoming"]);
    }

    #[test]
    fn degenerate_paths_create_nothing() {
        assert!(directory_segments("name.txt").is_empty());
        assert!(directory_segments("/name.txt").is_empty());
        assert_eq!(directory_segments("a//b//c.txt"), vec!["a", "b"]);
    }
}
