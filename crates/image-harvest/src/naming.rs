//! Destination directory and file naming.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveTime, Timelike};

/// Query text as a single path component: spaces become underscores, as do
/// path separators and characters Windows refuses in file names.
pub fn query_slug(query: &str) -> String {
    let slug: String = query
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match slug.as_str() {
        "" | "." | ".." => "_".repeat(slug.len().max(1)),
        _ => slug,
    }
}

/// `<root>/<query slug>/`
pub fn query_dir(root: &Path, query: &str) -> PathBuf {
    root.join(query_slug(query))
}

/// `<query slug>_<HHMMSS>_<index>.jpg`
pub fn image_file_name(query: &str, time: NaiveTime, index: usize) -> String {
    format!(
        "{}_{:02}{:02}{:02}_{index}.jpg",
        query_slug(query),
        time.hour(),
        time.minute(),
        time.second()
    )
}

/// How many higher indices are tried before giving up on a free name.
const MAX_NAME_ATTEMPTS: usize = 1000;

/// Reserve a destination for the `index`-th saved image, stamped with local
/// time.
///
/// The name is claimed by creating an empty file with `create_new`, so an
/// existing image is never reused. When the name is taken the index is
/// bumped until a free one is found.
pub fn claim_destination(dir: &Path, query: &str, index: usize) -> io::Result<PathBuf> {
    claim_destination_at(dir, query, Local::now().time(), index)
}

fn claim_destination_at(
    dir: &Path,
    query: &str,
    time: NaiveTime,
    index: usize,
) -> io::Result<PathBuf> {
    for candidate in index..index.saturating_add(MAX_NAME_ATTEMPTS) {
        let path = dir.join(image_file_name(query, time, candidate));
        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => return Ok(path),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                tracing::debug!("{} already exists, trying the next index", path.display());
            }
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free file name for {query:?} in {}", dir.display()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spaces_become_underscores() {
        assert_eq!(query_slug("red fox in snow"), "red_fox_in_snow");
        assert_eq!(
            query_dir(Path::new("/data/images"), "red fox"),
            PathBuf::from("/data/images/red_fox")
        );
    }

    #[test]
    fn test_slug_cannot_escape_root() {
        assert_eq!(query_slug("../etc/passwd"), ".._etc_passwd");
        assert_eq!(query_slug(".."), "__");
        assert_eq!(query_slug("a\\b:c"), "a_b_c");
        assert_eq!(query_slug("日本 語"), "日本_語");
    }

    #[test]
    fn test_file_name_format() {
        let time = NaiveTime::from_hms_opt(9, 5, 7).unwrap();
        assert_eq!(image_file_name("red fox", time, 3), "red_fox_090507_3.jpg");
    }

    #[test]
    fn test_claimed_destination_lives_in_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = claim_destination(dir.path(), "cats", 1).unwrap();
        assert_eq!(path.parent().unwrap(), dir.path());
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("cats_"));
        assert!(name.ends_with("_1.jpg"));
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_taken_name_bumps_the_index() {
        let dir = tempfile::tempdir().unwrap();
        let time = NaiveTime::from_hms_opt(21, 40, 2).unwrap();
        let existing = dir.path().join("dup_214002_1.jpg");
        fs::write(&existing, b"earlier run").unwrap();

        let first = claim_destination_at(dir.path(), "dup", time, 1).unwrap();
        assert_eq!(first, dir.path().join("dup_214002_2.jpg"));
        let second = claim_destination_at(dir.path(), "dup", time, 1).unwrap();
        assert_eq!(second, dir.path().join("dup_214002_3.jpg"));

        assert_eq!(fs::read(&existing).unwrap(), b"earlier run");
    }
}
