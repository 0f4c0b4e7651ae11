use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Characters that may not appear in a file name on common filesystems.
const ILLEGAL_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Remove characters that cannot appear in a file name, including ASCII control characters.
pub fn strip_illegal_filename_chars(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_ascii_control() && !ILLEGAL_FILENAME_CHARS.contains(c))
        .collect()
}

/// Where the messages of one mailbox are kept on disk.
///
/// A retrieved message is written to `temp_file`, then renamed to `<uid>.eml` in `queue`.
/// Post-processing moves it on to `processed`, or to `badmail` if it cannot be decoded. A
/// message whose file is present in any of the three directories has been retrieved before.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailboxPaths {
    pub queue: PathBuf,
    pub badmail: PathBuf,
    pub processed: PathBuf,
    pub temp_file: PathBuf,
}

impl MailboxPaths {
    /// The conventional layout under `root`, creating the directories as needed.
    pub fn create(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref();
        let paths = MailboxPaths {
            queue: root.join("queue"),
            badmail: root.join("badmail"),
            processed: root.join("processed"),
            temp_file: root.join("~tmp.eml"),
        };
        for dir in [&paths.queue, &paths.badmail, &paths.processed] {
            fs::create_dir_all(dir)?;
        }
        Ok(paths)
    }

    /// The file name a message with unique id `uid` is stored under, or `None` if nothing of
    /// the id survives stripping.
    pub fn file_name(uid: &str) -> Option<String> {
        let stem = strip_illegal_filename_chars(uid);
        if stem.trim().is_empty() {
            None
        } else {
            Some(format!("{}.eml", stem))
        }
    }

    /// Whether a file named `file_name` exists in the queue, bad-mail or processed directory.
    pub fn contains(&self, file_name: &str) -> bool {
        [&self.queue, &self.badmail, &self.processed]
            .iter()
            .any(|dir| dir.join(file_name).is_file())
    }

    /// The `.eml` files waiting in the queue, in name order.
    pub fn queued_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.queue)? {
            let path = entry?.path();
            if path.is_file() && path.extension().map_or(false, |e| e == "eml") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}
