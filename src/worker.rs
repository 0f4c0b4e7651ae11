//! Extraction of stored messages to disk.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{Error, Result};
use crate::mailbox::{strip_illegal_filename_chars, MailboxPaths};
use crate::mime::{ContentType, ExtensionMap, MimeParser, ParsedMessage};
use crate::utils::iter_join;

/// Warning emitted when a message's extraction directory exists already.
pub const PREVIOUSLY_EXTRACTED: &str = "Message previously extracted. Continuing.";

/// Notifications about the processing of one message file. Every method does nothing by
/// default.
pub trait ProcessingEvents {
    fn begin_processing(&self, _file: &Path) {}
    fn done_processing(&self, _file: &Path) {}
    /// The file could not be processed and was set aside.
    fn processing_error(&self, _file: &Path, _error: &Error) {}
    fn processing_warning(&self, _file: &Path, _message: &str) {}
}

impl ProcessingEvents for () {}

impl<T: ProcessingEvents + ?Sized> ProcessingEvents for &T {
    fn begin_processing(&self, file: &Path) {
        (**self).begin_processing(file)
    }

    fn done_processing(&self, file: &Path) {
        (**self).done_processing(file)
    }

    fn processing_error(&self, file: &Path, error: &Error) {
        (**self).processing_error(file, error)
    }

    fn processing_warning(&self, file: &Path, message: &str) {
        (**self).processing_warning(file, message)
    }
}

/// Decodes `.eml` files from the queue and writes their parts under
/// [`MailboxPaths::processed`].
///
/// The parts of `processed/<stem>.eml` end up in `processed/<stem>/`:
/// - `parsed-headers.txt`, one `Name: value` line per header;
/// - every alternate view, or `body.txt` / `body.html` for a single-part message;
/// - every attachment.
///
/// A file that fails to decode is moved to [`MailboxPaths::badmail`] instead.
#[derive(Clone, Debug)]
pub struct MimeFileWorker {
    paths: MailboxPaths,
    parser: MimeParser,
    extensions: ExtensionMap,
}

impl MimeFileWorker {
    pub fn new(paths: MailboxPaths, parser: MimeParser, extensions: ExtensionMap) -> Self {
        MimeFileWorker {
            paths,
            parser,
            extensions,
        }
    }

    pub fn paths(&self) -> &MailboxPaths {
        &self.paths
    }

    /// Process one message file, reporting progress to `events`.
    ///
    /// Failures are reported through [`ProcessingEvents::processing_error`], never returned.
    pub fn process<E: ProcessingEvents + ?Sized>(&self, file: &Path, events: &E) {
        events.begin_processing(file);
        if let Err(e) = self.extract(file, events) {
            events.processing_error(file, &e);
            if file.parent() == Some(self.paths.queue.as_path()) {
                if let Err(e) = self.move_into(file, &self.paths.badmail) {
                    events.processing_error(file, &e);
                }
            }
        }
        events.done_processing(file);
    }

    fn extract<E: ProcessingEvents + ?Sized>(&self, file: &Path, events: &E) -> Result<()> {
        let message = self.parser.parse_complete(BufReader::new(File::open(file)?))?;

        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let target = self.paths.processed.join(stem);
        if target.exists() {
            events.processing_warning(file, PREVIOUSLY_EXTRACTED);
        } else {
            fs::create_dir_all(&target)?;
            self.write_parts(&message, &target)?;
        }

        if file.parent() != Some(self.paths.processed.as_path()) {
            self.move_into(file, &self.paths.processed)?;
        }
        Ok(())
    }

    fn write_parts(&self, message: &ParsedMessage, dir: &Path) -> Result<()> {
        let mut headers = String::new();
        for (name, values) in message.headers().iter() {
            headers.push_str(name);
            headers.push_str(": ");
            headers.push_str(&iter_join(values, ","));
            headers.push_str("\r\n");
        }
        fs::write(dir.join("parsed-headers.txt"), headers)?;

        if message.alternate_views().is_empty() {
            if let Some(body) = message.body() {
                let name = if message.is_html() { "body.html" } else { "body.txt" };
                fs::write(dir.join(name), body)?;
            }
        }
        for view in message.alternate_views() {
            let path = self.part_path(dir, view.content_type(), "alternate-view");
            fs::write(path, view.text())?;
        }
        for attachment in message.attachments() {
            let path = self.part_path(dir, attachment.content_type(), "attachment");
            fs::write(path, attachment.data())?;
        }
        debug!(
            "extracted {} view(s) and {} attachment(s) to {}",
            message.alternate_views().len(),
            message.attachments().len(),
            dir.display()
        );
        Ok(())
    }

    /// A fresh path in `dir` for a part, named after the part if it has a usable name.
    fn part_path(&self, dir: &Path, content_type: &ContentType, fallback: &str) -> PathBuf {
        let name = content_type
            .name()
            .map(strip_illegal_filename_chars)
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| {
                let extension = self.extensions.extension(content_type.media_type());
                let stem = if extension == "eml" {
                    "attached-message"
                } else {
                    fallback
                };
                format!("{}.{}", stem, extension)
            });
        unique_path(dir, &name)
    }

    fn move_into(&self, file: &Path, dir: &Path) -> Result<PathBuf> {
        let name = file.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a file", file.display()),
            )
        })?;
        let target = dir.join(name);
        fs::rename(file, &target)?;
        debug!("moved {} to {}", file.display(), target.display());
        Ok(target)
    }
}

/// `dir/name`, or `dir/stem (i).ext` for the first `i` that is not taken.
fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, extension) = match name.rfind('.') {
        Some(i) if i > 0 => name.split_at(i),
        _ => (name, ""),
    };
    (1..)
        .map(|i| dir.join(format!("{} ({}){}", stem, i, extension)))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl ProcessingEvents for Recorder {
        fn begin_processing(&self, _file: &Path) {
            self.0.lock().unwrap().push("begin".to_string());
        }

        fn done_processing(&self, _file: &Path) {
            self.0.lock().unwrap().push("done".to_string());
        }

        fn processing_error(&self, _file: &Path, _error: &Error) {
            self.0.lock().unwrap().push("error".to_string());
        }

        fn processing_warning(&self, _file: &Path, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    fn worker(root: &Path) -> MimeFileWorker {
        MimeFileWorker::new(
            MailboxPaths::create(root).unwrap(),
            MimeParser::new(),
            ExtensionMap::standard(),
        )
    }

    #[test]
    fn unique_names() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(unique_path(dir.path(), "a.txt"), dir.path().join("a.txt"));
        fs::write(dir.path().join("a.txt"), "").unwrap();
        fs::write(dir.path().join("a (1).txt"), "").unwrap();
        assert_eq!(unique_path(dir.path(), "a.txt"), dir.path().join("a (2).txt"));
        fs::write(dir.path().join("noext"), "").unwrap();
        assert_eq!(unique_path(dir.path(), "noext"), dir.path().join("noext (1)"));
    }

    #[test]
    fn extracts_simple_message() {
        let root = tempfile::tempdir().unwrap();
        let worker = worker(root.path());
        let file = worker.paths().queue.join("m1.eml");
        fs::write(
            &file,
            "Subject: hello\r\nTo: a@example.com\r\nTo: b@example.com\r\n\r\nbody text\r\n",
        )
        .unwrap();
        let recorder = Recorder::default();

        worker.process(&file, &recorder);

        let dir = worker.paths().processed.join("m1");
        assert_eq!(
            fs::read_to_string(dir.join("parsed-headers.txt")).unwrap(),
            "Subject: hello\r\nTo: a@example.com,b@example.com\r\n"
        );
        assert_eq!(fs::read_to_string(dir.join("body.txt")).unwrap(), "body text\r\n");
        assert!(!file.exists());
        assert!(worker.paths().processed.join("m1.eml").is_file());
        assert_eq!(*recorder.0.lock().unwrap(), vec!["begin", "done"]);
    }

    #[test]
    fn attachments_get_unique_names() {
        let root = tempfile::tempdir().unwrap();
        let worker = worker(root.path());
        let file = worker.paths().queue.join("m2.eml");
        fs::write(
            &file,
            concat!(
                "Content-Type: multipart/mixed; boundary=B\r\n\r\n",
                "--B\r\nContent-Type: application/pdf; name=\"a/b.pdf\"\r\n\r\none\r\n",
                "--B\r\nContent-Type: application/pdf; name=ab.pdf\r\n\r\ntwo\r\n",
                "--B\r\nContent-Type: message/rfc822\r\n\r\nSubject: inner\r\n",
                "--B\r\nContent-Type: text/html\r\n\r\n<p>x</p>\r\n",
                "--B--\r\n",
            ),
        )
        .unwrap();

        worker.process(&file, &());

        let dir = worker.paths().processed.join("m2");
        assert_eq!(fs::read(dir.join("ab.pdf")).unwrap(), b"one\r\n");
        assert_eq!(fs::read(dir.join("ab (1).pdf")).unwrap(), b"two\r\n");
        assert!(dir.join("attached-message.eml").is_file());
        assert_eq!(
            fs::read_to_string(dir.join("alternate-view.html")).unwrap(),
            "<p>x</p>\r\n"
        );
        assert!(!dir.join("body.txt").exists());
    }

    #[test]
    fn dot_lines_in_stored_files_are_content() {
        let root = tempfile::tempdir().unwrap();
        let worker = worker(root.path());
        let file = worker.paths().queue.join("m4.eml");
        fs::write(
            &file,
            concat!(
                "Content-Type: multipart/mixed; boundary=B\r\n\r\n",
                "--B\r\nContent-Type: text/plain\r\n\r\nsee below\r\n.\r\nmore text\r\n",
                "--B\r\nContent-Type: application/pdf; name=report.pdf\r\n\r\n%PDF\r\n",
                "--B--\r\n",
            ),
        )
        .unwrap();
        let recorder = Recorder::default();

        worker.process(&file, &recorder);

        let dir = worker.paths().processed.join("m4");
        assert_eq!(
            fs::read_to_string(dir.join("alternate-view.txt")).unwrap(),
            "see below\r\n.\r\nmore text\r\n"
        );
        assert_eq!(fs::read(dir.join("report.pdf")).unwrap(), b"%PDF\r\n");
        assert_eq!(*recorder.0.lock().unwrap(), vec!["begin", "done"]);
    }

    #[test]
    fn undecodable_message_goes_to_badmail() {
        let root = tempfile::tempdir().unwrap();
        let worker = worker(root.path());
        let file = worker.paths().queue.join("bad.eml");
        fs::write(&file, "\r\nno headers here\r\n").unwrap();
        let recorder = Recorder::default();

        worker.process(&file, &recorder);

        assert!(worker.paths().badmail.join("bad.eml").is_file());
        assert!(!worker.paths().processed.join("bad").exists());
        assert_eq!(*recorder.0.lock().unwrap(), vec!["begin", "error", "done"]);
    }

    #[test]
    fn previously_extracted_is_not_rewritten() {
        let root = tempfile::tempdir().unwrap();
        let worker = worker(root.path());
        let file = worker.paths().queue.join("m3.eml");
        fs::write(&file, "Subject: again\r\n\r\nbody\r\n").unwrap();
        fs::create_dir(worker.paths().processed.join("m3")).unwrap();
        let recorder = Recorder::default();

        worker.process(&file, &recorder);

        assert!(!worker.paths().processed.join("m3").join("body.txt").exists());
        assert!(worker.paths().processed.join("m3.eml").is_file());
        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec!["begin", PREVIOUSLY_EXTRACTED, "done"]
        );
    }
}
