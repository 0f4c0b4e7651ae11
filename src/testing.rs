//! Enable the test_helpers feature to expose helper methods to build
//! response structures for testing code that uses the popfree crate.
//!
//! To use, add a dev-dependency on popfree with the feature "test_helpers",
//! e.g.
//!
//! ```toml
//! [dependencies]
//! popfree = { version = "0.1" }
//!
//! [dev-dependencies]
//! # mirror the same configuration your dependencies and add test_helpers
//! popfree = { version = "0.1", features = ["test_helpers"] }
//! ```
//!
#[cfg(doc)]
use crate::types::*;

/// Methods to build a [`Capabilities`] object
pub mod capabilities {
    use crate::types::Capabilities;

    /// Builds a [`Capabilities`] from the body of a `CAPA` reply, one capability per line.
    ///
    /// The terminating `.` line may be included or left out.
    ///
    /// ```
    /// let input = "TOP\r\nUIDL\r\nSASL PLAIN\r\n.\r\n";
    /// let capabilities = popfree::testing::capabilities::parse(input);
    /// assert!(capabilities.has("uidl"));
    /// ```
    pub fn parse(input: &str) -> Capabilities {
        Capabilities::from_lines(
            input
                .lines()
                .take_while(|line| line.trim_end() != ".")
                .map(str::to_string)
                .collect(),
        )
    }
}

/// Methods to build a [`Response`] object
pub mod responses {
    use crate::types::Response;

    /// Builds a [`Response`] from a status line.
    ///
    /// ```
    /// let response = popfree::testing::responses::parse("+OK 2 320\r\n");
    /// assert!(response.is_ok());
    /// assert_eq!(response.number::<u32>(0), Some(2));
    /// ```
    pub fn parse(input: &str) -> Response {
        Response::parse(input)
    }
}

/// Methods to build [`MessageUid`] listings
pub mod uids {
    use crate::parse::parse_uid_line;
    use crate::types::MessageUid;

    /// Builds the listing of a `UIDL` reply, skipping malformed lines.
    ///
    /// ```
    /// let uids = popfree::testing::uids::parse("1 whqtswO00WBw418f9t5JxYwZ\r\n2 QhdPYR:00WBw1Ph7x7\r\n");
    /// assert_eq!(uids.len(), 2);
    /// assert_eq!(uids[1].id, "QhdPYR:00WBw1Ph7x7");
    /// ```
    pub fn parse(input: &str) -> Vec<MessageUid> {
        input.lines().filter_map(parse_uid_line).collect()
    }
}
