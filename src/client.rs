use std::borrow::Cow;
use std::cmp::min;
use std::fmt;
use std::io::{self, BufRead, Read, Write};
use std::time::Duration;

use bufstream::BufStream;
use log::{debug, trace};

use super::authenticator::{apop_digest, is_lock_message, AuthMethod, Credentials};
use super::conn::Transport;
use super::error::{Error, ParseError, Result, ValidateError};
use super::mime::{HeaderTable, MimeParser, ParsedMessage};
use super::parse::{parse_apop_timestamp, parse_size_line, parse_uid_line};
use super::types::*;

const CR: u8 = 0x0d;
const LF: u8 = 0x0a;
const QUIT_TIMEOUT: Duration = Duration::from_millis(500);

fn validate_str(value: &str) -> Result<&str> {
    if value.contains('\n') {
        return Err(Error::Validate(ValidateError('\n')));
    }
    if value.contains('\r') {
        return Err(Error::Validate(ValidateError('\r')));
    }
    Ok(value)
}

fn not_connected() -> Error {
    Error::ConnectionState("not connected".to_string())
}

fn trim_crlf(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

// Secrets never reach the wire trace.
fn redact(line: &[u8]) -> Cow<'_, str> {
    let text = String::from_utf8_lossy(line);
    let verb = text.get(..5).unwrap_or("");
    if verb.eq_ignore_ascii_case("PASS ") {
        return Cow::Borrowed("PASS ****");
    }
    if verb.eq_ignore_ascii_case("APOP ") {
        if let Some(user) = text.split_whitespace().nth(1) {
            return Cow::Owned(format!("APOP {} ****", user));
        }
    }
    text
}

/// Stream to interface with the POP3 server.
///
/// A client drives exactly one mailbox session. Commands are strictly sequential: every method
/// sends one command and reads its complete reply before returning, apart from
/// [`retrieve`](Client::retrieve), whose reply is consumed through the returned
/// [`MessageReader`].
///
/// Dropping a client that is still open sends `QUIT`, which commits any pending deletions.
pub struct Client<T: Read + Write> {
    stream: Option<BufStream<T>>,
    state: ConnectionState,
    apop_timestamp: Option<String>,
}

impl<T: Read + Write> fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state)
            .field("apop_timestamp", &self.apop_timestamp)
            .finish()
    }
}

impl<T: Read + Write> Client<T> {
    /// Creates a new client over the given, already connected, stream.
    ///
    /// The server greeting has not been read yet; call [`read_greeting`](Client::read_greeting)
    /// before anything else. [`ClientBuilder`](crate::ClientBuilder) does both for you.
    pub fn new(stream: T) -> Client<T> {
        Client {
            stream: Some(BufStream::new(stream)),
            state: ConnectionState::Connected,
            apop_timestamp: None,
        }
    }

    /// Where this session currently is.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The timestamp token from the server greeting, if it offered one.
    pub fn apop_timestamp(&self) -> Option<&str> {
        self.apop_timestamp.as_deref()
    }

    pub(crate) fn mark_tls(&mut self) {
        if self.state == ConnectionState::Connected {
            self.state = ConnectionState::TlsNegotiated;
        }
    }

    pub(crate) fn take_apop_timestamp(&mut self) -> Option<String> {
        self.apop_timestamp.take()
    }

    pub(crate) fn set_apop_timestamp(&mut self, timestamp: Option<String>) {
        self.apop_timestamp = timestamp;
    }

    /// Read the server greeting and remember its APOP timestamp.
    pub fn read_greeting(&mut self) -> Result<Response> {
        let greeting = self.read_response()?;
        if !greeting.is_ok() {
            return Err(Error::ServerResponse(greeting.raw().to_string()));
        }
        self.apop_timestamp = parse_apop_timestamp(greeting.raw());
        debug!(
            "greeting received, APOP {}",
            if self.apop_timestamp.is_some() {
                "available"
            } else {
                "unavailable"
            }
        );
        Ok(greeting)
    }

    /// Authenticate with the server using the mechanism selected in `credentials`.
    ///
    /// [`AuthMethod::Auto`] uses `APOP` only when the greeting carried a timestamp.
    ///
    /// A rejected password is reported as [`Error::MailboxLocked`] when the server says the
    /// maildrop is locked, and as [`Error::Authentication`] otherwise.
    pub fn authenticate(&mut self, credentials: &Credentials) -> Result<()> {
        if !self.state.is_open() {
            return Err(not_connected());
        }
        if self.state == ConnectionState::Authenticated {
            return Err(Error::ConnectionState("already authenticated".to_string()));
        }
        if credentials.username.is_empty() || credentials.password.is_empty() {
            return Err(Error::ConnectionState(
                "username and password must be set before authenticating".to_string(),
            ));
        }

        let use_apop = match credentials.method {
            AuthMethod::UserPass => false,
            AuthMethod::Apop => true,
            AuthMethod::Auto => self.apop_timestamp.is_some(),
        };
        if use_apop {
            self.apop(&credentials.username, &credentials.password)
        } else {
            self.login(&credentials.username, &credentials.password)
        }
    }

    /// Log in with `USER` and `PASS`.
    pub fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let user = self.run_command(&format!("USER {}", validate_str(username)?))?;
        if !user.is_ok() {
            return Err(Error::Authentication(user.raw().to_string()));
        }
        let pass = self.run_command(&format!("PASS {}", validate_str(password)?))?;
        self.finish_authentication(pass)
    }

    /// Log in with `APOP`. Fails if the greeting did not include a timestamp.
    pub fn apop(&mut self, username: &str, password: &str) -> Result<()> {
        let timestamp = self.apop_timestamp.clone().ok_or_else(|| {
            Error::Authentication("server greeting did not offer an APOP timestamp".to_string())
        })?;
        let digest = apop_digest(&timestamp, password)?;
        let reply = self.run_command(&format!("APOP {} {}", validate_str(username)?, digest))?;
        self.finish_authentication(reply)
    }

    fn finish_authentication(&mut self, reply: Response) -> Result<()> {
        if reply.is_ok() {
            self.state = ConnectionState::Authenticated;
            Ok(())
        } else if is_lock_message(reply.raw()) {
            Err(Error::MailboxLocked(reply.raw().to_string()))
        } else {
            Err(Error::Authentication(reply.raw().to_string()))
        }
    }

    /// Number of messages in the maildrop and their total size.
    pub fn stat(&mut self) -> Result<Stat> {
        let reply = self.run_command_and_check_ok("STAT")?;
        match (reply.number(0), reply.number(1)) {
            (Some(count), Some(size)) => Ok(Stat { count, size }),
            _ => Err(ParseError::Response(reply.raw().to_string()).into()),
        }
    }

    /// The size of every message in the maildrop.
    pub fn list(&mut self) -> Result<Vec<MessageSize>> {
        self.run_command_and_check_ok("LIST")?;
        self.read_multiline()?
            .into_iter()
            .map(|line| parse_size_line(&line).ok_or_else(|| ParseError::Listing(line).into()))
            .collect()
    }

    /// The unique id of every message in the maildrop, in server order.
    pub fn list_uids(&mut self) -> Result<Vec<MessageUid>> {
        self.run_command_and_check_ok("UIDL")?;
        self.read_multiline()?
            .into_iter()
            .map(|line| parse_uid_line(&line).ok_or_else(|| ParseError::Listing(line).into()))
            .collect()
    }

    /// The unique id of one message.
    pub fn uid(&mut self, number: MessageNumber) -> Result<MessageUid> {
        let reply = self.run_command_and_check_ok(&format!("UIDL {}", number))?;
        parse_uid_line(&reply.params().join(" "))
            .ok_or_else(|| ParseError::Response(reply.raw().to_string()).into())
    }

    /// The capabilities advertised through `CAPA`.
    ///
    /// A server that does not understand `CAPA` yields an empty set rather than an error.
    pub fn capabilities(&mut self) -> Result<Capabilities> {
        let reply = self.run_command("CAPA")?;
        if !reply.is_ok() {
            debug!("server does not support CAPA: {}", reply);
            return Ok(Capabilities::default());
        }
        Ok(Capabilities::from_lines(self.read_multiline()?))
    }

    /// Mark a message as deleted. The server removes it once the session ends with `QUIT`.
    ///
    /// A `-ERR` reply is returned rather than turned into an error.
    pub fn delete(&mut self, number: MessageNumber) -> Result<Response> {
        self.run_command(&format!("DELE {}", number))
    }

    /// Does nothing, but keeps the session alive.
    pub fn noop(&mut self) -> Result<()> {
        self.run_command_and_check_ok("NOOP").map(|_| ())
    }

    /// Unmark all messages marked as deleted in this session.
    pub fn reset(&mut self) -> Result<()> {
        self.run_command_and_check_ok("RSET").map(|_| ())
    }

    /// Start retrieving a message with `RETR`, or only its header block with `TOP n 0`.
    ///
    /// The returned reader yields the message with dot-stuffing undone and reports end of
    /// stream at the terminating `.` line. The session cannot be used until it is dropped;
    /// dropping it early reads and discards the rest of the message.
    pub fn retrieve(
        &mut self,
        number: MessageNumber,
        header_only: bool,
    ) -> Result<MessageReader<'_, T>> {
        let command = if header_only {
            format!("TOP {} 0", number)
        } else {
            format!("RETR {}", number)
        };
        self.run_command_and_check_ok(&command)?;
        Ok(MessageReader::new(self))
    }

    /// Copy a message into `out`, returning the number of bytes written.
    pub fn write_message_to<W: Write>(
        &mut self,
        number: MessageNumber,
        header_only: bool,
        out: &mut W,
    ) -> Result<u64> {
        let mut reader = self.retrieve(number, header_only)?;
        Ok(io::copy(&mut reader, out)?)
    }

    /// Retrieve and decode a message.
    pub fn message(&mut self, number: MessageNumber, parser: &MimeParser) -> Result<ParsedMessage> {
        let reader = self.retrieve(number, false)?;
        parser.parse_complete(reader)
    }

    /// Retrieve and decode only the header block of a message.
    pub fn message_headers(
        &mut self,
        number: MessageNumber,
        parser: &MimeParser,
    ) -> Result<HeaderTable> {
        let reader = self.retrieve(number, true)?;
        parser.parse_headers_complete(reader)
    }

    /// End the session with `QUIT`, committing deletions, and drop the transport.
    pub fn quit(&mut self) -> Result<()> {
        let reply = self.run_command("QUIT");
        self.stream = None;
        self.state = ConnectionState::Closed;
        reply.map(|_| ())
    }

    /// Give up the client and return the underlying transport without ending the session.
    pub fn into_inner(mut self) -> Result<T> {
        let stream = self.stream.take().ok_or_else(not_connected)?;
        self.state = ConnectionState::Closed;
        Ok(stream.into_inner()?)
    }

    /// Runs a command and fails with [`Error::ServerResponse`] unless the reply is `+OK`.
    pub fn run_command_and_check_ok(&mut self, command: &str) -> Result<Response> {
        let reply = self.run_command(command)?;
        if reply.is_ok() {
            Ok(reply)
        } else {
            Err(Error::ServerResponse(reply.raw().to_string()))
        }
    }

    /// Runs any command passed to it and returns the status line of the reply.
    pub fn run_command(&mut self, command: &str) -> Result<Response> {
        self.write_line(command.as_bytes())?;
        self.read_response()
    }

    /// Reads the body of a multi-line reply, up to and excluding the terminating `.` line.
    pub fn read_multiline(&mut self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        loop {
            let mut v = Vec::new();
            self.readline(&mut v)?;
            let line = trim_crlf(&v);
            if line == b"." {
                break;
            }
            let line = line.strip_prefix(b".").unwrap_or(line);
            lines.push(String::from_utf8_lossy(line).into_owned());
        }
        Ok(lines)
    }

    fn read_response(&mut self) -> Result<Response> {
        let mut v = Vec::new();
        self.readline(&mut v)?;
        Ok(Response::parse(&String::from_utf8_lossy(&v)))
    }

    pub(crate) fn readline(&mut self, into: &mut Vec<u8>) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        let start = into.len();
        let read = stream.read_until(LF, into)?;
        if read == 0 {
            return Err(Error::ConnectionLost);
        }
        trace!("S: {}", String::from_utf8_lossy(trim_crlf(&into[start..])));
        Ok(read)
    }

    fn write_line(&mut self, buf: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        stream.write_all(buf)?;
        stream.write_all(&[CR, LF])?;
        stream.flush()?;
        trace!("C: {}", redact(buf));
        Ok(())
    }
}

impl<T: Read + Write + Transport> Client<T> {
    /// Change the read and write timeout of the transport.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        Ok(stream.get_mut().set_timeout(timeout)?)
    }

    /// Best-effort `QUIT` followed by tearing down the transport.
    ///
    /// Failures are swallowed. Calling this more than once is harmless.
    pub fn disconnect(&mut self) {
        if let Some(stream) = self.stream.as_mut() {
            let _ = stream.get_mut().set_timeout(Some(QUIT_TIMEOUT));
            if let Err(e) = self.run_command("QUIT") {
                debug!("QUIT failed: {}", e);
            }
        }
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.get_mut().shutdown();
        }
        self.state = ConnectionState::Closed;
    }
}

impl<T: Read + Write> Drop for Client<T> {
    fn drop(&mut self) {
        if self.stream.is_some() {
            let _ = self.quit();
        }
    }
}

/// Reader over a message being retrieved with `RETR` or `TOP`.
///
/// Returned by [`Client::retrieve`]. Lines are passed through with their original line
/// terminators; only byte-stuffed leading dots are removed.
pub struct MessageReader<'a, T: Read + Write> {
    client: &'a mut Client<T>,
    line: Vec<u8>,
    pos: usize,
    done: bool,
}

impl<'a, T: Read + Write> MessageReader<'a, T> {
    fn new(client: &'a mut Client<T>) -> Self {
        MessageReader {
            client,
            line: Vec::new(),
            pos: 0,
            done: false,
        }
    }

    /// Read and discard the rest of the message.
    pub fn drain(&mut self) -> Result<()> {
        while !self.done {
            self.next_line()?;
        }
        Ok(())
    }

    fn next_line(&mut self) -> Result<()> {
        self.line.clear();
        self.pos = 0;
        self.client.readline(&mut self.line)?;
        let content = trim_crlf(&self.line);
        if content == b"." {
            self.done = true;
            self.line.clear();
        } else if content.starts_with(b"..") {
            self.line.remove(0);
        }
        Ok(())
    }
}

impl<'a, T: Read + Write> BufRead for MessageReader<'a, T> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.line.len() && !self.done {
            self.next_line()?;
        }
        Ok(&self.line[self.pos..])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = min(self.pos + amt, self.line.len());
    }
}

impl<'a, T: Read + Write> Read for MessageReader<'a, T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = min(buf.len(), available.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl<'a, T: Read + Write> Drop for MessageReader<'a, T> {
    fn drop(&mut self) {
        if !self.done {
            if let Err(e) = self.drain() {
                debug!("failed to drain message: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::mock_stream::MockStream;
    use super::*;

    const RFC_GREETING: &str = "+OK POP3 server ready <1896.697170952@dbc.mtview.ca.us>\r\n";

    #[test]
    fn read_greeting() {
        let mock_stream = MockStream::new(RFC_GREETING);
        let mut client = Client::new(mock_stream);
        let greeting = client.read_greeting().unwrap();
        assert!(greeting.is_ok());
        assert_eq!(
            client.apop_timestamp(),
            Some("<1896.697170952@dbc.mtview.ca.us>")
        );
        assert_eq!(client.state(), ConnectionState::Connected);
    }

    #[test]
    fn read_greeting_without_timestamp() {
        let mock_stream = MockStream::new("+OK Dovecot ready.\r\n");
        let mut client = Client::new(mock_stream);
        client.read_greeting().unwrap();
        assert_eq!(client.apop_timestamp(), None);
    }

    #[test]
    fn read_greeting_err() {
        let mock_stream = MockStream::new("-ERR too many connections\r\n");
        let mut client = Client::new(mock_stream);
        match client.read_greeting() {
            Err(Error::ServerResponse(raw)) => assert_eq!(raw, "-ERR too many connections"),
            r => panic!("unexpected {:?}", r),
        }
    }

    #[test]
    fn readline_delay_read() {
        let greeting = "+OK ready\r\n";
        let mock_stream = MockStream::default()
            .with_buf(greeting.as_bytes().to_vec())
            .with_delay();
        let mut client = Client::new(mock_stream);
        let mut v = Vec::new();
        client.readline(&mut v).unwrap();
        assert_eq!(String::from_utf8(v).unwrap(), greeting);
    }

    #[test]
    fn readline_eof() {
        let mock_stream = MockStream::default().with_eof();
        let mut client = Client::new(mock_stream);
        let mut v = Vec::new();
        if let Err(Error::ConnectionLost) = client.readline(&mut v) {
        } else {
            unreachable!("EOF read did not return connection lost");
        }
    }

    #[test]
    fn readline_err() {
        let mock_stream = MockStream::default().with_err();
        let mut client = Client::new(mock_stream);
        let mut v = Vec::new();
        assert!(matches!(client.readline(&mut v), Err(Error::Io(_))));
    }

    #[test]
    fn readline_timeout() {
        let mock_stream = MockStream::default().with_timeout();
        let mut client = Client::new(mock_stream);
        let mut v = Vec::new();
        let err = client.readline(&mut v).unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn login() {
        let mock_stream = MockStream::new("+OK\r\n+OK maildrop has 2 messages\r\n");
        let sent = mock_stream.transcript();
        let mut client = Client::new(mock_stream);
        client.login("mrose", "tanstaaf").unwrap();
        assert_eq!(sent.text(), "USER mrose\r\nPASS tanstaaf\r\n");
        assert_eq!(client.state(), ConnectionState::Authenticated);
    }

    #[test]
    fn login_rejected_user() {
        let mock_stream = MockStream::new("-ERR never heard of mailbox\r\n");
        let sent = mock_stream.transcript();
        let mut client = Client::new(mock_stream);
        assert!(matches!(
            client.login("nobody", "x"),
            Err(Error::Authentication(_))
        ));
        assert_eq!(sent.text(), "USER nobody\r\n");
    }

    #[test]
    fn login_locked() {
        let mock_stream = MockStream::new("+OK\r\n-ERR [IN-USE] unable to LOCK maildrop\r\n");
        let mut client = Client::new(mock_stream);
        match client.login("mrose", "tanstaaf") {
            Err(Error::MailboxLocked(raw)) => assert!(raw.contains("LOCK")),
            r => panic!("unexpected {:?}", r),
        }
        assert_eq!(client.state(), ConnectionState::Connected);
    }

    #[test]
    fn login_bad_password() {
        let mock_stream = MockStream::new("+OK\r\n-ERR invalid password\r\n");
        let mut client = Client::new(mock_stream);
        assert!(matches!(
            client.login("mrose", "wrong"),
            Err(Error::Authentication(_))
        ));
    }

    #[test]
    fn login_rejects_line_breaks() {
        let mock_stream = MockStream::new("+OK\r\n");
        let sent = mock_stream.transcript();
        let mut client = Client::new(mock_stream);
        assert!(matches!(
            client.login("mrose\r\nDELE 1", "x"),
            Err(Error::Validate(ValidateError('\n')))
        ));
        assert_eq!(sent.text(), "");
    }

    #[test]
    fn authenticate_apop() {
        let response = format!("{}+OK mrose's maildrop has 2 messages\r\n", RFC_GREETING);
        let mock_stream = MockStream::new(response);
        let sent = mock_stream.transcript();
        let mut client = Client::new(mock_stream);
        client.read_greeting().unwrap();
        client
            .authenticate(&Credentials::new("mrose", "tanstaaf"))
            .unwrap();
        assert_eq!(
            sent.text(),
            "APOP mrose c4c9334bac560ecc979e58001b3e22fb\r\n"
        );
        assert_eq!(client.state(), ConnectionState::Authenticated);
    }

    #[test]
    fn authenticate_auto_falls_back_to_user_pass() {
        let mock_stream = MockStream::new("+OK ready\r\n+OK\r\n+OK\r\n");
        let sent = mock_stream.transcript();
        let mut client = Client::new(mock_stream);
        client.read_greeting().unwrap();
        client
            .authenticate(&Credentials::new("mrose", "tanstaaf"))
            .unwrap();
        assert_eq!(sent.text(), "USER mrose\r\nPASS tanstaaf\r\n");
    }

    #[test]
    fn authenticate_user_pass_ignores_timestamp() {
        let response = format!("{}+OK\r\n+OK\r\n", RFC_GREETING);
        let mock_stream = MockStream::new(response);
        let sent = mock_stream.transcript();
        let mut client = Client::new(mock_stream);
        client.read_greeting().unwrap();
        client
            .authenticate(&Credentials::new("mrose", "tanstaaf").method(AuthMethod::UserPass))
            .unwrap();
        assert!(sent.text().starts_with("USER mrose\r\n"));
    }

    #[test]
    fn authenticate_apop_locked() {
        let response = format!("{}-ERR maildrop already locked\r\n", RFC_GREETING);
        let mut client = Client::new(MockStream::new(response));
        client.read_greeting().unwrap();
        assert!(matches!(
            client.authenticate(&Credentials::new("mrose", "tanstaaf").method(AuthMethod::Apop)),
            Err(Error::MailboxLocked(_))
        ));
    }

    #[test]
    fn authenticate_apop_without_timestamp() {
        let mut client = Client::new(MockStream::new("+OK ready\r\n"));
        client.read_greeting().unwrap();
        assert!(matches!(
            client.authenticate(&Credentials::new("mrose", "tanstaaf").method(AuthMethod::Apop)),
            Err(Error::Authentication(_))
        ));
    }

    #[test]
    fn authenticate_requires_credentials() {
        let mock_stream = MockStream::new("+OK ready\r\n");
        let sent = mock_stream.transcript();
        let mut client = Client::new(mock_stream);
        client.read_greeting().unwrap();
        assert!(matches!(
            client.authenticate(&Credentials::new("mrose", "")),
            Err(Error::ConnectionState(_))
        ));
        assert_eq!(sent.text(), "");
    }

    #[test]
    fn authenticate_twice() {
        let mut client = Client::new(MockStream::new("+OK\r\n+OK\r\n"));
        client.login("mrose", "tanstaaf").unwrap();
        assert!(matches!(
            client.authenticate(&Credentials::new("mrose", "tanstaaf")),
            Err(Error::ConnectionState(_))
        ));
    }

    #[test]
    fn stat() {
        let mock_stream = MockStream::new("+OK 2 320\r\n");
        let sent = mock_stream.transcript();
        let mut client = Client::new(mock_stream);
        assert_eq!(client.stat().unwrap(), Stat { count: 2, size: 320 });
        assert_eq!(sent.text(), "STAT\r\n");
    }

    #[test]
    fn stat_err() {
        let mut client = Client::new(MockStream::new("-ERR not now\r\n"));
        assert!(matches!(client.stat(), Err(Error::ServerResponse(_))));
    }

    #[test]
    fn stat_malformed() {
        let mut client = Client::new(MockStream::new("+OK lots\r\n"));
        assert!(matches!(
            client.stat(),
            Err(Error::Parse(ParseError::Response(_)))
        ));
    }

    #[test]
    fn list_uids() {
        let response = "+OK\r\n\
                        1 whqtswO00WBw418f9t5JxYwZ\r\n\
                        2 QhdPYR:00WBw1Ph7x7\r\n\
                        .\r\n";
        let mock_stream = MockStream::new(response);
        let sent = mock_stream.transcript();
        let mut client = Client::new(mock_stream);
        let uids = client.list_uids().unwrap();
        assert_eq!(sent.text(), "UIDL\r\n");
        assert_eq!(
            uids,
            vec![
                MessageUid {
                    number: 1,
                    id: "whqtswO00WBw418f9t5JxYwZ".to_string()
                },
                MessageUid {
                    number: 2,
                    id: "QhdPYR:00WBw1Ph7x7".to_string()
                },
            ]
        );
    }

    #[test]
    fn list_uids_empty() {
        let mut client = Client::new(MockStream::new("+OK\r\n.\r\n"));
        assert!(client.list_uids().unwrap().is_empty());
    }

    #[test]
    fn list_uids_malformed() {
        let mut client = Client::new(MockStream::new("+OK\r\n1 abc\r\nbogus\r\n.\r\n+OK\r\n"));
        match client.list_uids() {
            Err(Error::Parse(ParseError::Listing(line))) => assert_eq!(line, "bogus"),
            r => panic!("unexpected result {:?}", r),
        }
        // the whole listing was consumed
        client.noop().unwrap();
    }

    #[test]
    fn list_malformed() {
        let mut client = Client::new(MockStream::new("+OK\r\n1 120\r\n2 big\r\n.\r\n"));
        assert!(matches!(
            client.list(),
            Err(Error::Parse(ParseError::Listing(_)))
        ));
    }

    #[test]
    fn single_uid() {
        let mock_stream = MockStream::new("+OK 2 QhdPYR:00WBw1Ph7x7\r\n");
        let sent = mock_stream.transcript();
        let mut client = Client::new(mock_stream);
        let uid = client.uid(2).unwrap();
        assert_eq!(sent.text(), "UIDL 2\r\n");
        assert_eq!(uid.id, "QhdPYR:00WBw1Ph7x7");
    }

    #[test]
    fn list() {
        let mut client = Client::new(MockStream::new("+OK 2 messages\r\n1 120\r\n2 200\r\n.\r\n"));
        let sizes = client.list().unwrap();
        assert_eq!(
            sizes,
            vec![
                MessageSize {
                    number: 1,
                    size: 120
                },
                MessageSize {
                    number: 2,
                    size: 200
                }
            ]
        );
    }

    #[test]
    fn capability() {
        let response = "+OK Capability list follows\r\n\
                        TOP\r\n\
                        USER\r\n\
                        uidl\r\n\
                        .\r\n";
        let mock_stream = MockStream::new(response);
        let sent = mock_stream.transcript();
        let mut client = Client::new(mock_stream);
        let capabilities = client.capabilities().unwrap();
        assert_eq!(sent.text(), "CAPA\r\n");
        assert_eq!(capabilities.len(), 3);
        assert!(capabilities.has("UIDL"));
    }

    #[test]
    fn capability_unsupported() {
        let mut client = Client::new(MockStream::new("-ERR unknown command\r\n"));
        let capabilities = client.capabilities().unwrap();
        assert!(capabilities.is_empty());
    }

    #[test]
    fn delete_is_best_effort() {
        let mock_stream = MockStream::new("-ERR message 4 already deleted\r\n");
        let sent = mock_stream.transcript();
        let mut client = Client::new(mock_stream);
        let reply = client.delete(4).unwrap();
        assert!(!reply.is_ok());
        assert_eq!(sent.text(), "DELE 4\r\n");
    }

    #[test]
    fn retrieve_unstuffs_and_stops_at_terminator() {
        let response = "+OK 45 octets\r\n\
                        Subject: dots\r\n\
                        \r\n\
                        ..leading dot\r\n\
                        .\r\n\
                        +OK 1 45\r\n";
        let mock_stream = MockStream::new(response);
        let sent = mock_stream.transcript();
        let mut client = Client::new(mock_stream);
        let mut body = String::new();
        client
            .retrieve(1, false)
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "Subject: dots\r\n\r\n.leading dot\r\n");
        assert_eq!(client.stat().unwrap().count, 1);
        assert_eq!(sent.text(), "RETR 1\r\nSTAT\r\n");
    }

    #[test]
    fn dropped_reader_drains_the_message() {
        let response = "+OK\r\n\
                        Subject: a\r\n\
                        \r\n\
                        body\r\n\
                        .\r\n\
                        +OK\r\n";
        let mut client = Client::new(MockStream::new(response));
        {
            let mut reader = client.retrieve(1, false).unwrap();
            let mut first = String::new();
            reader.read_line(&mut first).unwrap();
            assert_eq!(first, "Subject: a\r\n");
        }
        client.noop().unwrap();
    }

    #[test]
    fn top_sends_header_only_command() {
        let mock_stream = MockStream::new("+OK\r\nSubject: a\r\n\r\n.\r\n");
        let sent = mock_stream.transcript();
        let mut client = Client::new(mock_stream);
        let mut out = Vec::new();
        let n = client.write_message_to(3, true, &mut out).unwrap();
        assert_eq!(sent.text(), "TOP 3 0\r\n");
        assert_eq!(out, b"Subject: a\r\n\r\n");
        assert_eq!(n, 14);
    }

    #[test]
    fn retrieve_missing_message() {
        let mut client = Client::new(MockStream::new("-ERR no such message\r\n"));
        assert!(matches!(
            client.retrieve(9, false),
            Err(Error::ServerResponse(_))
        ));
    }

    #[test]
    fn message_headers() {
        let response = "+OK\r\n\
                        Subject: =?UTF-8?B?SGVsbG8=?=\r\n\
                        To: a@example.com\r\n\
                        \r\n\
                        .\r\n";
        let mut client = Client::new(MockStream::new(response));
        let headers = client.message_headers(1, &MimeParser::new()).unwrap();
        assert_eq!(headers.get("subject"), Some("Hello"));
        assert_eq!(headers.get("To"), Some("a@example.com"));
    }

    #[test]
    fn quit_closes_the_session() {
        let mock_stream = MockStream::new("+OK bye\r\n");
        let sent = mock_stream.transcript();
        let mut client = Client::new(mock_stream);
        client.quit().unwrap();
        assert_eq!(client.state(), ConnectionState::Closed);
        assert!(matches!(client.noop(), Err(Error::ConnectionState(_))));
        assert!(matches!(
            client.authenticate(&Credentials::new("mrose", "tanstaaf")),
            Err(Error::ConnectionState(_))
        ));
        assert_eq!(sent.text(), "QUIT\r\n");
    }

    #[test]
    fn disconnect_is_idempotent() {
        let mock_stream = MockStream::new("+OK bye\r\n");
        let sent = mock_stream.transcript();
        let mut client = Client::new(mock_stream);
        client.disconnect();
        client.disconnect();
        assert_eq!(client.state(), ConnectionState::Closed);
        assert_eq!(sent.text(), "QUIT\r\n");
    }

    #[test]
    fn disconnect_swallows_failures() {
        let mock_stream = MockStream::default().with_eof();
        let mut client = Client::new(mock_stream);
        client.disconnect();
        assert_eq!(client.state(), ConnectionState::Closed);
    }

    #[test]
    fn drop_sends_quit() {
        let mock_stream = MockStream::new("+OK bye\r\n");
        let sent = mock_stream.transcript();
        drop(Client::new(mock_stream));
        assert_eq!(sent.text(), "QUIT\r\n");
    }

    #[test]
    fn redacts_secrets() {
        assert_eq!(redact(b"PASS hunter2"), "PASS ****");
        assert_eq!(redact(b"APOP mrose c4c9334b"), "APOP mrose ****");
        assert_eq!(redact(b"STAT"), "STAT");
    }
}
