//! A small in-process POP3 server for the integration tests.
//!
//! The server keeps its maildrop behind a mutex so tests can inspect what is left after a
//! session, and records every command it receives. Sessions are served one at a time, and
//! deletions are committed on `QUIT` like a real maildrop.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use popfree::authenticator::apop_digest;

pub const TIMESTAMP: &str = "<1896.697170952@dbc.mtview.ca.us>";
pub const USERNAME: &str = "mrose";
pub const PASSWORD: &str = "tanstaaf";

#[derive(Clone, Debug)]
pub struct StoredMessage {
    pub uid: String,
    pub text: String,
}

#[derive(Clone, Debug)]
pub struct Behaviour {
    /// Put the APOP timestamp in the greeting.
    pub apop: bool,
    /// Advertise and answer `UIDL`.
    pub uidl: bool,
    /// Refuse `PASS` and `APOP` with a lock message.
    pub locked: bool,
}

impl Default for Behaviour {
    fn default() -> Self {
        Behaviour {
            apop: false,
            uidl: true,
            locked: false,
        }
    }
}

pub struct FakeServer {
    pub port: u16,
    pub maildrop: Arc<Mutex<Vec<StoredMessage>>>,
    pub commands: Arc<Mutex<Vec<String>>>,
}

impl FakeServer {
    pub fn start(messages: &[(&str, &str)], behaviour: Behaviour) -> FakeServer {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let maildrop = Arc::new(Mutex::new(
            messages
                .iter()
                .map(|(uid, text)| StoredMessage {
                    uid: uid.to_string(),
                    text: text.to_string(),
                })
                .collect::<Vec<_>>(),
        ));
        let commands = Arc::new(Mutex::new(Vec::new()));

        let server = FakeServer {
            port,
            maildrop: maildrop.clone(),
            commands: commands.clone(),
        };
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let mut session = Session {
                    behaviour: behaviour.clone(),
                    maildrop: &maildrop,
                    commands: &commands,
                    deleted: Vec::new(),
                };
                // a client hanging up mid-session is not the server's problem
                let _ = session.serve(stream);
            }
        });
        server
    }

    pub fn remaining_uids(&self) -> Vec<String> {
        self.maildrop
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.uid.clone())
            .collect()
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn saw(&self, prefix: &str) -> bool {
        self.commands().iter().any(|c| c.starts_with(prefix))
    }
}

struct Session<'a> {
    behaviour: Behaviour,
    maildrop: &'a Mutex<Vec<StoredMessage>>,
    commands: &'a Mutex<Vec<String>>,
    deleted: Vec<usize>,
}

impl Session<'_> {
    fn serve(&mut self, stream: TcpStream) -> std::io::Result<()> {
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut out = stream;
        let snapshot = self.maildrop.lock().unwrap().clone();

        if self.behaviour.apop {
            write!(out, "+OK POP3 server ready {}\r\n", TIMESTAMP)?;
        } else {
            write!(out, "+OK POP3 server ready\r\n")?;
        }

        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Ok(());
            }
            let command = line.trim_end().to_string();
            self.commands.lock().unwrap().push(command.clone());
            let mut words = command.split(' ');
            let verb = words.next().unwrap_or("").to_ascii_uppercase();
            let args: Vec<&str> = words.collect();

            let live = |n: &str| -> Option<usize> {
                let n: usize = n.parse().ok()?;
                (n >= 1 && n <= snapshot.len() && !self.deleted.contains(&(n - 1))).then(|| n - 1)
            };

            match verb.as_str() {
                "CAPA" => {
                    out.write_all(b"+OK capability list follows\r\nTOP\r\nUSER\r\n")?;
                    if self.behaviour.uidl {
                        out.write_all(b"UIDL\r\n")?;
                    }
                    out.write_all(b".\r\n")?;
                }
                "USER" => out.write_all(b"+OK send PASS\r\n")?,
                "PASS" if self.behaviour.locked => {
                    out.write_all(b"-ERR [IN-USE] unable to lock maildrop\r\n")?
                }
                "PASS" if args.first() == Some(&PASSWORD) => {
                    out.write_all(b"+OK maildrop ready\r\n")?
                }
                "PASS" => out.write_all(b"-ERR [AUTH] invalid password\r\n")?,
                "APOP" => {
                    let expected = apop_digest(TIMESTAMP, PASSWORD).unwrap();
                    if args.first() == Some(&USERNAME) && args.get(1) == Some(&expected.as_str())
                    {
                        out.write_all(b"+OK maildrop ready\r\n")?
                    } else {
                        out.write_all(b"-ERR [AUTH] permission denied\r\n")?
                    }
                }
                "STAT" => {
                    let (count, size) = snapshot
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| !self.deleted.contains(i))
                        .fold((0, 0), |(c, s), (_, m)| (c + 1, s + m.text.len()));
                    write!(out, "+OK {} {}\r\n", count, size)?;
                }
                "LIST" => {
                    out.write_all(b"+OK scan listing follows\r\n")?;
                    for (i, m) in snapshot.iter().enumerate() {
                        if !self.deleted.contains(&i) {
                            write!(out, "{} {}\r\n", i + 1, m.text.len())?;
                        }
                    }
                    out.write_all(b".\r\n")?;
                }
                "UIDL" if !self.behaviour.uidl => out.write_all(b"-ERR unknown command\r\n")?,
                "UIDL" => {
                    out.write_all(b"+OK unique-id listing follows\r\n")?;
                    for (i, m) in snapshot.iter().enumerate() {
                        if !self.deleted.contains(&i) {
                            write!(out, "{} {}\r\n", i + 1, m.uid)?;
                        }
                    }
                    out.write_all(b".\r\n")?;
                }
                "RETR" | "TOP" => match args.first().and_then(|n| live(n)) {
                    Some(i) => {
                        out.write_all(b"+OK message follows\r\n")?;
                        let text = &snapshot[i].text;
                        let text = if verb == "TOP" {
                            text.split("\r\n\r\n").next().unwrap_or("").to_string() + "\r\n\r\n"
                        } else {
                            text.clone()
                        };
                        write_stuffed(&mut out, &text)?;
                    }
                    None => out.write_all(b"-ERR no such message\r\n")?,
                },
                "DELE" => match args.first().and_then(|n| live(n)) {
                    Some(i) => {
                        self.deleted.push(i);
                        out.write_all(b"+OK message deleted\r\n")?;
                    }
                    None => out.write_all(b"-ERR no such message\r\n")?,
                },
                "NOOP" => out.write_all(b"+OK\r\n")?,
                "RSET" => {
                    self.deleted.clear();
                    out.write_all(b"+OK\r\n")?;
                }
                "STLS" => out.write_all(b"-ERR STLS not available\r\n")?,
                "QUIT" => {
                    let mut maildrop = self.maildrop.lock().unwrap();
                    let gone: Vec<String> = self
                        .deleted
                        .iter()
                        .map(|&i| snapshot[i].uid.clone())
                        .collect();
                    maildrop.retain(|m| !gone.contains(&m.uid));
                    out.write_all(b"+OK bye\r\n")?;
                    return Ok(());
                }
                _ => out.write_all(b"-ERR unknown command\r\n")?,
            }
        }
    }
}

/// Send a message body with leading dots stuffed, followed by the terminating `.` line.
fn write_stuffed(out: &mut TcpStream, text: &str) -> std::io::Result<()> {
    for line in text.split_inclusive("\r\n") {
        if line.starts_with('.') {
            out.write_all(b".")?;
        }
        out.write_all(line.as_bytes())?;
    }
    if !text.is_empty() && !text.ends_with("\r\n") {
        out.write_all(b"\r\n")?;
    }
    out.write_all(b".\r\n")
}
