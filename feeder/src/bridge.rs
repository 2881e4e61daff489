//! UID relay from a second microcontroller.
//!
//! The relay writes one identifier per line (`049A3C7F\n`, optional `\r`)
//! over a UART. Lines are buffered up to the longest UID and handed out whole.

use std::io::{self, BufReader, Read};

use log::warn;
use petfeeder_nfc::MAX_UID_LEN;

use crate::error::Result;

/// Longest accepted line, two hex characters per UID byte.
pub const MAX_LINE_LEN: usize = MAX_UID_LEN * 2;

/// Frame `uid` for the relay link.
pub fn encode_line(uid: &str) -> String {
    format!("{}\n", uid)
}

/// Reads identifier lines from a byte stream.
pub struct LineBridge<R> {
    reader: BufReader<R>,
    line: Vec<u8>,
    overflowed: bool,
}

impl<R: Read> LineBridge<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line: Vec::with_capacity(MAX_LINE_LEN),
            overflowed: false,
        }
    }

    /// Block until a complete identifier line arrives.
    ///
    /// `Ok(None)` on end of stream or when the port read times out; a
    /// partial line is kept for the next call.
    pub fn next_identifier(&mut self) -> Result<Option<String>> {
        let mut byte = [0u8; 1];
        loop {
            match self.reader.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    if let Some(uid) = self.push(byte[0]) {
                        return Ok(Some(uid));
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e)
                    if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
                {
                    return Ok(None)
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn push(&mut self, byte: u8) -> Option<String> {
        match byte {
            b'\n' => {
                let line = std::mem::take(&mut self.line);
                let overflowed = std::mem::replace(&mut self.overflowed, false);
                if overflowed {
                    warn!("Dropping overlong UID line");
                    return None;
                }
                validate(&line)
            }
            b'\r' => None,
            _ if self.line.len() < MAX_LINE_LEN => {
                self.line.push(byte);
                None
            }
            _ => {
                self.overflowed = true;
                None
            }
        }
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

fn validate(line: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(line).ok()?.trim();
    if text.is_empty() {
        return None;
    }
    if !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        warn!("Dropping malformed UID line {:?}", text);
        return None;
    }
    Some(text.to_ascii_uppercase())
}
