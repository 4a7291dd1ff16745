
use std::fs;
use std::io::BufRead;
use std::path::Path;

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

use crate::error::{Error, Result};

/// must_read_stdin blocks until a non-empty line is received from stdin
pub fn must_read_stdin() -> Result<String> {
    let stdin = std::io::stdin();
    let line = read_signal_line(stdin.lock())?;
    println!();

    Ok(line)
}

/// read_signal_line returns the first line of `reader` that is not blank
/// once trimmed. Reaching EOF first is an error.
pub fn read_signal_line<R: BufRead>(mut reader: R) -> Result<String> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(Error::ErrSignalInputClosed);
        }

        let trimmed = line.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_owned());
        }
    }
}

/// read_signal_file reads a pasted session description from disk
pub fn read_signal_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let content = fs::read_to_string(path)?;
    read_signal_line(content.as_bytes())
}

/// encode marshals the session description to JSON and encodes it in base64
pub fn encode(desc: &RTCSessionDescription) -> Result<String> {
    let json_str = serde_json::to_string(desc)?;
    Ok(BASE64_STANDARD.encode(json_str))
}

/// decode decodes the input from base64 and unmarshals the JSON session
/// description it carries
pub fn decode(s: &str) -> Result<RTCSessionDescription> {
    let b = BASE64_STANDARD.decode(s.trim())?;
    let json_str = String::from_utf8(b)?;
    let desc = serde_json::from_str::<RTCSessionDescription>(&json_str)?;
    log::debug!("unmarshalled {} description", desc.sdp_type);

    Ok(desc)
}
