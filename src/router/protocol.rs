//! RouterOS API wire format
//!
//! The API is a stream of *sentences*. A sentence is a list of *words*
//! terminated by an empty word, and every word is prefixed with a variable
//! length size:
//!
//! | length             | encoding                         |
//! |--------------------|----------------------------------|
//! | `< 0x80`           | 1 byte                           |
//! | `< 0x4000`         | 2 bytes, `len \| 0x8000`         |
//! | `< 0x200000`       | 3 bytes, `len \| 0xC00000`       |
//! | `< 0x10000000`     | 4 bytes, `len \| 0xE0000000`     |
//! | otherwise          | `0xF0` followed by 4 bytes       |
//!
//! Replies start with `!re` (one record), `!done` (end of reply), `!trap`
//! (request error) or `!fatal` (session is closing). Attributes are written
//! as `=key=value`.

use super::error::RouterError;
use std::collections::HashMap;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Attributes of one reply sentence.
pub type Record = HashMap<String, String>;

/// Words longer than this are treated as a broken stream.
pub const MAX_WORD_LEN: usize = 16 * 1024 * 1024;

pub fn encode_length(len: usize) -> Vec<u8> {
    let len = len as u32;
    if len < 0x80 {
        vec![len as u8]
    } else if len < 0x4000 {
        let l = len | 0x8000;
        vec![(l >> 8) as u8, l as u8]
    } else if len < 0x20_0000 {
        let l = len | 0xC0_0000;
        vec![(l >> 16) as u8, (l >> 8) as u8, l as u8]
    } else if len < 0x1000_0000 {
        let l = len | 0xE000_0000;
        vec![(l >> 24) as u8, (l >> 16) as u8, (l >> 8) as u8, l as u8]
    } else {
        vec![0xF0, (len >> 24) as u8, (len >> 16) as u8, (len >> 8) as u8, len as u8]
    }
}

pub async fn read_length<R: AsyncRead + Unpin>(reader: &mut R) -> Result<usize, RouterError> {
    let first = reader.read_u8().await? as u32;

    let (mut value, extra) = if first & 0x80 == 0x00 {
        (first, 0)
    } else if first & 0xC0 == 0x80 {
        (first & 0x3F, 1)
    } else if first & 0xE0 == 0xC0 {
        (first & 0x1F, 2)
    } else if first & 0xF0 == 0xE0 {
        (first & 0x0F, 3)
    } else if first == 0xF0 {
        (0, 4)
    } else {
        return Err(RouterError::Protocol(format!(
            "unexpected control byte 0x{:02X} in word length",
            first
        )));
    };

    for _ in 0..extra {
        value = (value << 8) | reader.read_u8().await? as u32;
    }

    Ok(value as usize)
}

pub async fn write_sentence<W, S>(writer: &mut W, words: &[S]) -> Result<(), RouterError>
where
    W: AsyncWrite + Unpin,
    S: AsRef<str>,
{
    let mut buf = Vec::new();
    for word in words {
        let bytes = word.as_ref().as_bytes();
        buf.extend_from_slice(&encode_length(bytes.len()));
        buf.extend_from_slice(bytes);
    }
    buf.push(0);

    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_sentence<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<String>, RouterError> {
    let mut words = Vec::new();
    loop {
        let len = read_length(reader).await?;
        if len == 0 {
            return Ok(words);
        }
        if len > MAX_WORD_LEN {
            return Err(RouterError::Protocol(format!("word of {} bytes exceeds limit", len)));
        }

        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf).await?;
        words.push(String::from_utf8_lossy(&buf).into_owned());
    }
}

/// One reply sentence, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Re(Record),
    Done(Record),
    Trap(String),
    Fatal(String),
}

impl Reply {
    pub fn from_words(words: &[String]) -> Result<Self, RouterError> {
        let Some((kind, rest)) = words.split_first() else {
            return Err(RouterError::Protocol("empty reply sentence".to_string()));
        };

        match kind.as_str() {
            "!re" => Ok(Reply::Re(parse_attributes(rest))),
            "!done" => Ok(Reply::Done(parse_attributes(rest))),
            "!trap" => {
                let attrs = parse_attributes(rest);
                Ok(Reply::Trap(
                    attrs.get("message").cloned().unwrap_or_else(|| "unknown error".to_string()),
                ))
            }
            // !fatal carries its reason as a bare word
            "!fatal" => Ok(Reply::Fatal(rest.join(" "))),
            other => Err(RouterError::Protocol(format!("unknown reply type '{}'", other))),
        }
    }
}

/// Collect `=key=value` words. Tags and query words are ignored.
pub fn parse_attributes(words: &[String]) -> Record {
    words
        .iter()
        .filter_map(|w| w.strip_prefix('='))
        .filter_map(|w| w.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// `=key=value` word.
pub fn attribute(key: &str, value: &str) -> String {
    format!("={}={}", key, value)
}
