//! Unix-domain socket transport
//!
//! Clients write concatenated JSON values with no delimiter; each value is
//! framed by tracking bracket depth outside string literals. Replies are
//! written one per line.

use std::io;
use std::path::Path;

use bytes::{Buf, BufMut, BytesMut};
use futures::{future, StreamExt};
use tokio::net::UnixListener;
use tokio_util::codec::{Decoder, Encoder, Framed};

use crate::error::RpcResult;
use crate::handler::RpcHandler;
use crate::session::serve_connection;

/// Splits a byte stream into complete JSON objects or arrays
#[derive(Debug)]
pub struct JsonStreamCodec {
    max_length: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
    scanned: usize,
}

impl JsonStreamCodec {
    /// Codec rejecting values longer than `max_length` bytes
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            depth: 0,
            in_string: false,
            escaped: false,
            scanned: 0,
        }
    }

    fn reset(&mut self) {
        self.depth = 0;
        self.in_string = false;
        self.escaped = false;
        self.scanned = 0;
    }
}

impl Decoder for JsonStreamCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, io::Error> {
        if self.scanned == 0 {
            let blank = src.iter().take_while(|b| b.is_ascii_whitespace()).count();
            src.advance(blank);
            match src.first() {
                None => return Ok(None),
                Some(b'{') | Some(b'[') => {}
                Some(other) => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("unexpected byte 0x{:02x} between messages", other),
                    ))
                }
            }
        }

        while self.scanned < src.len() {
            let byte = src[self.scanned];
            self.scanned += 1;

            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if byte == b'\\' {
                    self.escaped = true;
                } else if byte == b'"' {
                    self.in_string = false;
                }
                continue;
            }

            match byte {
                b'"' => self.in_string = true,
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        let frame = src.split_to(self.scanned);
                        self.reset();
                        return String::from_utf8(frame.to_vec())
                            .map(Some)
                            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e));
                    }
                }
                _ => {}
            }
        }

        if src.len() > self.max_length {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("message exceeds {} bytes", self.max_length),
            ));
        }
        Ok(None)
    }
}

impl Encoder<String> for JsonStreamCodec {
    type Error = io::Error;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), io::Error> {
        dst.reserve(item.len() + 1);
        dst.put_slice(item.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

/// Bind the socket, replacing a stale file left by a previous run
pub fn bind(path: &Path) -> io::Result<UnixListener> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    UnixListener::bind(path)
}

/// Accept connections until the listener fails
pub async fn serve(
    listener: UnixListener,
    handler: RpcHandler,
    queue_size: usize,
    max_length: usize,
) -> RpcResult<()> {
    loop {
        let (stream, _) = listener.accept().await?;
        let handler = handler.clone();
        tokio::spawn(async move {
            let (sink, frames) = Framed::new(stream, JsonStreamCodec::new(max_length)).split();
            let incoming = frames
                .take_while(|frame| {
                    if let Err(e) = frame {
                        tracing::debug!(error = %e, "closing IPC connection");
                    }
                    future::ready(frame.is_ok())
                })
                .filter_map(|frame| future::ready(frame.ok()));
            serve_connection(handler, incoming, sink, queue_size).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(codec: &mut JsonStreamCodec, input: &str) -> Vec<String> {
        let mut buf = BytesMut::from(input);
        let mut out = Vec::new();
        while let Some(frame) = codec.decode(&mut buf).unwrap() {
            out.push(frame);
        }
        out
    }

    #[test]
    fn test_concatenated_values() {
        let mut codec = JsonStreamCodec::new(1024);
        let frames = decode_all(&mut codec, r#"{"id":1}{"id":2} [{"id":3}]"#);
        assert_eq!(frames, vec![r#"{"id":1}"#, r#"{"id":2}"#, r#"[{"id":3}]"#]);
    }

    #[test]
    fn test_brackets_inside_strings() {
        let mut codec = JsonStreamCodec::new(1024);
        let input = r#"{"a":"}{][","b":"quote \" and \\"}"#;
        assert_eq!(decode_all(&mut codec, input), vec![input.to_string()]);
    }

    #[test]
    fn test_partial_frames() {
        let mut codec = JsonStreamCodec::new(1024);
        let mut buf = BytesMut::from(r#"{"method":"eth_"#);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(br#"chainId"}"#);
        assert_eq!(
            codec.decode(&mut buf).unwrap().as_deref(),
            Some(r#"{"method":"eth_chainId"}"#)
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_garbage_and_oversize() {
        let mut codec = JsonStreamCodec::new(1024);
        let mut buf = BytesMut::from("hello");
        assert!(codec.decode(&mut buf).is_err());

        let mut codec = JsonStreamCodec::new(8);
        let mut buf = BytesMut::from(r#"{"method":"#);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn test_encoder_appends_newline() {
        let mut codec = JsonStreamCodec::new(1024);
        let mut dst = BytesMut::new();
        codec.encode("{}".to_string(), &mut dst).unwrap();
        assert_eq!(&dst[..], b"{}\n");
    }
}
