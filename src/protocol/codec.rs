// src/protocol/codec.rs

use crate::error::SonetError;
use crate::protocol::types::{OutboundEvent, SequencedRequest};

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Upper bound on the `TYPE_TOKEN <seq_id>` request line.
pub const MAX_REQUEST_LINE: usize = 1024;
/// Upper bound on a single JSON body line.
pub const MAX_BODY_LINE: usize = 1024 * 1024;

/// Codec for client request framing: `TYPE_TOKEN <seq_id>\n<json-body>\n`.
///
/// The body line is consumed as part of the frame, before anyone tries to
/// decode it as JSON. A body that fails to decode therefore never
/// desynchronizes the stream, and the unknown-request-type path skips its
/// body the same way.
#[derive(Debug, Default)]
pub struct RequestCodec {
  decoding_state: DecodingState,
}

#[derive(Debug, Default)]
enum DecodingState {
  #[default]
  ReadRequestLine, // Waiting for `TYPE_TOKEN <seq_id>\n`
  ReadBody(RequestLine), // Waiting for the JSON body line
}

#[derive(Debug)]
struct RequestLine {
  request_type: String,
  seq_id: i64,
}

impl RequestCodec {
  pub fn new() -> Self {
    Self::default()
  }
}

/// Splits one `\n`-terminated line off `src`, without the newline.
/// Returns `Ok(None)` while the line is still incomplete.
fn take_line(src: &mut BytesMut, max: usize, what: &str) -> Result<Option<BytesMut>, SonetError> {
  match src.iter().position(|b| *b == b'\n') {
    Some(pos) if pos > max => Err(SonetError::ProtocolViolation(format!(
      "{} exceeds {} bytes",
      what, max
    ))),
    Some(pos) => {
      let mut line = src.split_to(pos + 1);
      line.truncate(pos); // drop the newline
      Ok(Some(line))
    }
    None if src.len() > max => Err(SonetError::ProtocolViolation(format!(
      "{} exceeds {} bytes",
      what, max
    ))),
    None => Ok(None),
  }
}

impl Decoder for RequestCodec {
  type Item = SequencedRequest;
  type Error = SonetError;

  fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
    loop {
      match std::mem::take(&mut self.decoding_state) {
        DecodingState::ReadRequestLine => {
          let Some(line) = take_line(src, MAX_REQUEST_LINE, "request line")? else {
            return Ok(None);
          };

          // The request type token may be arbitrary garbage (that becomes an
          // error reply later), but a missing or non-integer sequence id
          // leaves no way to answer the client, so it is fatal.
          let line = String::from_utf8_lossy(&line);
          let (request_type, seq_str) = line.split_once(' ').ok_or_else(|| {
            SonetError::ProtocolViolation(format!("request line has no sequence id: {:?}", line))
          })?;
          if request_type.is_empty() {
            return Err(SonetError::ProtocolViolation("empty request type token".into()));
          }
          let seq_id = seq_str.parse::<i64>().map_err(|_| {
            SonetError::ProtocolViolation(format!("sequence id is not an integer: {:?}", seq_str))
          })?;

          self.decoding_state = DecodingState::ReadBody(RequestLine {
            request_type: request_type.to_string(),
            seq_id,
          });
        }
        DecodingState::ReadBody(header) => {
          let Some(line) = take_line(src, MAX_BODY_LINE, "request body")? else {
            self.decoding_state = DecodingState::ReadBody(header);
            return Ok(None);
          };

          // State is back at ReadRequestLine via the take above.
          return Ok(Some(SequencedRequest {
            request_type: header.request_type,
            seq_id: header.seq_id,
            body: line.freeze(),
          }));
        }
      }
    }
  }
}

/// Encoder for server-to-client traffic: one JSON object per line.
#[derive(Debug, Default)]
pub struct EventCodec;

impl EventCodec {
  pub fn new() -> Self {
    Self
  }
}

impl Encoder<OutboundEvent> for EventCodec {
  type Error = SonetError;

  fn encode(&mut self, item: OutboundEvent, dst: &mut BytesMut) -> Result<(), Self::Error> {
    let json = match &item {
      OutboundEvent::Event(event) => serde_json::to_vec(event),
      OutboundEvent::Reply(reply) => serde_json::to_vec(reply),
      OutboundEvent::Shutdown => {
        return Err(SonetError::Internal("close sentinel is not a wire value".into()));
      }
    }
    .map_err(|e| SonetError::Internal(format!("could not serialize outbound event: {}", e)))?;

    dst.reserve(json.len() + 1);
    dst.extend_from_slice(&json);
    dst.put_u8(b'\n');
    Ok(())
  }
}
