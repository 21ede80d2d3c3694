use serde_json::Value;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Wire framing of a stdio message. Replies use the framing of the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Framing {
    /// One JSON document per line.
    Line,
    /// `Content-Length` headers, blank line, then the JSON body.
    ContentLength,
}

#[derive(Debug)]
pub enum Frame {
    Message(Value),
    /// The frame was delimited correctly but its body is not JSON.
    Malformed(String),
}

/// Largest `Content-Length` body accepted; larger bodies are skipped.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Read the next message. `Ok(None)` on a clean EOF between messages.
///
/// Undecodable lines, bad `Content-Length` values and oversized bodies come
/// back as [`Frame::Malformed`]; only I/O failures and a truncated stream are
/// errors.
pub async fn read_frame<R>(reader: &mut R) -> io::Result<Option<(Frame, Framing)>>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let Some(line) = read_line(reader).await? else {
            return Ok(None);
        };
        let line = match line {
            Ok(line) => line,
            Err(err) => return Ok(Some((Frame::Malformed(err), Framing::Line))),
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(length) = parse_content_length(trimmed) {
            read_remaining_headers(reader).await?;
            let frame = match length {
                Ok(length) if length <= MAX_FRAME_BYTES => {
                    let mut payload = vec![0_u8; length];
                    reader.read_exact(&mut payload).await?;
                    match serde_json::from_slice(&payload) {
                        Ok(value) => Frame::Message(value),
                        Err(e) => Frame::Malformed(e.to_string()),
                    }
                }
                Ok(length) => {
                    discard_body(reader, length as u64).await?;
                    Frame::Malformed(format!(
                        "Content-Length {length} exceeds the {MAX_FRAME_BYTES} byte limit"
                    ))
                }
                Err(err) => Frame::Malformed(err),
            };
            return Ok(Some((frame, Framing::ContentLength)));
        }

        let frame = match serde_json::from_str(trimmed) {
            Ok(value) => Frame::Message(value),
            Err(e) => Frame::Malformed(e.to_string()),
        };
        return Ok(Some((frame, Framing::Line)));
    }
}

/// One line as UTF-8. The outer `None` is EOF; the inner `Err` is a line that
/// is not valid UTF-8.
async fn read_line<R>(reader: &mut R) -> io::Result<Option<Result<String, String>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf).await? == 0 {
        return Ok(None);
    }
    Ok(Some(
        String::from_utf8(buf).map_err(|e| format!("Message is not valid UTF-8: {e}")),
    ))
}

/// `None` when the line is not a `Content-Length` header.
fn parse_content_length(line: &str) -> Option<Result<usize, String>> {
    let (name, value) = line.split_once(':')?;
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return None;
    }
    Some(
        value
            .trim()
            .parse::<usize>()
            .map_err(|_| format!("Invalid Content-Length header: {}", value.trim())),
    )
}

async fn read_remaining_headers<R>(reader: &mut R) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let mut line = Vec::new();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Unexpected EOF while reading MCP headers",
            ));
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }
    }
}

async fn discard_body<R>(reader: &mut R, length: u64) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let skipped = io::copy(&mut (&mut *reader).take(length), &mut io::sink()).await?;
    if skipped < length {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "Unexpected EOF while skipping oversized MCP message",
        ));
    }
    Ok(())
}

pub async fn write_frame<W>(writer: &mut W, value: &Value, framing: Framing) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to serialize JSON: {e}"),
        )
    })?;
    match framing {
        Framing::Line => {
            writer.write_all(&body).await?;
            writer.write_all(b"\n").await?;
        }
        Framing::ContentLength => {
            let header = format!(
                "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n",
                body.len()
            );
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(&body).await?;
        }
    }
    writer.flush().await
}
