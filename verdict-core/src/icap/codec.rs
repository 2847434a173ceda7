use crate::icap::request::{Encapsulated, HttpTarget, Section};
use crate::icap::{AdaptationRequest, IcapError, IcapMethod};
use http::{HeaderMap, HeaderName, HeaderValue};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Size limits applied while framing a request.
#[derive(Debug, Clone, Copy)]
pub struct CodecLimits {
    pub max_line_bytes: usize,
    /// ICAP head plus all encapsulated header sections.
    pub max_head_bytes: usize,
}

impl Default for CodecLimits {
    fn default() -> Self {
        Self {
            max_line_bytes: 8 * 1024,  // 8 KiB
            max_head_bytes: 64 * 1024, // 64 KiB
        }
    }
}

/// Read one ICAP request from `reader`.
///
/// Returns `Ok(None)` when the peer closed the connection before sending
/// anything. Any encapsulated body is drained so the next request on a
/// persistent connection starts at a message boundary.
pub async fn read_request<R>(
    reader: &mut R,
    limits: &CodecLimits,
) -> Result<Option<AdaptationRequest>, IcapError>
where
    R: AsyncBufRead + Unpin,
{
    let Some(request_line) = read_line(reader, limits.max_line_bytes).await? else {
        return Ok(None);
    };
    let mut head_bytes = request_line.len() + 2;

    let (method, uri) = parse_request_line(&String::from_utf8_lossy(&request_line))?;

    //-------------------------------------------------------------------------
    // ICAP headers
    //-------------------------------------------------------------------------
    let mut headers = HeaderMap::new();
    loop {
        let line = read_line(reader, limits.max_line_bytes)
            .await?
            .ok_or(IcapError::UnexpectedEof)?;

        head_bytes += line.len() + 2;
        if head_bytes > limits.max_head_bytes {
            return Err(IcapError::HeadTooLarge {
                limit: limits.max_head_bytes,
            });
        }

        if line.is_empty() {
            break;
        }

        let (name, value) = parse_header_line(&line)?;
        headers.append(name, value);
    }

    //-------------------------------------------------------------------------
    // Encapsulated sections
    //-------------------------------------------------------------------------
    let encapsulated = match headers.get("encapsulated") {
        Some(value) => {
            let value = value
                .to_str()
                .map_err(|_| IcapError::InvalidEncapsulated("non-ASCII value".into()))?;
            Some(Encapsulated::parse(value)?)
        }
        None => None,
    };

    let mut target = None;
    if let Some(encapsulated) = &encapsulated {
        let len = encapsulated.header_len();
        if head_bytes + len > limits.max_head_bytes {
            return Err(IcapError::HeadTooLarge {
                limit: limits.max_head_bytes,
            });
        }

        let mut sections = vec![0u8; len];
        reader
            .read_exact(&mut sections)
            .await
            .map_err(IcapError::from_read)?;

        if let Some(range) = encapsulated.section_range(Section::ReqHdr) {
            target = Some(HttpTarget::from_request_head(&sections[range])?);
        }

        if encapsulated.has_body() {
            drain_chunked_body(reader, limits).await?;
        }
    }

    if method == IcapMethod::ReqMod && target.is_none() {
        return Err(IcapError::MissingRequestHeader);
    }

    Ok(Some(AdaptationRequest {
        method,
        uri,
        headers,
        target,
    }))
}

fn parse_request_line(line: &str) -> Result<(IcapMethod, String), IcapError> {
    let mut parts = line.split_whitespace();
    let (Some(method), Some(uri), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(IcapError::InvalidRequestLine(line.to_string()));
    };

    if !version.starts_with("ICAP/1.") {
        return Err(IcapError::InvalidVersion(version.to_string()));
    }

    Ok((IcapMethod::parse(method), uri.to_string()))
}

/// Split `name: value`. Values may carry obs-text (bytes >= 0x80).
fn parse_header_line(line: &[u8]) -> Result<(HeaderName, HeaderValue), IcapError> {
    let invalid = || IcapError::InvalidHeader(String::from_utf8_lossy(line).into_owned());

    let colon = line.iter().position(|b| *b == b':').ok_or_else(invalid)?;
    let (name, value) = (&line[..colon], &line[colon + 1..]);

    let name = HeaderName::from_bytes(name.trim_ascii()).map_err(|_| invalid())?;
    let value = HeaderValue::from_bytes(value.trim_ascii()).map_err(|_| invalid())?;

    Ok((name, value))
}

/// Skip a chunked body, including preview terminators such as `0; ieof`.
async fn drain_chunked_body<R>(reader: &mut R, limits: &CodecLimits) -> Result<(), IcapError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let line = read_line(reader, limits.max_line_bytes)
            .await?
            .ok_or(IcapError::UnexpectedEof)?;

        let line = String::from_utf8_lossy(&line);
        let size = line.split(';').next().unwrap_or_default().trim();
        let size = u64::from_str_radix(size, 16)
            .map_err(|_| IcapError::InvalidChunk(line.to_string()))?;

        if size == 0 {
            // Trailer section ends with an empty line.
            loop {
                let trailer = read_line(reader, limits.max_line_bytes)
                    .await?
                    .ok_or(IcapError::UnexpectedEof)?;
                if trailer.is_empty() {
                    return Ok(());
                }
            }
        }

        let copied = tokio::io::copy(&mut (&mut *reader).take(size), &mut tokio::io::sink()).await?;
        if copied < size {
            return Err(IcapError::UnexpectedEof);
        }

        let end = read_line(reader, limits.max_line_bytes)
            .await?
            .ok_or(IcapError::UnexpectedEof)?;
        if !end.is_empty() {
            return Err(IcapError::InvalidChunk(format!(
                "expected CRLF after {size} byte chunk"
            )));
        }
    }
}

/// Read a single CRLF (or bare LF) terminated line without the terminator.
///
/// Bytes are returned as-is; callers decide which parts must be text.
/// `Ok(None)` means EOF before any byte of the line.
async fn read_line<R>(reader: &mut R, max_len: usize) -> Result<Option<Vec<u8>>, IcapError>
where
    R: AsyncBufRead + Unpin,
{
    let mut collected = Vec::new();

    loop {
        let available = reader.fill_buf().await?;

        if available.is_empty() {
            if collected.is_empty() {
                return Ok(None);
            }
            return Err(IcapError::UnexpectedEof);
        }

        let newline_pos = available.iter().position(|byte| *byte == b'\n');
        let consume = newline_pos.map(|idx| idx + 1).unwrap_or(available.len());

        if collected.len() + consume > max_len {
            return Err(IcapError::LineTooLong { limit: max_len });
        }

        collected.extend_from_slice(&available[..consume]);
        reader.consume(consume);

        if newline_pos.is_some() {
            break;
        }
    }

    while matches!(collected.last(), Some(b'\r' | b'\n')) {
        collected.pop();
    }

    Ok(Some(collected))
}
