use crate::icap::{IcapError, IcapMethod};
use http::{HeaderMap, Method, Uri};
use std::ops::Range;

/// A parsed inbound ICAP request.
///
/// Built once per message by the codec and only ever read afterwards.
#[derive(Debug, Clone)]
pub struct AdaptationRequest {
    pub method: IcapMethod,

    /// ICAP URI from the request line, e.g. `icap://127.0.0.1:1344/filter`.
    pub uri: String,

    /// ICAP-level headers (not the encapsulated HTTP headers).
    pub headers: HeaderMap,

    /// The encapsulated HTTP request, present whenever a `req-hdr` section was sent.
    pub target: Option<HttpTarget>,
}

impl AdaptationRequest {
    /// Path component of the ICAP URI, used to pick the ICAP service.
    pub fn service_path(&self) -> String {
        match self.uri.parse::<Uri>() {
            Ok(uri) => uri.path().to_string(),
            Err(_) => self.uri.clone(),
        }
    }

    /// Whether the client asked to close the connection after this exchange.
    pub fn wants_close(&self) -> bool {
        self.headers
            .get_all(http::header::CONNECTION)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .any(|token| token.trim().eq_ignore_ascii_case("close"))
    }
}

/// The client request the proxy wants a decision on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTarget {
    pub method: Method,

    /// `host[:port]` the request is addressed to.
    pub authority: String,

    /// Full target URI as seen by the proxy.
    pub uri: String,
}

impl HttpTarget {
    /// CONNECT requests open a tunnel and are looked up by host and port.
    pub fn is_tunnel(&self) -> bool {
        self.method == Method::CONNECT
    }

    /// Parse an encapsulated HTTP/1 request head (`req-hdr` section).
    ///
    /// Only the request line and the `Host` header are read. Other header
    /// values are never decoded, so obs-text in e.g. `User-Agent` is fine.
    pub fn from_request_head(bytes: &[u8]) -> Result<Self, IcapError> {
        let mut lines = bytes
            .split(|b| *b == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line));

        let request_line = lines
            .next()
            .filter(|l| !l.is_empty())
            .map(String::from_utf8_lossy)
            .ok_or_else(|| IcapError::InvalidHttpRequest("empty request head".into()))?;

        let mut parts = request_line.split_whitespace();
        let (Some(method), Some(target), Some(version), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(IcapError::InvalidHttpRequest(request_line.to_string()));
        };

        if !version.starts_with("HTTP/") {
            return Err(IcapError::InvalidHttpRequest(request_line.to_string()));
        }

        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| IcapError::InvalidHttpRequest(format!("invalid method '{method}'")))?;

        let host = lines
            .take_while(|l| !l.is_empty())
            .find_map(host_header_value);

        //---------------------------------------------------------------------
        // Authority-form (CONNECT host:port)
        //---------------------------------------------------------------------
        if method == Method::CONNECT {
            return Ok(Self {
                method,
                authority: target.to_string(),
                uri: target.to_string(),
            });
        }

        //---------------------------------------------------------------------
        // Origin-form and asterisk-form need the Host header
        //---------------------------------------------------------------------
        if target.starts_with('/') || target == "*" {
            let host = host.ok_or_else(|| {
                IcapError::InvalidHttpRequest(format!("no Host header for target '{target}'"))
            })?;
            let path = if target == "*" { "" } else { target };
            return Ok(Self {
                method,
                uri: format!("http://{host}{path}"),
                authority: host,
            });
        }

        //---------------------------------------------------------------------
        // Absolute-form. A target the URI parser rejects is kept verbatim and
        // still looked up by URI.
        //---------------------------------------------------------------------
        let authority = target
            .parse::<Uri>()
            .ok()
            .and_then(|parsed| parsed.authority().map(|a| a.as_str().to_string()))
            .or(host)
            .unwrap_or_default();

        Ok(Self {
            method,
            authority,
            uri: target.to_string(),
        })
    }
}

/// Value of a `Host` header line, if `line` is one.
fn host_header_value(line: &[u8]) -> Option<String> {
    let colon = line.iter().position(|b| *b == b':')?;
    if !line[..colon].trim_ascii().eq_ignore_ascii_case(b"host") {
        return None;
    }
    Some(String::from_utf8_lossy(line[colon + 1..].trim_ascii()).into_owned())
}

/// A section named in the `Encapsulated` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    ReqHdr,
    ResHdr,
    ReqBody,
    ResBody,
    OptBody,
    NullBody,
}

impl Section {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "req-hdr" => Some(Section::ReqHdr),
            "res-hdr" => Some(Section::ResHdr),
            "req-body" => Some(Section::ReqBody),
            "res-body" => Some(Section::ResBody),
            "opt-body" => Some(Section::OptBody),
            "null-body" => Some(Section::NullBody),
            _ => None,
        }
    }

    fn is_body(self) -> bool {
        !matches!(self, Section::ReqHdr | Section::ResHdr)
    }
}

/// Parsed `Encapsulated` header: section names with their byte offsets.
///
/// Offsets are non-decreasing and the last entry is always a body section
/// (possibly `null-body`), so its offset is the total length of the
/// encapsulated header sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encapsulated {
    entries: Vec<(Section, usize)>,
}

impl Encapsulated {
    pub fn parse(value: &str) -> Result<Self, IcapError> {
        let mut entries = Vec::new();
        let mut last_offset = 0usize;

        for part in value.split(',') {
            let part = part.trim();
            let (name, offset) = part
                .split_once('=')
                .ok_or_else(|| IcapError::InvalidEncapsulated(value.to_string()))?;

            let section = Section::parse(name.trim())
                .ok_or_else(|| IcapError::InvalidEncapsulated(format!("unknown section '{name}'")))?;

            let offset: usize = offset
                .trim()
                .parse()
                .map_err(|_| IcapError::InvalidEncapsulated(format!("bad offset in '{part}'")))?;

            if offset < last_offset {
                return Err(IcapError::InvalidEncapsulated(format!(
                    "offsets must not decrease: {value}"
                )));
            }

            last_offset = offset;
            entries.push((section, offset));
        }

        match entries.last() {
            Some((section, _)) if section.is_body() => Ok(Self { entries }),
            _ => Err(IcapError::InvalidEncapsulated(format!(
                "last section must be a body: {value}"
            ))),
        }
    }

    /// Total number of bytes occupied by the encapsulated header sections.
    pub fn header_len(&self) -> usize {
        self.entries.last().map(|(_, offset)| *offset).unwrap_or(0)
    }

    /// Whether a chunked body follows the encapsulated headers.
    pub fn has_body(&self) -> bool {
        matches!(
            self.entries.last(),
            Some((Section::ReqBody | Section::ResBody | Section::OptBody, _))
        )
    }

    /// Byte range of a header section within the encapsulated header bytes.
    pub fn section_range(&self, section: Section) -> Option<Range<usize>> {
        let idx = self.entries.iter().position(|(s, _)| *s == section)?;
        let start = self.entries[idx].1;
        let end = self
            .entries
            .get(idx + 1)
            .map(|(_, offset)| *offset)
            .unwrap_or(start);
        Some(start..end)
    }
}
