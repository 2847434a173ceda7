use crate::icap::ICAP_VERSION;
use bytes::{BufMut, Bytes, BytesMut};
use http::StatusCode;

/// Ordered header list that keeps the caller's name casing on the wire.
///
/// ICAP clients match names case-insensitively, but several of them log the
/// raw names, so `ISTag` is written as `ISTag` rather than `istag`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList {
    entries: Vec<(String, String)>,
}

impl HeaderList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a header (case-insensitive name match).
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply every header of `other` on top of `self`.
    pub fn merge(&mut self, other: HeaderList) {
        for (name, value) in other.entries {
            self.set(&name, value);
        }
    }

    fn write_to(&self, buf: &mut BytesMut) {
        for (name, value) in &self.entries {
            buf.put_slice(name.as_bytes());
            buf.put_slice(b": ");
            buf.put_slice(value.as_bytes());
            buf.put_slice(b"\r\n");
        }
    }
}

/// Head of a synthesized HTTP response carried inside an ICAP 200.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponseHead {
    pub status: StatusCode,
    /// Free-form reason phrase; not necessarily the canonical one.
    pub reason: String,
    pub headers: HeaderList,
}

impl HttpResponseHead {
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(256);
        buf.put_slice(format!("HTTP/1.1 {} {}\r\n", self.status.as_u16(), self.reason).as_bytes());
        self.headers.write_to(&mut buf);
        buf.put_slice(b"\r\n");
        buf.freeze()
    }
}

/// A complete ICAP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcapResponse {
    pub status: StatusCode,
    pub headers: HeaderList,
    /// Adapted HTTP response; `None` means a header-only (null-body) response.
    pub adapted: Option<HttpResponseHead>,
}

impl IcapResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderList::new(),
            adapted: None,
        }
    }

    /// `204 No Content`: the proxy forwards the original message unchanged.
    pub fn no_content() -> Self {
        Self::new(StatusCode::NO_CONTENT)
    }

    /// `200 OK` carrying a replacement HTTP response.
    pub fn adapted(head: HttpResponseHead) -> Self {
        Self {
            adapted: Some(head),
            ..Self::new(StatusCode::OK)
        }
    }

    pub fn method_not_allowed() -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED)
    }

    pub fn bad_request() -> Self {
        Self::new(StatusCode::BAD_REQUEST)
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Value of the `Encapsulated` header for this response.
    pub fn encapsulated(&self) -> String {
        match &self.adapted {
            Some(head) => format!("res-hdr=0, null-body={}", head.to_bytes().len()),
            None => "null-body=0".to_string(),
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let adapted = self.adapted.as_ref().map(HttpResponseHead::to_bytes);
        let mut buf = BytesMut::with_capacity(512 + adapted.as_ref().map_or(0, |b| b.len()));

        buf.put_slice(
            format!(
                "{} {} {}\r\n",
                ICAP_VERSION,
                self.status.as_u16(),
                self.status.canonical_reason().unwrap_or("Unknown")
            )
            .as_bytes(),
        );
        self.headers.write_to(&mut buf);
        buf.put_slice(format!("Encapsulated: {}\r\n\r\n", self.encapsulated()).as_bytes());

        if let Some(adapted) = adapted {
            buf.put_slice(&adapted);
        }

        buf.freeze()
    }
}
