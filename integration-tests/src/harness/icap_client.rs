use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

/// A parsed ICAP response as seen by the proxy.
#[derive(Debug, Clone)]
pub struct IcapReply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    /// Encapsulated HTTP response head, if any.
    pub http_head: Option<String>,
}

impl IcapReply {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Value of a header inside the encapsulated HTTP response.
    pub fn http_header(&self, name: &str) -> Option<String> {
        self.http_head.as_ref()?.lines().skip(1).find_map(|line| {
            let (n, v) = line.split_once(':')?;
            n.trim()
                .eq_ignore_ascii_case(name)
                .then(|| v.trim().to_string())
        })
    }

    pub fn http_status_line(&self) -> Option<&str> {
        self.http_head.as_ref()?.lines().next()
    }
}

/// Minimal blocking ICAP client speaking to the server under test.
pub struct IcapClient {
    addr: String,
    reader: BufReader<TcpStream>,
}

impl IcapClient {
    pub fn connect(addr: &str) -> Self {
        let stream = TcpStream::connect(addr).expect("failed to connect to ICAP server");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();

        Self {
            addr: addr.to_string(),
            reader: BufReader::new(stream),
        }
    }

    fn icap_uri(&self, path: &str) -> String {
        format!("icap://{}{}", self.addr, path)
    }

    pub fn options(&mut self, path: &str) -> IcapReply {
        let msg = format!(
            "OPTIONS {} ICAP/1.0\r\nHost: {}\r\nEncapsulated: null-body=0\r\n\r\n",
            self.icap_uri(path),
            self.addr
        );
        self.send(msg.as_bytes())
    }

    /// REQMOD for a plain HTTP request in absolute form.
    pub fn reqmod(&mut self, path: &str, method: &str, target: &str, host: &str) -> IcapReply {
        let http = format!("{method} {target} HTTP/1.1\r\nHost: {host}\r\n\r\n");
        let msg = format!(
            "REQMOD {} ICAP/1.0\r\nHost: {}\r\nAllow: 204\r\nEncapsulated: req-hdr=0, null-body={}\r\n\r\n{http}",
            self.icap_uri(path),
            self.addr,
            http.len()
        );
        self.send(msg.as_bytes())
    }

    /// RESPMOD carrying a response header and a small chunked body.
    pub fn respmod(&mut self, path: &str, target: &str) -> IcapReply {
        let req = format!("GET {target} HTTP/1.1\r\nHost: example.com\r\n\r\n");
        let res = "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\n";
        let msg = format!(
            "RESPMOD {} ICAP/1.0\r\nHost: {}\r\nAllow: 204\r\nEncapsulated: req-hdr=0, res-hdr={}, res-body={}\r\n\r\n{req}{res}5\r\nhello\r\n0\r\n\r\n",
            self.icap_uri(path),
            self.addr,
            req.len(),
            req.len() + res.len()
        );
        self.send(msg.as_bytes())
    }

    /// Send raw bytes and read one response.
    pub fn send(&mut self, msg: &[u8]) -> IcapReply {
        self.reader
            .get_mut()
            .write_all(msg)
            .expect("failed to write ICAP request");
        self.read_reply()
    }

    fn read_reply(&mut self) -> IcapReply {
        let status_line = self.read_line();
        let status = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| panic!("bad ICAP status line: {status_line:?}"));

        let mut headers = Vec::new();
        loop {
            let line = self.read_line();
            if line.is_empty() {
                break;
            }
            let (name, value) = line.split_once(':').expect("malformed ICAP header");
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }

        let mut reply = IcapReply {
            status,
            headers,
            http_head: None,
        };

        // `res-hdr=0, null-body=N` means N bytes of HTTP response head follow.
        let head_len = reply
            .header("Encapsulated")
            .and_then(|v| v.split(',').find_map(|p| p.trim().strip_prefix("null-body=")))
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(0);

        if head_len > 0 {
            let mut head = vec![0u8; head_len];
            self.reader.read_exact(&mut head).expect("short HTTP head");
            reply.http_head = Some(String::from_utf8(head).expect("HTTP head is not UTF-8"));
        }

        reply
    }

    fn read_line(&mut self) -> String {
        let mut line = String::new();
        self.reader
            .read_line(&mut line)
            .expect("failed to read ICAP response");
        line.trim_end_matches(['\r', '\n']).to_string()
    }

    /// True once the server has closed the connection.
    pub fn is_closed(&mut self) -> bool {
        matches!(self.reader.fill_buf(), Ok([]))
    }
}
