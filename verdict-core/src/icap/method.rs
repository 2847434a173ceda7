use std::fmt::{Display, Formatter};

/// ICAP request method.
///
/// Unknown methods are kept rather than rejected so the dispatcher can answer
/// them with `405 Method Not Allowed`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IcapMethod {
    Options,
    ReqMod,
    RespMod,
    Other(String),
}

impl IcapMethod {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "OPTIONS" => IcapMethod::Options,
            "REQMOD" => IcapMethod::ReqMod,
            "RESPMOD" => IcapMethod::RespMod,
            other => IcapMethod::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            IcapMethod::Options => "OPTIONS",
            IcapMethod::ReqMod => "REQMOD",
            IcapMethod::RespMod => "RESPMOD",
            IcapMethod::Other(other) => other.as_str(),
        }
    }
}

impl Display for IcapMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
