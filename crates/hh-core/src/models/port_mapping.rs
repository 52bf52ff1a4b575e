use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::{Mapping, Value};

static BARE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());

static SHORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^((?:\d{1,3}\.){3}\d{1,3}:)?(\d+):(\d+)$").unwrap());

static BIND_ONLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d{1,3}\.){3}\d{1,3}::\d+$").unwrap());

/// One port-mapping entry from a compose service, classified into the three
/// syntaxes we know how to rewrite safely. Everything else is rejected so a
/// deploy can never silently mis-map a port:
///
/// - `3000`            bare port (int or string)
/// - `"8000:8000"`     short syntax, optional `127.0.0.1:` bind prefix
/// - `{target: 1240}`  long syntax
///
/// Not supported, and fatal for the whole deploy: ranges (`"3000-3005"`,
/// `"9090-9091:8080-8081"`), protocol suffixes (`"6060:6060/udp"`), and
/// bind-address-only forms (`"127.0.0.1::5000"`).
#[derive(Debug, Clone, PartialEq)]
pub enum PortMapping {
    Bare(u16),
    Short {
        bind_address: Option<String>,
        host: u16,
        container: u16,
    },
    Long {
        target: u16,
        published: Option<u16>,
        /// Long-syntax keys other than `target`/`published`, kept verbatim.
        extra: Mapping,
    },
}

impl PortMapping {
    /// Classify a raw YAML entry. The error is a human-readable reason; the
    /// caller attaches the service name and the offending entry.
    pub fn parse(value: &Value) -> std::result::Result<Self, &'static str> {
        match value {
            Value::Number(n) => {
                let port = n
                    .as_u64()
                    .and_then(|p| u16::try_from(p).ok())
                    .ok_or("port is not a valid u16")?;
                Ok(PortMapping::Bare(port))
            }
            Value::String(s) => Self::parse_str(s),
            Value::Mapping(m) => Self::parse_long(m),
            _ => Err("unsupported value type (expected number, string, or mapping)"),
        }
    }

    fn parse_str(s: &str) -> std::result::Result<Self, &'static str> {
        if BARE_RE.is_match(s) {
            let port = s.parse::<u16>().map_err(|_| "port is not a valid u16")?;
            return Ok(PortMapping::Bare(port));
        }

        if let Some(caps) = SHORT_RE.captures(s) {
            let host = caps[2].parse::<u16>().map_err(|_| "port is not a valid u16")?;
            let container = caps[3].parse::<u16>().map_err(|_| "port is not a valid u16")?;
            return Ok(PortMapping::Short {
                bind_address: caps
                    .get(1)
                    .map(|m| m.as_str().trim_end_matches(':').to_string()),
                host,
                container,
            });
        }

        if s.contains('/') {
            return Err("protocol suffixes are not supported");
        }
        if s.contains('-') {
            return Err("port ranges are not supported");
        }
        if BIND_ONLY_RE.is_match(s) {
            return Err("bind-address-only forms are not supported");
        }
        Err("invalid short port mapping")
    }

    fn parse_long(m: &Mapping) -> std::result::Result<Self, &'static str> {
        let target = m
            .get("target")
            .ok_or("long syntax requires a target port")?;
        let target = target
            .as_u64()
            .and_then(|p| u16::try_from(p).ok())
            .ok_or("long syntax requires an integer target port")?;

        let published = m
            .get("published")
            .and_then(Value::as_u64)
            .and_then(|p| u16::try_from(p).ok());

        let mut extra = Mapping::new();
        for (k, v) in m {
            if k.as_str() == Some("target") || k.as_str() == Some("published") {
                continue;
            }
            extra.insert(k.clone(), v.clone());
        }

        Ok(PortMapping::Long {
            target,
            published,
            extra,
        })
    }

    /// The container-side port this entry maps to. Never changed by a rewrite.
    pub fn container_port(&self) -> u16 {
        match self {
            PortMapping::Bare(port) => *port,
            PortMapping::Short { container, .. } => *container,
            PortMapping::Long { target, .. } => *target,
        }
    }

    /// Re-emit this entry with `host_port` as the published side, preserving
    /// the original syntactic variant.
    pub fn rewritten(&self, host_port: u16) -> Value {
        match self {
            PortMapping::Bare(container) => Value::from(format!("{host_port}:{container}")),
            PortMapping::Short {
                bind_address,
                container,
                ..
            } => match bind_address {
                Some(bind) => Value::from(format!("{bind}:{host_port}:{container}")),
                None => Value::from(format!("{host_port}:{container}")),
            },
            PortMapping::Long { target, extra, .. } => {
                let mut m = Mapping::new();
                m.insert(Value::from("target"), Value::from(*target));
                m.insert(Value::from("published"), Value::from(host_port));
                for (k, v) in extra {
                    m.insert(k.clone(), v.clone());
                }
                Value::Mapping(m)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bare_number() {
        let mapping = PortMapping::parse(&Value::from(3000)).unwrap();
        assert_eq!(mapping, PortMapping::Bare(3000));
        assert_eq!(mapping.container_port(), 3000);
        assert_eq!(mapping.rewritten(1025), Value::from("1025:3000"));
    }

    #[test]
    fn parse_bare_string() {
        let mapping = PortMapping::parse(&Value::from("3000")).unwrap();
        assert_eq!(mapping, PortMapping::Bare(3000));
    }

    #[test]
    fn parse_short_syntax() {
        let mapping = PortMapping::parse(&Value::from("8000:8000")).unwrap();
        assert_eq!(
            mapping,
            PortMapping::Short {
                bind_address: None,
                host: 8000,
                container: 8000,
            }
        );
        assert_eq!(mapping.rewritten(1026), Value::from("1026:8000"));
    }

    #[test]
    fn parse_short_syntax_with_bind_address() {
        let mapping = PortMapping::parse(&Value::from("127.0.0.1:8001:8001")).unwrap();
        assert_eq!(
            mapping,
            PortMapping::Short {
                bind_address: Some("127.0.0.1".to_string()),
                host: 8001,
                container: 8001,
            }
        );
        assert_eq!(mapping.rewritten(2000), Value::from("127.0.0.1:2000:8001"));
    }

    #[test]
    fn parse_long_syntax() {
        let yaml = "target: 22\npublished: 49100\nmode: host\n";
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        let mapping = PortMapping::parse(&value).unwrap();
        match &mapping {
            PortMapping::Long {
                target,
                published,
                extra,
            } => {
                assert_eq!(*target, 22);
                assert_eq!(*published, Some(49100));
                assert_eq!(extra.get("mode"), Some(&Value::from("host")));
            }
            other => panic!("expected long syntax, got {other:?}"),
        }
        assert_eq!(mapping.container_port(), 22);

        let rewritten = mapping.rewritten(1027);
        let m = rewritten.as_mapping().unwrap();
        assert_eq!(m.get("target"), Some(&Value::from(22)));
        assert_eq!(m.get("published"), Some(&Value::from(1027)));
        assert_eq!(m.get("mode"), Some(&Value::from("host")));
    }

    #[test]
    fn reject_port_ranges() {
        for entry in [
            "3000-3005",
            "9090-9091:8080-8081",
            "127.0.0.1:5000-5010:5000-5010",
            "12400-12500:1240",
        ] {
            let err = PortMapping::parse(&Value::from(entry)).unwrap_err();
            assert_eq!(err, "port ranges are not supported", "entry {entry}");
        }
    }

    #[test]
    fn reject_protocol_suffix() {
        let err = PortMapping::parse(&Value::from("6060:6060/udp")).unwrap_err();
        assert_eq!(err, "protocol suffixes are not supported");
    }

    #[test]
    fn reject_bind_address_only() {
        let err = PortMapping::parse(&Value::from("127.0.0.1::5000")).unwrap_err();
        assert_eq!(err, "bind-address-only forms are not supported");
    }

    #[test]
    fn reject_long_syntax_without_target() {
        let yaml = "published: 8080\n";
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        assert!(PortMapping::parse(&value).is_err());
    }

    #[test]
    fn reject_other_types() {
        assert!(PortMapping::parse(&Value::from(true)).is_err());
        assert!(PortMapping::parse(&Value::Sequence(vec![])).is_err());
    }

    #[test]
    fn reject_out_of_range_port() {
        assert!(PortMapping::parse(&Value::from("70000")).is_err());
        assert!(PortMapping::parse(&Value::from(70000)).is_err());
    }
}
