//! Link-layer and network address parsing.
//!
//! `MacAddress` accepts the common EUI-48 spellings:
//!
//! - `AA:BB:CC:DD:EE:FF` (UNIX, octets may drop a leading zero: `a:b:c:d:e:f`)
//! - `AA-BB-CC-DD-EE-FF` (IEEE / Windows)
//! - `AABB.CCDD.EEFF` (Cisco)
//! - `AABBCCDDEEFF` (bare)
//!
//! It always displays in the canonical upper-case colon form.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ProtocolError, Result};

/// Length of an EUI-48 hardware address in bytes.
pub const MAC_ADDRESS_LENGTH: usize = 6;

/// A 48-bit hardware (MAC) address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; MAC_ADDRESS_LENGTH]);

impl MacAddress {
    /// Creates a MAC address from raw bytes.
    pub fn from_bytes(bytes: [u8; MAC_ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes of this address.
    pub fn as_bytes(&self) -> &[u8; MAC_ADDRESS_LENGTH] {
        &self.0
    }

    /// Parses a MAC address in any of the supported spellings.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let invalid = |reason: &str| ProtocolError::InvalidMacAddress {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid("address is empty"));
        }

        let separator = [':', '-', '.'].into_iter().find(|c| trimmed.contains(*c));

        let bytes = match separator {
            Some('.') => {
                let groups: Vec<&str> = trimmed.split('.').collect();
                if groups.len() != 3 || groups.iter().any(|g| g.len() != 4) {
                    return Err(invalid("dotted form must be three groups of 4 hex digits"));
                }
                parse_hex_run(&groups.concat()).ok_or_else(|| invalid("non-hex digit"))?
            }
            Some(sep) => {
                if trimmed.contains(|c: char| c != sep && !c.is_ascii_hexdigit()) {
                    return Err(invalid("mixed separators or non-hex digit"));
                }
                let groups: Vec<&str> = trimmed.split(sep).collect();
                if groups.len() != MAC_ADDRESS_LENGTH {
                    return Err(invalid("expected 6 octets"));
                }
                let mut bytes = [0u8; MAC_ADDRESS_LENGTH];
                for (slot, group) in bytes.iter_mut().zip(&groups) {
                    if group.is_empty() || group.len() > 2 {
                        return Err(invalid("each octet must be 1 or 2 hex digits"));
                    }
                    *slot = u8::from_str_radix(group, 16).map_err(|_| invalid("non-hex digit"))?;
                }
                bytes
            }
            None => {
                if trimmed.len() != MAC_ADDRESS_LENGTH * 2 {
                    return Err(invalid("expected 12 hex digits"));
                }
                parse_hex_run(trimmed).ok_or_else(|| invalid("non-hex digit"))?
            }
        };

        Ok(Self(bytes))
    }
}

/// Decodes exactly 12 hex digits into 6 bytes.
fn parse_hex_run(digits: &str) -> Option<[u8; MAC_ADDRESS_LENGTH]> {
    if digits.len() != MAC_ADDRESS_LENGTH * 2 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let mut bytes = [0u8; MAC_ADDRESS_LENGTH];
    for (i, slot) in bytes.iter_mut().enumerate() {
        *slot = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(bytes)
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Parses an IPv4 or IPv6 literal.
///
/// Host names are rejected; the target must be addressable without DNS.
pub fn parse_ip_address(input: &str) -> Result<IpAddr> {
    input
        .trim()
        .parse::<IpAddr>()
        .map_err(|e| ProtocolError::InvalidIpAddress {
            input: input.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPECTED: [u8; 6] = [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF];

    #[test]
    fn test_parse_colon_form() {
        let mac = MacAddress::parse("AA:BB:CC:DD:EE:FF").unwrap();
        assert_eq!(mac.as_bytes(), &EXPECTED);
    }

    #[test]
    fn test_parse_lowercase_and_hyphen() {
        let mac = MacAddress::parse("aa-bb-cc-dd-ee-ff").unwrap();
        assert_eq!(mac.as_bytes(), &EXPECTED);
    }

    #[test]
    fn test_parse_short_octets() {
        let mac = MacAddress::parse("0:1:2:a:b:c").unwrap();
        assert_eq!(mac.as_bytes(), &[0x00, 0x01, 0x02, 0x0A, 0x0B, 0x0C]);
    }

    #[test]
    fn test_parse_cisco_form() {
        let mac = MacAddress::parse("aabb.ccdd.eeff").unwrap();
        assert_eq!(mac.as_bytes(), &EXPECTED);
    }

    #[test]
    fn test_parse_bare_hex() {
        let mac = MacAddress::parse("aabbccddeeff").unwrap();
        assert_eq!(mac.as_bytes(), &EXPECTED);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for input in [
            "",
            "not a mac",
            "AA:BB:CC:DD:EE",
            "AA:BB:CC:DD:EE:FF:00",
            "AA:BB-CC:DD:EE:FF",
            "AAA:BB:CC:DD:EE:FF",
            "GG:BB:CC:DD:EE:FF",
            "aabb.ccdd.eef",
            "aabbccddeef",
            "AA::CC:DD:EE:FF",
            "+abbccddeeff",
            "+abb.ccdd.eeff",
            "+A:BB:CC:DD:EE:FF",
        ] {
            let result = MacAddress::parse(input);
            assert!(
                matches!(result, Err(ProtocolError::InvalidMacAddress { .. })),
                "expected rejection for {input:?}"
            );
        }
    }

    #[test]
    fn test_display_is_canonical() {
        let mac = MacAddress::parse("0a-0b-0c-0d-0e-0f").unwrap();
        assert_eq!(mac.to_string(), "0A:0B:0C:0D:0E:0F");
    }

    #[test]
    fn test_serde_as_string() {
        let mac = MacAddress::from_bytes(EXPECTED);
        let json = serde_json::to_string(&mac).unwrap();
        assert_eq!(json, "\"AA:BB:CC:DD:EE:FF\"");

        let err = serde_json::from_str::<MacAddress>("\"nope\"");
        assert!(err.is_err());
    }

    #[test]
    fn test_parse_ip_v4_and_v6() {
        assert_eq!(
            parse_ip_address("10.0.0.5").unwrap(),
            "10.0.0.5".parse::<IpAddr>().unwrap()
        );
        assert!(parse_ip_address("fe80::1").unwrap().is_ipv6());
    }

    #[test]
    fn test_parse_ip_rejects_hostnames() {
        let err = parse_ip_address("my-pc.local").unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidIpAddress { .. }));
        assert!(parse_ip_address("300.1.1.1").is_err());
    }
}
