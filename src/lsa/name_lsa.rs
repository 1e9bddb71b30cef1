use chrono::{DateTime, Utc};
use std::fmt;

use super::LsaHeader;
use crate::name::Name;
use crate::network::NamePrefixList;
use crate::tlv::{self, types, Block, DecodeError, Encoder};

/// Advertises the name prefixes reachable through the origin router.
#[derive(Debug, Clone, PartialEq)]
pub struct NameLsa {
    pub header: LsaHeader,
    pub prefixes: NamePrefixList,
}

impl NameLsa {
    pub fn new(origin_router: Name, seq_no: u64, expiration: DateTime<Utc>, prefixes: NamePrefixList) -> Self {
        Self {
            header: LsaHeader::new(origin_router, seq_no, expiration),
            prefixes,
        }
    }

    pub fn add_name(&mut self, name: Name) -> bool {
        self.prefixes.insert(name)
    }

    pub fn remove_name(&mut self, name: &Name) -> bool {
        self.prefixes.remove(name)
    }

    /// `NameLsa := 137 { Lsa | Name* }`
    pub fn wire_encode(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        enc.append_encoded(&self.header.wire_encode());
        for prefix in &self.prefixes {
            enc.append_encoded(&prefix.wire_encode());
        }
        enc.finish(types::NAME_LSA)
    }

    pub fn wire_decode(block: Block<'_>) -> Result<Self, DecodeError> {
        let block = block.expect_type(types::NAME_LSA)?;
        let mut elements = block.elements();
        let header = LsaHeader::wire_decode(elements.expect_block(types::LSA, "NameLsa.Lsa")?)?;
        let mut prefixes = NamePrefixList::new();
        while !elements.is_empty() {
            prefixes.insert(Name::wire_decode(elements.read_block()?)?);
        }
        Ok(Self { header, prefixes })
    }

    pub fn from_wire(buf: &[u8]) -> Result<Self, DecodeError> {
        Self::wire_decode(tlv::decode_single(buf, types::NAME_LSA)?)
    }
}

impl fmt::Display for NameLsa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "NameLsa: {}", self.header)?;
        for (i, prefix) in self.prefixes.iter().enumerate() {
            writeln!(f, "  name {}: {}", i, prefix)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_wire_round_trip() {
        let exp = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap() + chrono::Duration::microseconds(678_901);
        let prefixes: NamePrefixList = ["/ndn/edu/a", "/ndn/edu/b"].iter().map(|n| Name::from(*n)).collect();
        let lsa = NameLsa::new(Name::from("/ndn/site/r1"), 12, exp, prefixes);

        let decoded = NameLsa::from_wire(&lsa.wire_encode()).unwrap();
        assert_eq!(decoded, lsa);
    }

    #[test]
    fn test_empty_prefix_list() {
        let lsa = NameLsa::new(Name::from("/r1"), 1, Utc::now(), NamePrefixList::new());
        let decoded = NameLsa::from_wire(&lsa.wire_encode()).unwrap();
        assert!(decoded.prefixes.is_empty());
    }

    #[test]
    fn test_missing_header() {
        let wire = Encoder::new().append_encoded(&Name::from("/a").wire_encode()).finish(types::NAME_LSA);
        assert_eq!(NameLsa::from_wire(&wire).unwrap_err(), DecodeError::MissingField("NameLsa.Lsa"));
    }
}
