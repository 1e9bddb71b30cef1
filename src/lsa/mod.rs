//! Link-state advertisements: the common header, the three LSA kinds and
//! their TLV wire form.

pub mod adj_lsa;
pub mod coordinate_lsa;
pub mod name_lsa;

pub use adj_lsa::AdjLsa;
pub use coordinate_lsa::CoordinateLsa;
pub use name_lsa::NameLsa;

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::name::Name;
use crate::tlv::{types, Block, DecodeError, Encoder, Reader};

/// Wire form of the expiration time point, always UTC.
pub const EXPIRATION_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LsaType {
    Name,
    Adjacency,
    Coordinate,
}

impl LsaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LsaType::Name => "name",
            LsaType::Adjacency => "adjacency",
            LsaType::Coordinate => "coordinate",
        }
    }
}

impl fmt::Display for LsaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LsaType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(LsaType::Name),
            "adjacency" => Ok(LsaType::Adjacency),
            "coordinate" => Ok(LsaType::Coordinate),
            other => Err(anyhow::anyhow!("unknown LSA type: {}", other)),
        }
    }
}

/// Identity of an LSA in the database: one instance per origin and type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LsaKey {
    pub origin_router: Name,
    pub lsa_type: LsaType,
}

impl LsaKey {
    pub fn new(origin_router: Name, lsa_type: LsaType) -> Self {
        Self { origin_router, lsa_type }
    }

    /// `<origin>/<type>`
    pub fn to_name(&self) -> Name {
        self.origin_router.clone().append(self.lsa_type.as_str())
    }
}

impl fmt::Display for LsaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.origin_router, self.lsa_type)
    }
}

/// Fields shared by every LSA.
#[derive(Debug, Clone, PartialEq)]
pub struct LsaHeader {
    pub origin_router: Name,
    pub seq_no: u64,
    pub expiration: DateTime<Utc>,
}

impl LsaHeader {
    /// The expiration is truncated to microseconds, the precision it has on
    /// the wire.
    pub fn new(origin_router: Name, seq_no: u64, expiration: DateTime<Utc>) -> Self {
        Self {
            origin_router,
            seq_no,
            expiration: expiration.trunc_subsecs(6),
        }
    }

    pub fn set_expiration(&mut self, expiration: DateTime<Utc>) {
        self.expiration = expiration.trunc_subsecs(6);
    }

    /// `Lsa := 128 { Name | 130 seq | 139 expiration }`
    pub fn wire_encode(&self) -> Vec<u8> {
        let expiration = self.expiration.format(EXPIRATION_FORMAT).to_string();
        let mut enc = Encoder::new();
        enc.append_encoded(&self.origin_router.wire_encode())
            .append_u64(types::SEQUENCE_NUMBER, self.seq_no)
            .append_str(types::EXPIRATION_TIME, &expiration);
        enc.finish(types::LSA)
    }

    pub fn wire_decode(block: Block<'_>) -> Result<Self, DecodeError> {
        let block = block.expect_type(types::LSA)?;
        let mut elements = block.elements();
        let origin_router = Name::wire_decode(elements.expect_block(types::NAME, "Lsa.OriginRouter")?)?;
        let seq_no = elements.expect_block(types::SEQUENCE_NUMBER, "Lsa.SequenceNumber")?.as_u64()?;
        let raw = elements.expect_block(types::EXPIRATION_TIME, "Lsa.ExpirationTime")?.as_str()?;
        let expiration = NaiveDateTime::parse_from_str(raw, EXPIRATION_FORMAT)
            .map_err(|_| DecodeError::InvalidTimestamp(raw.to_string()))?
            .and_utc();
        elements.expect_end()?;
        Ok(Self::new(origin_router, seq_no, expiration))
    }
}

impl fmt::Display for LsaHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "origin={} seq={} expires={}",
            self.origin_router,
            self.seq_no,
            self.expiration.format(EXPIRATION_FORMAT)
        )
    }
}

/// An LSA of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Lsa {
    Name(NameLsa),
    Adjacency(AdjLsa),
    Coordinate(CoordinateLsa),
}

impl Lsa {
    pub fn lsa_type(&self) -> LsaType {
        match self {
            Lsa::Name(_) => LsaType::Name,
            Lsa::Adjacency(_) => LsaType::Adjacency,
            Lsa::Coordinate(_) => LsaType::Coordinate,
        }
    }

    pub fn header(&self) -> &LsaHeader {
        match self {
            Lsa::Name(lsa) => &lsa.header,
            Lsa::Adjacency(lsa) => &lsa.header,
            Lsa::Coordinate(lsa) => &lsa.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut LsaHeader {
        match self {
            Lsa::Name(lsa) => &mut lsa.header,
            Lsa::Adjacency(lsa) => &mut lsa.header,
            Lsa::Coordinate(lsa) => &mut lsa.header,
        }
    }

    pub fn origin_router(&self) -> &Name {
        &self.header().origin_router
    }

    pub fn seq_no(&self) -> u64 {
        self.header().seq_no
    }

    pub fn expiration(&self) -> DateTime<Utc> {
        self.header().expiration
    }

    pub fn key(&self) -> LsaKey {
        LsaKey::new(self.origin_router().clone(), self.lsa_type())
    }

    /// Compares type-specific content, ignoring the header.
    pub fn is_equal_content(&self, other: &Lsa) -> bool {
        match (self, other) {
            (Lsa::Name(a), Lsa::Name(b)) => a.prefixes == b.prefixes,
            (Lsa::Adjacency(a), Lsa::Adjacency(b)) => a.is_equal_content(b),
            (Lsa::Coordinate(a), Lsa::Coordinate(b)) => a.is_equal_content(b),
            _ => false,
        }
    }

    pub fn wire_encode(&self) -> Vec<u8> {
        match self {
            Lsa::Name(lsa) => lsa.wire_encode(),
            Lsa::Adjacency(lsa) => lsa.wire_encode(),
            Lsa::Coordinate(lsa) => lsa.wire_encode(),
        }
    }

    /// Decodes any LSA kind from a buffer holding exactly one outer block.
    pub fn wire_decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(buf);
        let block = reader.read_block()?;
        reader.expect_end()?;
        match block.tlv_type {
            types::NAME_LSA => Ok(Lsa::Name(NameLsa::wire_decode(block)?)),
            types::ADJACENCY_LSA => Ok(Lsa::Adjacency(AdjLsa::wire_decode(block)?)),
            types::COORDINATE_LSA => Ok(Lsa::Coordinate(CoordinateLsa::wire_decode(block)?)),
            actual => Err(DecodeError::UnexpectedType {
                expected: types::NAME_LSA,
                actual,
            }),
        }
    }
}

impl fmt::Display for Lsa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lsa::Name(lsa) => fmt::Display::fmt(lsa, f),
            Lsa::Adjacency(lsa) => fmt::Display::fmt(lsa, f),
            Lsa::Coordinate(lsa) => fmt::Display::fmt(lsa, f),
        }
    }
}

impl From<NameLsa> for Lsa {
    fn from(lsa: NameLsa) -> Self {
        Lsa::Name(lsa)
    }
}

impl From<AdjLsa> for Lsa {
    fn from(lsa: AdjLsa) -> Self {
        Lsa::Adjacency(lsa)
    }
}

impl From<CoordinateLsa> for Lsa {
    fn from(lsa: CoordinateLsa) -> Self {
        Lsa::Coordinate(lsa)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_key_name() {
        let key = LsaKey::new(Name::from("/ndn/site/r1"), LsaType::Adjacency);
        assert_eq!(key.to_name(), Name::from("/ndn/site/r1/adjacency"));
        assert_eq!(key.to_string(), "/ndn/site/r1/adjacency");
    }

    #[test]
    fn test_lsa_type_strings() {
        for t in [LsaType::Name, LsaType::Adjacency, LsaType::Coordinate] {
            assert_eq!(t.as_str().parse::<LsaType>().unwrap(), t);
        }
        assert!("router".parse::<LsaType>().is_err());
    }

    #[test]
    fn test_header_truncates_to_microseconds() {
        let exp = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap() + chrono::Duration::nanoseconds(1_234_567);
        let header = LsaHeader::new(Name::from("/r1"), 7, exp);
        assert_eq!(header.expiration.timestamp_subsec_nanos(), 1_234_000);
    }

    #[test]
    fn test_header_wire_round_trip() {
        let exp = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap() + chrono::Duration::microseconds(42);
        let header = LsaHeader::new(Name::from("/ndn/r1"), 300, exp);
        let wire = header.wire_encode();
        let decoded = LsaHeader::wire_decode(crate::tlv::decode_single(&wire, types::LSA).unwrap()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_bad_timestamp() {
        let mut enc = Encoder::new();
        enc.append_encoded(&Name::from("/r1").wire_encode())
            .append_u64(types::SEQUENCE_NUMBER, 1)
            .append_str(types::EXPIRATION_TIME, "tomorrow");
        let wire = enc.finish(types::LSA);
        let err = LsaHeader::wire_decode(crate::tlv::decode_single(&wire, types::LSA).unwrap()).unwrap_err();
        assert_eq!(err, DecodeError::InvalidTimestamp("tomorrow".to_string()));
    }

    #[test]
    fn test_unknown_outer_type() {
        let wire = crate::tlv::encode_block(types::URI, b"x");
        assert!(matches!(Lsa::wire_decode(&wire), Err(DecodeError::UnexpectedType { actual: 141, .. })));
    }
}
