use chrono::{DateTime, Utc};
use std::fmt;

use super::LsaHeader;
use crate::name::Name;
use crate::network::{AdjacencyList, Adjacent};
use crate::tlv::{self, types, Block, DecodeError, Encoder};

/// Advertises the origin router's active links.
#[derive(Debug, Clone)]
pub struct AdjLsa {
    pub header: LsaHeader,
    pub adjacencies: AdjacencyList,
}

impl AdjLsa {
    /// Only the active neighbors of `adjacencies` are advertised.
    pub fn new(origin_router: Name, seq_no: u64, expiration: DateTime<Utc>, adjacencies: &AdjacencyList) -> Self {
        Self {
            header: LsaHeader::new(origin_router, seq_no, expiration),
            adjacencies: adjacencies.active_only(),
        }
    }

    pub fn is_equal_content(&self, other: &AdjLsa) -> bool {
        self.adjacencies.is_equal_content(&other.adjacencies)
    }

    pub fn link_count(&self) -> usize {
        self.adjacencies.len()
    }

    /// `AdjLsa := 131 { Lsa | Adjacency* }`
    pub fn wire_encode(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        enc.append_encoded(&self.header.wire_encode());
        for adjacent in &self.adjacencies {
            enc.append_encoded(&adjacent.wire_encode());
        }
        enc.finish(types::ADJACENCY_LSA)
    }

    pub fn wire_decode(block: Block<'_>) -> Result<Self, DecodeError> {
        let block = block.expect_type(types::ADJACENCY_LSA)?;
        let mut elements = block.elements();
        let header = LsaHeader::wire_decode(elements.expect_block(types::LSA, "AdjLsa.Lsa")?)?;
        let mut adjacencies = AdjacencyList::new();
        while !elements.is_empty() {
            adjacencies.insert(Adjacent::wire_decode(elements.read_block()?)?);
        }
        Ok(Self { header, adjacencies })
    }

    pub fn from_wire(buf: &[u8]) -> Result<Self, DecodeError> {
        Self::wire_decode(tlv::decode_single(buf, types::ADJACENCY_LSA)?)
    }
}

impl PartialEq for AdjLsa {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header && self.is_equal_content(other)
    }
}

impl fmt::Display for AdjLsa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "AdjLsa: {} links={}", self.header, self.link_count())?;
        for (i, adjacent) in self.adjacencies.iter().enumerate() {
            writeln!(f, "  adjacent {}: {} uri={} cost={}", i, adjacent.name, adjacent.face_uri, adjacent.link_cost)?;
        }
        Ok(())
    }
}
