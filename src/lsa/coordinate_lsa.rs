use chrono::{DateTime, Utc};
use std::fmt;

use super::LsaHeader;
use crate::name::Name;
use crate::tlv::{self, types, Block, DecodeError, Encoder};

/// Advertises the origin router's position in hyperbolic space.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateLsa {
    pub header: LsaHeader,
    pub radius: f64,
    pub angles: Vec<f64>,
}

impl CoordinateLsa {
    pub fn new(origin_router: Name, seq_no: u64, expiration: DateTime<Utc>, radius: f64, angles: Vec<f64>) -> Self {
        Self {
            header: LsaHeader::new(origin_router, seq_no, expiration),
            radius,
            angles,
        }
    }

    pub fn is_equal_content(&self, other: &CoordinateLsa) -> bool {
        (self.radius - other.radius).abs() < f64::EPSILON
            && self.angles.len() == other.angles.len()
            && self
                .angles
                .iter()
                .zip(&other.angles)
                .all(|(a, b)| (a - b).abs() < f64::EPSILON)
    }

    /// `CoordinateLsa := 133 { Lsa | 135 radius | 136 angle+ }`
    pub fn wire_encode(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        enc.append_encoded(&self.header.wire_encode())
            .append_f64(types::HYPERBOLIC_RADIUS, self.radius);
        for angle in &self.angles {
            enc.append_f64(types::HYPERBOLIC_ANGLE, *angle);
        }
        enc.finish(types::COORDINATE_LSA)
    }

    pub fn wire_decode(block: Block<'_>) -> Result<Self, DecodeError> {
        let block = block.expect_type(types::COORDINATE_LSA)?;
        let mut elements = block.elements();
        let header = LsaHeader::wire_decode(elements.expect_block(types::LSA, "CoordinateLsa.Lsa")?)?;
        let radius = elements
            .expect_block(types::HYPERBOLIC_RADIUS, "CoordinateLsa.Radius")?
            .as_f64()?;
        let mut angles = Vec::new();
        while !elements.is_empty() {
            angles.push(elements.read_block()?.expect_type(types::HYPERBOLIC_ANGLE)?.as_f64()?);
        }
        if angles.is_empty() {
            return Err(DecodeError::MissingField("CoordinateLsa.Angle"));
        }
        Ok(Self { header, radius, angles })
    }

    pub fn from_wire(buf: &[u8]) -> Result<Self, DecodeError> {
        Self::wire_decode(tlv::decode_single(buf, types::COORDINATE_LSA)?)
    }
}

impl fmt::Display for CoordinateLsa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CoordinateLsa: {}", self.header)?;
        writeln!(f, "  radius: {}", self.radius)?;
        writeln!(f, "  angles: {:?}", self.angles)
    }
}
