//! Hierarchical names used for routers, name prefixes and LSA keys.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crate::tlv::{self, types, Block, DecodeError, Encoder};

/// A name such as `/ndn/memphis/router1`.
///
/// Ordering follows the NDN canonical order: components compare by length,
/// then byte-wise; a proper prefix sorts before its extensions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Name {
    components: Vec<String>,
}

impl Name {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_components<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            components: components
                .into_iter()
                .map(Into::into)
                .filter(|c: &String| !c.is_empty())
                .collect(),
        }
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn append(mut self, component: impl Into<String>) -> Self {
        let component = component.into();
        if !component.is_empty() {
            self.components.push(component);
        }
        self
    }

    pub fn append_name(mut self, other: &Name) -> Self {
        self.components.extend(other.components.iter().cloned());
        self
    }

    pub fn is_prefix_of(&self, other: &Name) -> bool {
        self.len() <= other.len() && self.components.iter().zip(&other.components).all(|(a, b)| a == b)
    }

    pub fn wire_encode(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        for component in &self.components {
            enc.append(types::NAME_COMPONENT, component.as_bytes());
        }
        enc.finish(types::NAME)
    }

    pub fn wire_decode(block: Block<'_>) -> Result<Self, DecodeError> {
        let block = block.expect_type(types::NAME)?;
        let mut reader = block.elements();
        let mut components = Vec::new();
        while !reader.is_empty() {
            let component = reader.read_block()?.expect_type(types::NAME_COMPONENT)?.as_str()?;
            // Same normalization as `append`.
            if !component.is_empty() {
                components.push(component.to_string());
            }
        }
        Ok(Self { components })
    }

    pub fn from_wire(buf: &[u8]) -> Result<Self, DecodeError> {
        Self::wire_decode(tlv::decode_single(buf, types::NAME)?)
    }
}

fn compare_component(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.as_bytes().cmp(b.as_bytes()))
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.components.iter().zip(&other.components) {
            match compare_component(a, b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        self.len().cmp(&other.len())
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return f.write_str("/");
        }
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

impl FromStr for Name {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_components(s.split('/')))
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Self::from_components(s.split('/'))
    }
}

impl Serialize for Name {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let uri = String::deserialize(deserializer)?;
        Ok(Name::from(uri.as_str()))
    }
}
