//! NDN names and packets
//!
//! Interest and Data are treated as opaque named messages. The only structure
//! the strategies rely on is the hierarchical name, the Interest nonce, and a
//! small set of tags that ride along hop by hop.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::identity::NodeId;

/// Hierarchical content name such as `/ustc/video/3`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Name {
    components: Vec<String>,
}

impl Name {
    /// The root name `/`
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a name from components
    pub fn from_components<I, S>(components: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let components: Vec<String> = components.into_iter().map(Into::into).collect();
        for c in &components {
            if c.is_empty() || c.contains('/') {
                return Err(CoreError::InvalidComponent(c.clone()));
            }
        }
        Ok(Self { components })
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Check if this is the root name
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// First `n` components of this name
    pub fn prefix(&self, n: usize) -> Name {
        Name {
            components: self.components.iter().take(n).cloned().collect(),
        }
    }

    /// Check if `self` is a prefix of (or equal to) `other`
    pub fn is_prefix_of(&self, other: &Name) -> bool {
        self.components.len() <= other.components.len()
            && self
                .components
                .iter()
                .zip(other.components.iter())
                .all(|(a, b)| a == b)
    }

    /// Append one component
    pub fn append(&self, component: impl Into<String>) -> Result<Name, CoreError> {
        let component = component.into();
        if component.is_empty() || component.contains('/') {
            return Err(CoreError::InvalidComponent(component));
        }
        let mut components = self.components.clone();
        components.push(component);
        Ok(Name { components })
    }
}

impl FromStr for Name {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.starts_with('/') {
            return Err(CoreError::InvalidName(s.to_string()));
        }
        let components = s
            .split('/')
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        Ok(Self { components })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }
        for c in &self.components {
            write!(f, "/{}", c)?;
        }
        Ok(())
    }
}

/// Metadata stamped on a packet and readable by every node it transits
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tags {
    /// Interest belongs to a content-discovery flood
    pub discovery: bool,
    /// Node that started the discovery flood
    pub requester: Option<NodeId>,
    /// Node whose application answered a discovery Interest
    pub provider: Option<NodeId>,
    /// Relay picked by the previous hop to carry the Interest down the road
    pub designated_ahead: Option<NodeId>,
    /// Relay picked by the previous hop to carry the Interest up the road
    pub designated_behind: Option<NodeId>,
}

impl Tags {
    /// Check if `node` was picked as a relay in either direction
    pub fn is_designated(&self, node: NodeId) -> bool {
        self.designated_ahead == Some(node) || self.designated_behind == Some(node)
    }
}

/// Interest packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interest {
    pub name: Name,
    pub nonce: u32,
    pub lifetime: Duration,
    pub tags: Tags,
}

impl Interest {
    /// Default Interest lifetime
    pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(2);

    pub fn new(name: Name, nonce: u32) -> Self {
        Self {
            name,
            nonce,
            lifetime: Self::DEFAULT_LIFETIME,
            tags: Tags::default(),
        }
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Check if this Interest is part of a discovery flood
    pub fn is_discovery(&self) -> bool {
        self.tags.discovery
    }
}

/// Data packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data {
    pub name: Name,
    pub payload_size: usize,
    pub tags: Tags,
}

impl Data {
    pub fn new(name: Name, payload_size: usize) -> Self {
        Self {
            name,
            payload_size,
            tags: Tags::default(),
        }
    }

    /// Check if this Data can satisfy an Interest for `name`
    pub fn satisfies(&self, name: &Name) -> bool {
        name.is_prefix_of(&self.name)
    }
}
