//! Attribute/event/command path descriptors and the path set builder.
//!
//! Paths address a datum on a remote node as endpoint/cluster/item triples.
//! Each field may carry its reserved wildcard value; wildcard semantics are
//! interpreted by the remote device, not validated here.

use crate::error::InvalidArgument;

pub const WILDCARD_ENDPOINT: u16 = 0xFFFF;
pub const WILDCARD_CLUSTER: u32 = 0xFFFF_FFFF;
pub const WILDCARD_ATTRIBUTE: u32 = 0xFFFF_FFFF;
pub const WILDCARD_EVENT: u32 = 0xFFFF_FFFF;

/// Path of one attribute on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributePath {
    pub endpoint_id: u16,
    pub cluster_id: u32,
    pub attribute_id: u32,
}

/// Path of one event source on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventPath {
    pub endpoint_id: u16,
    pub cluster_id: u32,
    pub event_id: u32,
}

/// Path of one cluster command on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPath {
    pub endpoint_id: u16,
    pub cluster_id: u32,
    pub command_id: u32,
}

/// Owned, order-preserving set of attribute and/or event paths for one
/// subscribe request.
#[derive(Debug, Clone, Default)]
pub struct PathSet {
    attributes: Vec<AttributePath>,
    events: Vec<EventPath>,
}

impl PathSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path set with a single attribute path.
    pub fn single_attribute(endpoint_id: u16, cluster_id: u32, attribute_id: u32) -> Self {
        Self {
            attributes: vec![AttributePath {
                endpoint_id,
                cluster_id,
                attribute_id,
            }],
            events: Vec::new(),
        }
    }

    /// Path set with a single event path.
    pub fn single_event(endpoint_id: u16, cluster_id: u32, event_id: u32) -> Self {
        Self {
            attributes: Vec::new(),
            events: vec![EventPath {
                endpoint_id,
                cluster_id,
                event_id,
            }],
        }
    }

    /// Build attribute paths from three parallel arrays. The arrays must
    /// have identical nonzero length; otherwise nothing is constructed.
    pub fn attributes_from_parallel(
        endpoints: &[u16],
        clusters: &[u32],
        attributes: &[u32],
    ) -> Result<Self, InvalidArgument> {
        check_parallel(endpoints.len(), clusters.len(), attributes.len())?;
        let attributes = endpoints
            .iter()
            .zip(clusters)
            .zip(attributes)
            .map(|((&endpoint_id, &cluster_id), &attribute_id)| AttributePath {
                endpoint_id,
                cluster_id,
                attribute_id,
            })
            .collect();
        Ok(Self {
            attributes,
            events: Vec::new(),
        })
    }

    /// Build event paths from three parallel arrays. Same length rules as
    /// [PathSet::attributes_from_parallel].
    pub fn events_from_parallel(
        endpoints: &[u16],
        clusters: &[u32],
        events: &[u32],
    ) -> Result<Self, InvalidArgument> {
        check_parallel(endpoints.len(), clusters.len(), events.len())?;
        let events = endpoints
            .iter()
            .zip(clusters)
            .zip(events)
            .map(|((&endpoint_id, &cluster_id), &event_id)| EventPath {
                endpoint_id,
                cluster_id,
                event_id,
            })
            .collect();
        Ok(Self {
            attributes: Vec::new(),
            events,
        })
    }

    pub fn push_attribute(&mut self, path: AttributePath) {
        self.attributes.push(path);
    }

    pub fn push_event(&mut self, path: EventPath) {
        self.events.push(path);
    }

    /// Append all paths of `other`, preserving order.
    pub fn merge(&mut self, other: PathSet) {
        self.attributes.extend(other.attributes);
        self.events.extend(other.events);
    }

    pub fn attributes(&self) -> &[AttributePath] {
        &self.attributes
    }

    pub fn events(&self) -> &[EventPath] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.attributes.len() + self.events.len()
    }
}

fn check_parallel(a: usize, b: usize, c: usize) -> Result<(), InvalidArgument> {
    if a != b || a != c {
        return Err(InvalidArgument(format!(
            "path arrays differ in length: {}/{}/{}",
            a, b, c
        )));
    }
    if a == 0 {
        return Err(InvalidArgument("path arrays are empty".to_owned()));
    }
    Ok(())
}
