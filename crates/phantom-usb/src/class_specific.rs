//! Class-specific descriptors (CS_INTERFACE / CS_ENDPOINT).
//!
//! Both wrap an opaque payload with a two byte header. Callers supply fully formed payloads,
//! e.g. CDC functional descriptors starting with their subtype byte.

use crate::descriptor::{DESC_CS_ENDPOINT, DESC_CS_INTERFACE};
use crate::mutation::{Mutator, Stage};

/// Largest payload whose total length still fits `bLength`.
const MAX_PAYLOAD: usize = u8::MAX as usize - 2;

fn encode(descriptor_type: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 2);
    out.push((payload.len() + 2) as u8);
    out.push(descriptor_type);
    out.extend_from_slice(payload);
    out
}

fn clamp(mut payload: Vec<u8>) -> Vec<u8> {
    if payload.len() > MAX_PAYLOAD {
        tracing::warn!(len = payload.len(), "class-specific payload truncated");
        payload.truncate(MAX_PAYLOAD);
    }
    payload
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CsInterfaceDescriptor {
    payload: Vec<u8>,
}

impl CsInterfaceDescriptor {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: clamp(payload.into()),
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn get_descriptor(&self, m: &mut Mutator<'_>) -> Vec<u8> {
        m.mutable(Stage::CsInterfaceDescriptor, |_| {
            encode(DESC_CS_INTERFACE, &self.payload)
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CsEndpointDescriptor {
    payload: Vec<u8>,
}

impl CsEndpointDescriptor {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: clamp(payload.into()),
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn get_descriptor(&self, m: &mut Mutator<'_>) -> Vec<u8> {
        m.mutable(Stage::CsEndpointDescriptor, |_| {
            encode(DESC_CS_ENDPOINT, &self.payload)
        })
    }
}
