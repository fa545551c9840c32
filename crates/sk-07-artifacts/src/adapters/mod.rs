//! Adapters: subprocess transport for conformance packs.

pub mod subprocess;
