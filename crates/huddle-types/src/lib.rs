//! Shared wire types for the Huddle HTTP API.

pub mod api;
