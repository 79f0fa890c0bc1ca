//! Core data types for the pricing engine

pub mod benchmark;
pub mod quote;
pub mod resource;
pub mod security;
