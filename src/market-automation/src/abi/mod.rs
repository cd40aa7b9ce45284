//! Solidity ABI bindings for every contract a batch touches.
//!
//! The automation bindings carry the fixed task schema; the market bindings cover the
//! collaborator primitives (token, market maker, conditional tokens, question registry).

pub mod automation;
pub mod market;
