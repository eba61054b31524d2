//! gepetto: queries a large language model about decompiled functions.
//!
//! The crate is host-agnostic. A disassembler integration implements the
//! traits in [`host`], calls [`plugin_entry`] once, and drives the returned
//! [`Plugin`] through `init` and `term`. The `gepetto` binary is one such
//! integration: a console host over pseudocode files.

pub mod actions;
pub mod config;
pub mod constants;
pub mod error;
pub mod host;
pub mod models;
pub mod plugin;
pub mod provider;

#[cfg(test)]
mod testing;

pub use plugin::{plugin_entry, plugin_entry_with, Plugin, PluginStatus};
