//! IRC transport for the analytics core, backed by the `irc` crate.
//!
//! Everything wire-level lives here: registration (including SASL
//! PLAIN), translation of inbound traffic into core events, outbound
//! actions, and roster snapshots from the client's channel tracking.

pub mod connector;

pub use connector::{IrcConnector, IrcSettings, SaslCredentials};
