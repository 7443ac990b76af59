//! UniClipboard device pairing console.
//!
//! Bootstrap (configuration, tracing) and the NDJSON console that drives the
//! pairing coordinator and the first-run setup flow.

pub mod bootstrap;
pub mod console;
