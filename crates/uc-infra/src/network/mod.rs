mod ndjson_command_port;

pub use ndjson_command_port::{NdjsonCommandPort, OutboundCommand};
