//! Remote blacklist registry: transport seam, HTTP implementation, classification client.

mod client;
mod http;
pub mod import;
mod transport;

pub use client::{RegistryClient, RegistryError, CONTENT_FILTER_LIMIT};
pub use http::HttpRegistryTransport;
pub use import::{import_entries, parse_entries, ImportError, ImportSummary};
pub use transport::{CheckRequest, EntryQuery, RegistryEnvelope, RegistryTransport, TransportError};
