//! Collaboration workspace for table documents.
//!
//! Builds the service layer on top of `lattice-table`: per-table editing
//! sessions with client fan-out, a registry that owns the live sessions,
//! and the request/response plumbing for generated fills.

pub mod registry;
pub mod session;
pub mod suggest;

pub use registry::SessionRegistry;
pub use session::{SessionBroadcast, SessionClient, TableSession};
pub use suggest::{apply_response, parse_response, SuggestError, SuggestionRequest};
