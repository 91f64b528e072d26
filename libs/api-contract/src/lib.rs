//! Response contract shared by every HTTP surface of the gateway.
//!
//! - [`envelope`]: the outcome-tagged `Envelope` every endpoint answers with.
//! - [`page`]: bounded pages with navigation metadata.
//! - [`validation`]: the gate that turns field errors into a `400` before the handler runs.
//! - [`reply`]: status codes and JSON/XML negotiation for envelopes.

pub mod envelope;
pub mod error;
pub mod page;
pub mod reply;
pub mod validation;
pub mod xml;

pub use envelope::{
    Envelope, NoPayload, NotFoundPolicy, Outcome, UntypedEnvelope, VALIDATION_ERROR_MESSAGE,
};
pub use error::{PageError, RenderError, UnknownOutcome};
pub use page::{CountModel, Page, PageQuery, PageRequest};
pub use reply::{AcceptHeader, MediaType, Reply};
pub use validation::{classify, validation_gate, FieldErrors, GateDecision, ModelState};
