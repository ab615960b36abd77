//! Slack transport: Web API calls plus the Socket Mode event stream.

mod events;
mod socket;
mod web;

pub use events::{Envelope, parse_envelope};
pub use web::SlackClient;
