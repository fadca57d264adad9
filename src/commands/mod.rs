//! The `commands` module is the text front of the client.
//!
//! It defines the command protocol (whitespace words or JSON objects tagged
//! by `type`) and the dispatcher that runs each command against the profile
//! store, the session and the background workers.

pub mod dispatcher;
pub mod message;

pub use dispatcher::{Dispatcher, Reply};
pub use message::{Command, ParseError, parse_line};
