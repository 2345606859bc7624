//! Types and token formats shared by every BMessage crate.

pub mod constants;
pub mod invite;
pub mod session;

pub use invite::generate_invite_link;
pub use session::{SessionError, SessionToken};
