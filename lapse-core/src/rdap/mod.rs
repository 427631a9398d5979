mod client;
mod types;

pub use client::RdapClient;
pub use types::{RdapEntity, RdapEvent, RdapResponse, EXPIRATION_ACTIONS};
