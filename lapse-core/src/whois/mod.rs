mod client;
mod parser;
mod servers;
mod shell;

pub use client::WhoisClient;
pub use parser::{
    extract_expiry, extract_registrar, is_unregistered, parse_labeled_fields, EXPIRY_KEYWORDS,
};
pub use servers::get_whois_server;
pub use shell::ShellWhoisClient;
