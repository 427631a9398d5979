use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Root server that answers `refer:` for any TLD.
pub const IANA_WHOIS_SERVER: &str = "whois.iana.org";

const KNOWN_SERVERS: &[(&str, &str)] = &[
    // Generic TLDs
    ("com", "whois.verisign-grs.com"),
    ("net", "whois.verisign-grs.com"),
    ("org", "whois.pir.org"),
    ("info", "whois.afilias.net"),
    ("biz", "whois.biz"),
    ("name", "whois.nic.name"),
    ("mobi", "whois.afilias.net"),
    ("edu", "whois.educause.edu"),
    ("gov", "whois.dotgov.gov"),
    ("int", "whois.iana.org"),
    // New gTLDs
    ("app", "whois.nic.google"),
    ("dev", "whois.nic.google"),
    ("page", "whois.nic.google"),
    ("blog", "whois.nic.blog"),
    ("cloud", "whois.nic.cloud"),
    ("xyz", "whois.nic.xyz"),
    ("online", "whois.nic.online"),
    ("site", "whois.nic.site"),
    ("tech", "whois.nic.tech"),
    ("store", "whois.nic.store"),
    ("shop", "whois.nic.shop"),
    // ccTLDs commonly used generically
    ("io", "whois.nic.io"),
    ("co", "whois.nic.co"),
    ("me", "whois.nic.me"),
    ("tv", "whois.nic.tv"),
    ("cc", "ccwhois.verisign-grs.com"),
    ("ai", "whois.nic.ai"),
    ("gg", "whois.gg"),
    // Country codes
    ("at", "whois.nic.at"),
    ("au", "whois.auda.org.au"),
    ("be", "whois.dns.be"),
    ("br", "whois.registro.br"),
    ("ca", "whois.cira.ca"),
    ("ch", "whois.nic.ch"),
    ("cn", "whois.cnnic.cn"),
    ("de", "whois.denic.de"),
    ("dk", "whois.punktum.dk"),
    ("es", "whois.nic.es"),
    ("eu", "whois.eu"),
    ("fi", "whois.fi"),
    ("fr", "whois.nic.fr"),
    ("in", "whois.registry.in"),
    ("it", "whois.nic.it"),
    ("jp", "whois.jprs.jp"),
    ("kr", "whois.kr"),
    ("nl", "whois.domain-registry.nl"),
    ("no", "whois.norid.no"),
    ("nz", "whois.irs.net.nz"),
    ("pl", "whois.dns.pl"),
    ("pt", "whois.dns.pt"),
    ("ru", "whois.tcinet.ru"),
    ("se", "whois.iis.se"),
    ("uk", "whois.nic.uk"),
    ("us", "whois.nic.us"),
    ("za", "whois.registry.net.za"),
];

pub static WHOIS_SERVERS: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| KNOWN_SERVERS.iter().copied().collect());

pub fn get_whois_server(tld: &str) -> Option<&'static str> {
    WHOIS_SERVERS.get(tld.to_lowercase().as_str()).copied()
}
