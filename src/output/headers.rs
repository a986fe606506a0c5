//! Display order for response headers

use std::cmp::Ordering;

/// Connection-scoped headers, which sort after end-to-end ones
pub const HOP_BY_HOP: [&str; 8] = [
    "Connection",
    "Keep-Alive",
    "Proxy-Authenticate",
    "Proxy-Authorization",
    "TE",
    "Trailers",
    "Transfer-Encoding",
    "Upgrade",
];

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|hop| hop.eq_ignore_ascii_case(name))
}

fn rank(name: &str) -> u8 {
    if name.eq_ignore_ascii_case("Server") {
        0
    } else if is_hop_by_hop(name) {
        2
    } else {
        1
    }
}

/// `Server` first, then end-to-end headers, then hop-by-hop headers; names
/// compare byte-wise within each class
pub fn compare_header_names(a: &str, b: &str) -> Ordering {
    rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
}

/// Header names in display order
pub fn sorted_names<'a, I>(names: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut names: Vec<&str> = names.into_iter().collect();
    names.sort_by(|a, b| compare_header_names(a, b));
    names
}
