//! Magnet URI helpers.

/// Public announce URLs appended to magnets built from a bare info hash.
pub const PUBLIC_TRACKERS: &[&str] = &[
    "udp://open.demonii.com:1337/announce",
    "udp://tracker.openbittorrent.com:80",
    "udp://tracker.coppersurfer.tk:6969",
    "udp://glotorrents.pw:6969/announce",
    "udp://tracker.opentrackr.org:1337/announce",
    "udp://torrent.gresille.org:80/announce",
    "udp://p4p.arenabg.com:1337",
    "udp://tracker.leechers-paradise.org:6969",
];

/// Build a magnet URI from an info hash, display name and the public tracker list.
pub fn build_magnet(info_hash: &str, name: &str) -> String {
    let mut uri = format!(
        "magnet:?xt=urn:btih:{}&dn={}",
        info_hash.to_ascii_lowercase(),
        urlencoding::encode(name)
    );
    for tracker in PUBLIC_TRACKERS {
        uri.push_str("&tr=");
        uri.push_str(&urlencoding::encode(tracker));
    }
    uri
}

/// Extract the btih info hash from a magnet URI, lowercased.
pub fn info_hash_from_magnet(uri: &str) -> Option<String> {
    let query = uri.strip_prefix("magnet:?")?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "xt")
        .and_then(|(_, value)| {
            let lower = value.to_ascii_lowercase();
            lower.strip_prefix("urn:btih:").map(str::to_string)
        })
        .filter(|hash| !hash.is_empty())
}
