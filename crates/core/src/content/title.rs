//! Free-text title heuristics used by the scraping crawlers.

use chrono::Datelike;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use sha2::{Digest, Sha256};

static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").expect("valid year regex"));

static QUALITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(2160p|4k|1080p|720p|480p)\b").expect("valid quality regex"));

static SIZE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([0-9]+(?:[.,][0-9]+)?)\s*(tib|tb|gib|gb|mib|mb|kib|kb|b)\b")
        .expect("valid size regex")
});

/// Keywords mapped to genre labels. Order is the order genres are reported.
const GENRE_KEYWORDS: &[(&str, &[&str])] = &[
    ("Action", &["action", "avengers", "marvel", "fast", "furious", "war"]),
    ("Comedy", &["comedy", "funny", "parody"]),
    ("Drama", &["drama"]),
    ("Horror", &["horror", "scary", "zombie", "haunting"]),
    ("Thriller", &["thriller", "crime", "mystery"]),
    ("Anime", &["anime"]),
];

/// Parse a 4-digit year (19xx/20xx) out of a title.
///
/// Falls back to the current calendar year when no token matches. This is an
/// approximation: untitled or yearless listings all land on "this year".
pub fn extract_year(title: &str) -> u16 {
    YEAR_RE
        .captures(title)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or_else(current_year)
}

fn current_year() -> u16 {
    u16::try_from(chrono::Utc::now().year()).unwrap_or(2000)
}

/// Lowercased, punctuation-stripped, whitespace-collapsed title.
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Stable id for a content item produced by `source`.
pub fn content_id(source: &str, title: &str, year: u16) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_title(title).as_bytes());
    hasher.update(b"|");
    hasher.update(year.to_string().as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(8).map(|b| format!("{:02x}", b)).collect();
    format!("{}_{}", source, hex)
}

/// Resolution label found in a release name, normalized to lowercase.
pub fn extract_quality(title: &str) -> Option<String> {
    QUALITY_RE.captures(title).map(|caps| {
        let label = caps[1].to_ascii_lowercase();
        if label == "4k" {
            "2160p".to_string()
        } else {
            label
        }
    })
}

/// Keyword-matched genres, `General` when nothing matches.
pub fn extract_genres(title: &str) -> Vec<String> {
    let normalized = normalize_title(title);
    let words: Vec<&str> = normalized.split(' ').collect();
    let genres: Vec<String> = GENRE_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| words.contains(k)))
        .map(|(genre, _)| genre.to_string())
        .collect();

    if genres.is_empty() {
        vec!["General".to_string()]
    } else {
        genres
    }
}

/// Parse a human readable size ("1.4 GB", "700 MB") into bytes.
pub fn parse_size(text: &str) -> Option<u64> {
    let caps = SIZE_RE.captures(text)?;
    let value: f64 = caps[1].replace(',', ".").parse().ok()?;
    let multiplier: f64 = match caps[2].to_ascii_lowercase().as_str() {
        "tb" | "tib" => 1024f64.powi(4),
        "gb" | "gib" => 1024f64.powi(3),
        "mb" | "mib" => 1024f64.powi(2),
        "kb" | "kib" => 1024.0,
        _ => 1.0,
    };
    Some((value * multiplier).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_year_from_release_name() {
        assert_eq!(extract_year("The Matrix 1999 1080p"), 1999);
        assert_eq!(extract_year("Dune.Part.Two.2024.2160p.WEB-DL"), 2024);
    }

    #[test]
    fn test_extract_year_defaults_to_current_year() {
        assert_eq!(extract_year("Untitled Project"), current_year());
        // Resolution digits are not years.
        assert_eq!(extract_year("Something 1080p"), current_year());
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("  The.Matrix:  Reloaded! "), "the matrix reloaded");
        assert_eq!(normalize_title("AVENGERS - Endgame"), "avengers endgame");
    }

    #[test]
    fn test_content_id_is_deterministic() {
        let a = content_id("yts", "The Matrix", 1999);
        let b = content_id("yts", "the matrix", 1999);
        assert_eq!(a, b);
        assert!(a.starts_with("yts_"));
        assert_ne!(a, content_id("eztv", "The Matrix", 1999));
        assert_ne!(a, content_id("yts", "The Matrix", 2003));
    }

    #[test]
    fn test_extract_quality() {
        assert_eq!(extract_quality("Movie 2020 1080p BluRay").as_deref(), Some("1080p"));
        assert_eq!(extract_quality("Movie 2020 4K HDR").as_deref(), Some("2160p"));
        assert_eq!(extract_quality("Show S01E01 720P").as_deref(), Some("720p"));
        assert_eq!(extract_quality("Movie 2020 DVDRip"), None);
    }

    #[test]
    fn test_extract_genres() {
        assert_eq!(extract_genres("Avengers Endgame 2019"), vec!["Action"]);
        assert_eq!(extract_genres("Zombie Comedy Night"), vec!["Comedy", "Horror"]);
        assert_eq!(extract_genres("Quiet Film"), vec!["General"]);
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1.5 GB"), Some(1_610_612_736));
        assert_eq!(parse_size("700 MB"), Some(734_003_200));
        assert_eq!(parse_size("350.2 KiB"), Some(358_605));
        assert_eq!(parse_size("unknown"), None);
    }
}
