const STOP_WORDS: &[&str] = &["a", "the", "in", "with"];

/// Turn a free-text caption into a catalog search query by dropping stop
/// words and collapsing whitespace.
pub fn normalize(caption: &str) -> String {
    caption
        .split_whitespace()
        .filter(|word| !is_stop_word(word))
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_stop_word(word: &str) -> bool {
    let lower = word.to_lowercase();
    STOP_WORDS.contains(&lower.as_str())
}

/// Build the catalog listing URL for a normalized query.
pub fn search_url(origin: &str, query: &str) -> String {
    format!("{}/{}", origin.trim_end_matches('/'), query.replace(' ', "-"))
}
