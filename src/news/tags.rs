use std::collections::HashMap;

/// Maximum number of tags attached to an imported article.
pub const MAX_TAGS: usize = 4;

/// Number of frequency-ranked terms added after the source tag.
pub const MAX_TERM_TAGS: usize = 3;

/// Terms shorter than this are ignored.
const MIN_TERM_LEN: usize = 3;

const STOPWORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "all", "also", "and", "any", "are", "aren",
    "because", "been", "before", "being", "below", "between", "both", "but", "can", "could",
    "did", "didn", "does", "doesn", "doing", "don", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "her", "here", "hers", "herself", "him",
    "himself", "his", "how", "into", "its", "itself", "just", "more", "most", "not", "now",
    "off", "once", "only", "other", "our", "ours", "ourselves", "out", "over", "own", "said",
    "same", "say", "says", "she", "should", "some", "such", "than", "that", "the", "their",
    "theirs", "them", "themselves", "then", "there", "these", "they", "this", "those",
    "through", "too", "under", "until", "very", "was", "wasn", "were", "what", "when", "where",
    "which", "while", "who", "whom", "why", "will", "with", "won", "would", "you", "your",
    "yours", "yourself", "yourselves",
];

fn is_stopword(term: &str) -> bool {
    STOPWORDS.contains(&term)
}

/// Derive tags for an imported article.
///
/// The source name comes first, followed by the most frequent non-stopword
/// terms of the title and description. Tags are lowercase and unique, at
/// most [`MAX_TAGS`] in total.
pub fn extract_tags(
    source_name: Option<&str>,
    title: &str,
    description: Option<&str>,
) -> Vec<String> {
    let mut tags: Vec<String> = Vec::with_capacity(MAX_TAGS);

    if let Some(source) = source_name
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
    {
        tags.push(source);
    }

    let text = match description {
        Some(description) => format!("{title} {description}"),
        None => title.to_string(),
    };

    let mut added = 0;
    for term in ranked_terms(&text) {
        if added == MAX_TERM_TAGS || tags.len() == MAX_TAGS {
            break;
        }
        if tags.contains(&term) {
            continue;
        }
        tags.push(term);
        added += 1;
    }

    tags
}

/// Candidate terms ordered by descending frequency; ties keep first-seen order.
pub fn ranked_terms(text: &str) -> Vec<String> {
    // term -> (count, first position)
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();

    let terms = text
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|t| t.chars().count() >= MIN_TERM_LEN)
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .filter(|t| !is_stopword(t));

    for (position, term) in terms.enumerate() {
        counts
            .entry(term)
            .and_modify(|(count, _)| *count += 1)
            .or_insert((1, position));
    }

    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(term, (count, first))| (term, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    ranked.into_iter().map(|(term, _, _)| term).collect()
}
