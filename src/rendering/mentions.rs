/// Extract `@username` mentions from text.
///
/// A mention is `@` at the start of the text or after a non-word character,
/// followed by 3-30 username characters (`[A-Za-z0-9_]`). Email addresses
/// such as `bob@example.com` are not mentions. Names are lowercased and
/// deduplicated in order of first appearance.
pub fn extract_mentions(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut mentions: Vec<String> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '@' && (i == 0 || !is_username_char(chars[i - 1])) {
            let start = i + 1;
            let mut end = start;
            while end < chars.len() && is_username_char(chars[end]) {
                end += 1;
            }

            let len = end - start;
            if (3..=30).contains(&len) {
                let name: String = chars[start..end].iter().collect::<String>().to_lowercase();
                if !mentions.contains(&name) {
                    mentions.push(name);
                }
            }
            i = end.max(i + 1);
        } else {
            i += 1;
        }
    }

    mentions
}

pub fn is_username_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
