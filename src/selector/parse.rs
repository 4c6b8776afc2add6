//! Reply parsing. Models pad, explain and echo the prompt; these parsers look only for the
//! first usable token.

/// Leading words searched for an option letter.
const LETTER_SEARCH_WORDS: usize = 4;

/// First standalone option letter in `'A'..=last` near the start of `response`.
///
/// A leading `Answer:` is skipped and a reply opening with `NOT_FOUND` reads as `A`.
pub fn parse_option_letter(response: &str, last: char) -> Option<char> {
    let upper = response.trim().to_uppercase();
    let body = upper
        .strip_prefix("ANSWER")
        .map(|rest| rest.trim_start_matches([':', ' ', '\t']))
        .unwrap_or(&upper);

    if body.starts_with("NOT_FOUND") || body.starts_with("NOT FOUND") {
        return Some('A');
    }

    body.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .take(LETTER_SEARCH_WORDS)
        .find_map(|word| {
            let mut chars = word.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if ('A'..=last).contains(&c) => Some(c),
                _ => None,
            }
        })
}

/// First number in `response` (integer or decimal) that starts on a word boundary.
pub fn parse_first_number(response: &str) -> Option<f32> {
    let chars: Vec<char> = response.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let at_boundary = i == 0 || !(chars[i - 1].is_alphanumeric() || chars[i - 1] == '_');
        if chars[i].is_ascii_digit() && at_boundary {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            if i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit() {
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let literal: String = chars[start..i].iter().collect();
            if let Ok(value) = literal.parse::<f32>() {
                return Some(value);
            }
        }
        i += 1;
    }
    None
}

/// Confidence on a 0-100 scale; unparseable replies are `0`.
pub fn parse_confidence(response: &str) -> f32 {
    parse_first_number(response)
        .map(|v| v.clamp(0.0, 100.0))
        .unwrap_or(0.0)
}

/// 1-based choice among `n` numbered options, as a 0-based index.
pub fn parse_numbered_choice(response: &str, n: usize) -> Option<usize> {
    let value = parse_first_number(response)?;
    if value.fract() != 0.0 || value < 1.0 {
        return None;
    }
    let choice = value as usize;
    (choice <= n).then(|| choice - 1)
}

pub fn parse_yes(response: &str) -> bool {
    response.to_uppercase().contains("YES")
}
