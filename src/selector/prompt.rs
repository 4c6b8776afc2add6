//! Prompt construction.

use std::fmt::Write as _;

use crate::chunk::ChunkRecord;

const DESCRIPTION_CHARS: usize = 200;
const PHASE_TWO_DOC_CHARS: usize = 100;
const INDIVIDUAL_CODE_CHARS: usize = 600;
const INDIVIDUAL_DOC_CHARS: usize = 250;

const FEW_SHOT_EXAMPLES: &str = r#"Examples:

Q: "How do I authenticate a user?"
Options:
A. NOT_FOUND
B. login_handler - Handles user login with credentials
C. logout_handler - Handles user logout
D. validate_token - Validates authentication token
Answer: B

Q: "Where is the blockchain integration?"
Options:
A. NOT_FOUND
B. DatabaseManager - Manages database connections
C. create_jwt - Creates JWT tokens
Answer: A

Q: "How do I validate a JWT token?"
Options:
A. NOT_FOUND
B. create_jwt - Creates new JWT token
C. validate_jwt - Validates JWT token and returns claims
D. extract_jwt_from_cookies - Extracts JWT from cookies
Answer: C

"#;

/// Letter of the `index`-th (0-based) candidate. `A` is reserved for NOT_FOUND.
pub fn option_letter(index: usize) -> char {
    char::from(b'B' + index as u8)
}

/// Multiple-choice prompt over `candidates`, with option `A` meaning none match.
pub fn batch(query: &str, candidates: &[&ChunkRecord], few_shot: bool) -> String {
    let mut prompt = if few_shot {
        format!("{FEW_SHOT_EXAMPLES}Now answer this question:\n\nQuery: {query}\n\nOptions:\nA. NOT_FOUND\n")
    } else {
        format!(
            "Select the BEST function that matches the query, or choose A if none match.\n\nQuery: {query}\n\nOptions:\nA. NOT_FOUND\n"
        )
    };

    for (i, record) in candidates.iter().enumerate() {
        let _ = write!(prompt, "{}. {}", option_letter(i), record.display_name());
        let desc = record.short_description(DESCRIPTION_CHARS);
        if !desc.is_empty() {
            let _ = write!(prompt, " - {desc}");
        }
        prompt.push('\n');
    }

    let last = option_letter(candidates.len().saturating_sub(1));
    let _ = write!(prompt, "\nAnswer with ONLY the letter (A-{last}):");
    prompt
}

/// Conservative phase one: does this single candidate match?
pub fn relevance_check(query: &str, record: &ChunkRecord) -> String {
    format!(
        "Does this function match the query?\n\nQuery: {query}\n\nFunction: {}\n{}\n\nAnswer ONLY: YES or NO",
        record.display_name(),
        record.short_description(DESCRIPTION_CHARS),
    )
}

/// Conservative phase two: pick the best among the candidates that passed phase one.
pub fn best_of(query: &str, survivors: &[&ChunkRecord]) -> String {
    let mut prompt = format!("Which function is the BEST match?\n\nQuery: {query}\n\nOptions:\n");
    for (i, record) in survivors.iter().enumerate() {
        let doc = record
            .doc()
            .map(|d| flatten(d, PHASE_TWO_DOC_CHARS))
            .unwrap_or_default();
        let _ = writeln!(prompt, "{}. {} - {doc}", i + 1, record.display_name());
    }
    let _ = write!(
        prompt,
        "\nAnswer with ONLY the number (1-{}):",
        survivors.len()
    );
    prompt
}

/// Individual mode: a 0-100 confidence for one candidate.
pub fn confidence(query: &str, record: &ChunkRecord) -> String {
    let location = record.location();
    let mut context = format!(
        "FUNCTION:\nLocation: {}\nName: {}\nSignature: {}\n",
        location.path,
        record.display_name(),
        record.kind().signature().unwrap_or_default(),
    );
    if let Some(doc) = record.doc().filter(|d| !d.trim().is_empty()) {
        let _ = writeln!(context, "Documentation: {}", flatten(doc, INDIVIDUAL_DOC_CHARS));
    }
    let code: String = record.text().chars().take(INDIVIDUAL_CODE_CHARS).collect();
    let _ = write!(context, "\nCode:\n{code}\n");

    format!(
        "Rate how well this function answers the question (0-100%).\n\n\
         QUESTION: {query}\n\n\
         {context}\n\
         TASK: Provide a confidence score (0-100) that this function correctly answers the question.\n\n\
         IMPORTANT:\n\
         - 0% = Completely unrelated\n\
         - 50% = Somewhat related but not the answer\n\
         - 100% = Perfect match, this is the answer\n\n\
         OUTPUT FORMAT (just the number):\n\
         SCORE: "
    )
}

fn flatten(text: &str, max_chars: usize) -> String {
    text.chars()
        .take(max_chars)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}
