//! Per-file overview chunks.
//!
//! A summary lets a question about "the file that handles X" match one chunk instead of
//! scattering across every function in that file.

use std::collections::HashMap;
use std::fmt::Write as _;

use super::{ChunkId, ChunkInput, ChunkKind, SourceLocation};
use crate::constants::{
    FILE_SUMMARY_DOC_CHARS, FILE_SUMMARY_MAX_FUNCTIONS, FILE_SUMMARY_SIGNATURE_CHARS,
};

/// Builds one [`ChunkKind::FileSummary`] input per source file that contains at least one
/// symbol chunk. Files appear in first-seen order; symbols keep corpus order.
///
/// Summary ids are `file:{normalized path}`.
pub fn synthesize_file_summaries(inputs: &[ChunkInput]) -> Vec<ChunkInput> {
    let mut order: Vec<String> = Vec::new();
    let mut by_file: HashMap<String, Vec<&ChunkInput>> = HashMap::new();

    for input in inputs {
        if input.kind.symbol().is_none() {
            continue;
        }
        let path = input.location.normalized_path();
        by_file
            .entry(path.clone())
            .or_insert_with(|| {
                order.push(path);
                Vec::new()
            })
            .push(input);
    }

    order
        .into_iter()
        .filter_map(|path| {
            let members = by_file.remove(&path)?;
            Some(summary_for_file(path, &members))
        })
        .collect()
}

fn summary_for_file(path: String, members: &[&ChunkInput]) -> ChunkInput {
    let end_line = members
        .iter()
        .map(|m| m.location.end_line)
        .max()
        .unwrap_or(1);

    let mut text = format!(
        "File: {path}\nTotal Functions: {}\n\nFunctions in this file:\n",
        members.len()
    );

    for (i, member) in members.iter().take(FILE_SUMMARY_MAX_FUNCTIONS).enumerate() {
        let _ = write!(text, "\n{}. {}", i + 1, member.kind.display_name());
        if let Some(signature) = member.kind.signature() {
            let _ = write!(
                text,
                "\n   Signature: {}",
                truncate_chars(signature, FILE_SUMMARY_SIGNATURE_CHARS)
            );
        }
        if let Some(doc) = member.doc.as_deref().filter(|d| !d.trim().is_empty()) {
            let _ = write!(
                text,
                "\n   Doc: {}",
                truncate_chars(doc.trim(), FILE_SUMMARY_DOC_CHARS)
            );
        }
    }
    if members.len() > FILE_SUMMARY_MAX_FUNCTIONS {
        let _ = write!(
            text,
            "\n\n... and {} more",
            members.len() - FILE_SUMMARY_MAX_FUNCTIONS
        );
    }

    ChunkInput {
        id: ChunkId::new(format!("file:{path}")),
        text,
        kind: ChunkKind::FileSummary { file: path.clone() },
        doc: None,
        location: SourceLocation::new(path, 1, end_line),
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars()
        .take(max)
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect()
}
