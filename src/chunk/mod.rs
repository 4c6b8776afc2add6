//! Indexable units of source code.
//!
//! The chunker (an external tool) emits [`ChunkInput`] records. The store turns each one into a
//! [`ChunkRecord`] by attaching its embedding.

pub mod summary;


pub use summary::synthesize_file_summaries;

use std::fmt;

use half::f16;
use serde::{Deserialize, Serialize};

/// Unique identifier of a chunk. Ordering is plain string ordering and serves as the
/// deterministic tie-break everywhere scores are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(String);

impl ChunkId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for ChunkId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ChunkId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// File and line span a chunk was cut from (1-based, inclusive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub path: String,
    pub start_line: u32,
    pub end_line: u32,
}

impl SourceLocation {
    pub fn new(path: impl Into<String>, start_line: u32, end_line: u32) -> Self {
        Self {
            path: path.into(),
            start_line,
            end_line,
        }
    }

    /// Path with `\` separators folded to `/`, so Windows- and Unix-produced corpora group the
    /// same way.
    pub fn normalized_path(&self) -> String {
        self.path.replace('\\', "/")
    }

    /// Final path component.
    pub fn file_name(&self) -> &str {
        self.path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(self.path.as_str())
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.path, self.start_line, self.end_line)
    }
}

/// What a chunk represents. Symbol-bearing kinds carry their declared name and signature line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChunkKind {
    Function { symbol: String, signature: String },
    Struct { symbol: String, signature: String },
    Enum { symbol: String, signature: String },
    /// Synthesized overview of every symbol in one file.
    FileSummary { file: String },
}

/// Discriminant of [`ChunkKind`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindTag {
    Function,
    Struct,
    Enum,
    FileSummary,
}

impl KindTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Struct => "struct",
            Self::Enum => "enum",
            Self::FileSummary => "file_summary",
        }
    }

    /// Struct and enum chunks, gated by `index_type_chunks`.
    pub fn is_type(&self) -> bool {
        matches!(self, Self::Struct | Self::Enum)
    }
}

impl fmt::Display for KindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ChunkKind {
    pub fn tag(&self) -> KindTag {
        match self {
            Self::Function { .. } => KindTag::Function,
            Self::Struct { .. } => KindTag::Struct,
            Self::Enum { .. } => KindTag::Enum,
            Self::FileSummary { .. } => KindTag::FileSummary,
        }
    }

    /// Declared symbol name. File summaries have none.
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Self::Function { symbol, .. }
            | Self::Struct { symbol, .. }
            | Self::Enum { symbol, .. } => Some(symbol),
            Self::FileSummary { .. } => None,
        }
    }

    pub fn signature(&self) -> Option<&str> {
        match self {
            Self::Function { signature, .. }
            | Self::Struct { signature, .. }
            | Self::Enum { signature, .. } => {
                Some(signature.as_str()).filter(|s| !s.trim().is_empty())
            }
            Self::FileSummary { .. } => None,
        }
    }

    /// Name shown to people and language models: the symbol, or the file for summaries.
    pub fn display_name(&self) -> &str {
        match self {
            Self::FileSummary { file } => file,
            _ => self.symbol().unwrap_or_default(),
        }
    }
}

/// One record as produced by the chunker, before embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkInput {
    pub id: ChunkId,
    pub text: String,
    #[serde(flatten)]
    pub kind: ChunkKind,
    #[serde(default)]
    pub doc: Option<String>,
    pub location: SourceLocation,
}

impl ChunkInput {
    /// Text handed to the embedding model: doc comment (if any) followed by the code.
    pub fn embedding_text(&self) -> String {
        match self.doc.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            Some(doc) => format!("{doc}\n{}", self.text),
            None => self.text.clone(),
        }
    }
}

/// An indexed chunk. The embedding is computed once at index time and never changes.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    id: ChunkId,
    text: String,
    kind: ChunkKind,
    doc: Option<String>,
    location: SourceLocation,
    embedding: Vec<f16>,
}

impl ChunkRecord {
    pub fn new(input: ChunkInput, embedding: &[f32]) -> Self {
        Self {
            id: input.id,
            text: input.text,
            kind: input.kind,
            doc: input.doc,
            location: input.location,
            embedding: embedding.iter().map(|&v| f16::from_f32(v)).collect(),
        }
    }

    pub(crate) fn from_stored(
        id: ChunkId,
        text: String,
        kind: ChunkKind,
        doc: Option<String>,
        location: SourceLocation,
        embedding: Vec<f16>,
    ) -> Self {
        Self {
            id,
            text,
            kind,
            doc,
            location,
            embedding,
        }
    }

    pub fn id(&self) -> &ChunkId {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> &ChunkKind {
        &self.kind
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    pub fn embedding(&self) -> &[f16] {
        &self.embedding
    }

    pub fn symbol(&self) -> Option<&str> {
        self.kind.symbol()
    }

    pub fn display_name(&self) -> &str {
        self.kind.display_name()
    }

    /// Corpus text for lexical scoring: name, doc comment, then code.
    pub fn lexical_text(&self) -> String {
        let mut out = String::with_capacity(self.text.len() + 64);
        out.push_str(self.display_name());
        if let Some(doc) = &self.doc {
            out.push(' ');
            out.push_str(doc);
        }
        out.push(' ');
        out.push_str(&self.text);
        out
    }

    /// Text scored against the query by the cross-encoder.
    ///
    /// In signature mode symbol chunks contribute `Function: {name}`, the doc line and the
    /// signature; everything else (and full mode) uses the full chunk text.
    pub fn rerank_text(&self, signature_only: bool) -> String {
        if !signature_only {
            return self.text.clone();
        }
        let (Some(symbol), Some(signature)) = (self.kind.symbol(), self.kind.signature()) else {
            return self.text.clone();
        };
        let mut out = format!("Function: {symbol}\n");
        if let Some(doc) = self.doc.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            out.push_str(doc);
            out.push('\n');
        }
        out.push_str(signature.lines().next().unwrap_or(signature));
        out
    }

    /// Short description for selector prompts: signature if present, else the doc comment,
    /// else the first line of code. Newlines are flattened.
    pub fn short_description(&self, max_chars: usize) -> String {
        let source = self
            .kind
            .signature()
            .or_else(|| self.doc.as_deref().filter(|d| !d.trim().is_empty()))
            .unwrap_or_else(|| self.text.lines().next().unwrap_or_default());
        let flat: String = source
            .chars()
            .take(max_chars)
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .collect();
        flat.trim().to_string()
    }
}
