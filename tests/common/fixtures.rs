//! Chunk fixtures for integration tests.

use coderank::chunk::{ChunkId, ChunkInput, ChunkKind, SourceLocation};

pub const DEFAULT_PATH: &str = "src/lib.rs";

pub struct ChunkBuilder {
    symbol: String,
    kind: &'static str,
    path: String,
    doc: Option<String>,
    body: Option<String>,
    line: u32,
}

impl ChunkBuilder {
    pub fn function(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            kind: "fn",
            path: DEFAULT_PATH.to_string(),
            doc: None,
            body: None,
            line: 1,
        }
    }

    pub fn structure(symbol: &str) -> Self {
        Self {
            kind: "struct",
            ..Self::function(symbol)
        }
    }

    pub fn in_file(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    pub fn doc(mut self, doc: &str) -> Self {
        self.doc = Some(doc.to_string());
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = Some(body.to_string());
        self
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }

    pub fn build(self) -> ChunkInput {
        let (signature, kind) = match self.kind {
            "struct" => {
                let signature = format!("pub struct {}", self.symbol);
                (
                    signature.clone(),
                    ChunkKind::Struct {
                        symbol: self.symbol.clone(),
                        signature,
                    },
                )
            }
            _ => {
                let signature = format!("pub fn {}(input: &str) -> Result<()>", self.symbol);
                (
                    signature.clone(),
                    ChunkKind::Function {
                        symbol: self.symbol.clone(),
                        signature,
                    },
                )
            }
        };
        let body = self.body.unwrap_or_else(|| "    Ok(())".to_string());

        ChunkInput {
            id: ChunkId::new(format!("{}::{}", self.path, self.symbol)),
            text: format!("{signature} {{\n{body}\n}}"),
            kind,
            doc: self.doc,
            location: SourceLocation::new(self.path, self.line, self.line + 2),
        }
    }
}

/// Stable id of a chunk built with [`ChunkBuilder`].
pub fn chunk_id(path: &str, symbol: &str) -> ChunkId {
    ChunkId::new(format!("{path}::{symbol}"))
}

const VERBS: [&str; 10] = [
    "load", "save", "parse", "render", "validate", "send", "fetch", "delete", "update", "index",
];
const NOUNS: [&str; 10] = [
    "user", "order", "invoice", "session", "token", "report", "image", "email", "config", "cache",
];

/// `n` distinct functions spread over ten files, named `{verb}_{noun}_{i}`.
pub fn synthetic_corpus(n: usize) -> Vec<ChunkInput> {
    (0..n)
        .map(|i| {
            let verb = VERBS[i % VERBS.len()];
            let noun = NOUNS[(i / VERBS.len()) % NOUNS.len()];
            ChunkBuilder::function(&format!("{verb}_{noun}_{i}"))
                .in_file(&format!("src/{noun}.rs"))
                .doc(&format!("{verb} the {noun} record number {i}."))
                .body(&format!("    store.{verb}(\"{noun}\", {i})"))
                .at_line(1 + (i as u32) * 4)
                .build()
        })
        .collect()
}
