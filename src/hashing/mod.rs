use blake3::Hasher;

/// Cache key for a query embedding. The model id is mixed in so that two embedders sharing a
/// cache can never serve each other's vectors.
#[inline]
pub fn hash_query(model_id: &str, query: &str) -> [u8; 32] {
    let mut hasher = Hasher::new();
    hasher.update(model_id.as_bytes());
    hasher.update(b"|");
    hasher.update(query.as_bytes());
    *hasher.finalize().as_bytes()
}

/// Computes a 64-bit hash of the input data using BLAKE3, truncated from 256 bits.
///
/// Used for seeding deterministic stub embeddings and for short log-friendly identifiers.
/// Collisions are harmless for both uses.
#[inline]
pub fn hash_to_u64(data: &[u8]) -> u64 {
    let hash = blake3::hash(data);
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

/// Incremental fingerprint of an index build.
///
/// Covers the embedder identity, the embedding dimension and every chunk's id and text, in
/// corpus order. Two stores with the same fingerprint rank identically for the same query.
#[derive(Debug, Clone)]
pub struct IndexFingerprint {
    hasher: Hasher,
}

impl IndexFingerprint {
    pub fn new(model_id: &str, embedding_dim: usize) -> Self {
        let mut hasher = Hasher::new();
        hasher.update(model_id.as_bytes());
        hasher.update(b"|");
        hasher.update(&(embedding_dim as u64).to_le_bytes());
        Self { hasher }
    }

    pub fn add_chunk(&mut self, id: &str, text: &str) {
        self.hasher.update(&(id.len() as u64).to_le_bytes());
        self.hasher.update(id.as_bytes());
        self.hasher.update(&(text.len() as u64).to_le_bytes());
        self.hasher.update(text.as_bytes());
    }

    /// Hex digest of everything added so far.
    pub fn finish(&self) -> String {
        self.hasher.finalize().to_hex().to_string()
    }
}
