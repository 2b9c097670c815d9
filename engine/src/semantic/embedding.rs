//! Feature-hashing text embedder
//!
//! Each lowercase alphanumeric token is hashed into one of `dimension`
//! buckets and the bucket counts are L2-normalized. FNV-1a keeps the hash
//! stable across processes and releases, which matters because vectors are
//! persisted and compared against queries embedded later.

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed text into a unit vector, or the zero vector if it has no tokens
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let idx = (fnv1a(token.to_lowercase().as_bytes()) % self.dimension as u64) as usize;
            vector[idx] += 1.0;
        }

        normalize_vector(&mut vector);
        vector
    }
}

fn normalize_vector(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vec.iter_mut() {
            *value /= norm;
        }
    }
}

/// Squared Euclidean distance between two vectors of equal length
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// True when every component is zero
pub fn is_zero(vec: &[f32]) -> bool {
    vec.iter().all(|v| *v == 0.0)
}
