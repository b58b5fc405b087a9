//! Cosine similarity ranking over embedding vectors.
//!
//! Ranking is a stable sort on descending score, so candidates with equal
//! similarity keep their original relative order.

use std::cmp::Ordering;

/// A candidate key paired with its similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct Ranked<K> {
  pub key: K,
  pub score: f32,
}

impl<K> Ranked<K> {
  pub fn new(key: K, score: f32) -> Self {
    Self { key, score }
  }
}

/// Calculate cosine similarity between two embeddings.
///
/// Vectors of different lengths, with zero magnitude, or with non-finite
/// components score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
  if a.len() != b.len() {
    return 0.0;
  }

  let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
  let magnitude_a = magnitude(a);
  let magnitude_b = magnitude(b);

  if magnitude_a == 0.0 || magnitude_b == 0.0 {
    return 0.0;
  }

  let similarity = dot_product / (magnitude_a * magnitude_b);
  if similarity.is_finite() {
    similarity
  } else {
    0.0
  }
}

/// L2 norm of a vector
pub fn magnitude(vector: &[f32]) -> f32 {
  vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale a vector to unit length; zero vectors are returned unchanged
pub fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
  let length = magnitude(&vector);
  if length > f32::EPSILON {
    for value in vector.iter_mut() {
      *value /= length;
    }
  }
  vector
}

/// Rank candidates by descending cosine similarity to `query`.
pub fn rank<'a, K, I>(query: &[f32], candidates: I) -> Vec<Ranked<K>>
where
  I: IntoIterator<Item = (K, &'a [f32])>,
{
  let mut ranked: Vec<Ranked<K>> = candidates
    .into_iter()
    .map(|(key, vector)| Ranked::new(key, cosine_similarity(query, vector)))
    .collect();

  // sort_by is stable: ties keep candidate order
  ranked.sort_by(|a, b| descending(a.score, b.score));
  ranked
}

/// The first `k` entries of the ranking. `k` larger than the candidate
/// count yields every candidate; `k == 0` yields nothing.
pub fn top_k<'a, K, I>(query: &[f32], candidates: I, k: usize) -> Vec<Ranked<K>>
where
  I: IntoIterator<Item = (K, &'a [f32])>,
{
  let mut ranked = rank(query, candidates);
  ranked.truncate(k);
  ranked
}

/// Arithmetic mean of the query's similarity to every reference vector.
///
/// An empty reference set has no meaningful mean and scores 0.
pub fn mean_similarity<V: AsRef<[f32]>>(query: &[f32], references: &[V]) -> f32 {
  if references.is_empty() {
    return 0.0;
  }

  let total: f32 =
    references.iter().map(|reference| cosine_similarity(query, reference.as_ref())).sum();
  total / references.len() as f32
}

fn descending(a: f32, b: f32) -> Ordering {
  b.total_cmp(&a)
}
