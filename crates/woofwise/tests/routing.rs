//! End-to-end routing and retrieval over the shipped dataset with the
//! lexical embedding backend.

use std::path::Path;
use std::sync::Arc;

use woofwise::embedding::{LexicalEmbeddingModel, SharedEmbeddingModel};
use woofwise::{BreedRetriever, BreedTable, PipelineSelector, Route};

fn dataset() -> BreedTable {
  BreedTable::from_csv_path(&Path::new(env!("CARGO_MANIFEST_DIR")).join("data/dog_breeds.csv"))
    .unwrap()
}

fn model() -> SharedEmbeddingModel {
  Arc::new(LexicalEmbeddingModel::default())
}

#[test]
fn test_shipped_dataset_loads() {
  let table = dataset();
  assert_eq!(table.len(), 15);
  assert!(table.records().iter().any(|r| r.breed == "Siberian Husky"));
}

#[test]
fn test_example_questions_route_to_their_own_pipeline() {
  let selector = PipelineSelector::new(model()).unwrap();

  assert_eq!(selector.select("What breeds are good with children?").unwrap(), Route::Nlu);
  assert_eq!(selector.select("Show me breeds sorted by lifespan").unwrap(), Route::Analytics);
}

#[test]
fn test_retrieval_finds_named_breed() {
  let retriever = BreedRetriever::build(model(), Ok(dataset())).unwrap();
  let results = retriever.retrieve("Tell me about the Siberian Husky", 3).unwrap();

  assert_eq!(results.len(), 3);
  assert_eq!(results[0].record.breed, "Siberian Husky");
  assert_eq!(results[0].rank, 1);
  assert!(results.windows(2).all(|pair| pair[0].similarity >= pair[1].similarity));
}

#[test]
fn test_every_breed_is_reachable_with_large_k() {
  let table = dataset();
  let retriever = BreedRetriever::build(model(), Ok(table.clone())).unwrap();
  let mut indices: Vec<usize> =
    retriever.retrieve("friendly dog", 100).unwrap().into_iter().map(|r| r.index).collect();
  indices.sort_unstable();

  assert_eq!(indices, (0..table.len()).collect::<Vec<_>>());
}
