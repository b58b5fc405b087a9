//! Breed records and the dataset they are loaded from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Result, WoofwiseError};

/// One row of the breed dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreedRecord {
  pub breed: String,
  pub size: String,
  pub coat_type: String,
  pub life_expectancy: String,
  pub temperament: String,
  pub energy_level: String,
  pub trainability: String,
  pub grooming: String,
}

impl BreedRecord {
  /// Natural-language rendering used for embedding. The wording is fixed;
  /// changing it invalidates every cached breed embedding.
  pub fn describe(&self) -> String {
    format!(
      "The {} is a {} sized dog. It has {} fur and typically lives {} years. \
       This breed is known for being {}. They require {} exercise and are {} to train. \
       Their grooming needs are {}.",
      self.breed,
      self.size,
      self.coat_type,
      self.life_expectancy,
      self.temperament,
      self.energy_level,
      self.trainability,
      self.grooming
    )
  }

  pub fn get(&self, column: BreedColumn) -> &str {
    match column {
      BreedColumn::Breed => &self.breed,
      BreedColumn::Size => &self.size,
      BreedColumn::CoatType => &self.coat_type,
      BreedColumn::LifeExpectancy => &self.life_expectancy,
      BreedColumn::Temperament => &self.temperament,
      BreedColumn::EnergyLevel => &self.energy_level,
      BreedColumn::Trainability => &self.trainability,
      BreedColumn::Grooming => &self.grooming,
    }
  }
}

/// The fixed columns of the breed dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreedColumn {
  Breed,
  Size,
  CoatType,
  LifeExpectancy,
  Temperament,
  EnergyLevel,
  Trainability,
  Grooming,
}

impl BreedColumn {
  pub const ALL: [BreedColumn; 8] = [
    BreedColumn::Breed,
    BreedColumn::Size,
    BreedColumn::CoatType,
    BreedColumn::LifeExpectancy,
    BreedColumn::Temperament,
    BreedColumn::EnergyLevel,
    BreedColumn::Trainability,
    BreedColumn::Grooming,
  ];

  pub fn name(self) -> &'static str {
    match self {
      BreedColumn::Breed => "breed",
      BreedColumn::Size => "size",
      BreedColumn::CoatType => "coat_type",
      BreedColumn::LifeExpectancy => "life_expectancy",
      BreedColumn::Temperament => "temperament",
      BreedColumn::EnergyLevel => "energy_level",
      BreedColumn::Trainability => "trainability",
      BreedColumn::Grooming => "grooming",
    }
  }
}

impl fmt::Display for BreedColumn {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for BreedColumn {
  type Err = WoofwiseError;

  fn from_str(value: &str) -> Result<Self> {
    let wanted = value.trim();
    BreedColumn::ALL
      .into_iter()
      .find(|column| column.name().eq_ignore_ascii_case(wanted))
      .ok_or_else(|| WoofwiseError::query_plan(format!("unknown column '{wanted}'")))
  }
}

/// The loaded breed dataset. Immutable once loaded; row order is preserved
/// and is the identity of a record, so duplicate breed names stay distinct.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BreedTable {
  records: Vec<BreedRecord>,
}

impl BreedTable {
  pub fn new(records: Vec<BreedRecord>) -> Self {
    Self { records }
  }

  /// Load a headered CSV file. A missing or unreadable file is reported as
  /// `DatasetUnavailable` so callers can degrade instead of aborting.
  pub fn from_csv_path(path: &Path) -> Result<Self> {
    let file = std::fs::File::open(path).map_err(|e| {
      WoofwiseError::dataset_unavailable(format!("cannot open {}: {e}", path.display()))
    })?;
    Self::from_reader(file)
  }

  pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let headers = csv_reader.headers().map_err(|e| WoofwiseError::Dataset(format!("header: {e}")))?;
    let missing: Vec<&str> = BreedColumn::ALL
      .iter()
      .map(|column| column.name())
      .filter(|name| !headers.iter().any(|header| header == *name))
      .collect();
    if !missing.is_empty() {
      return Err(WoofwiseError::Dataset(format!("missing columns: {}", missing.join(", "))));
    }

    let mut records = Vec::new();
    for (row, result) in csv_reader.deserialize::<BreedRecord>().enumerate() {
      // row + 2: one for the header, one for 1-based numbering
      let record =
        result.map_err(|e| WoofwiseError::Dataset(format!("row {}: {e}", row + 2)))?;
      records.push(record);
    }

    Ok(Self { records })
  }

  pub fn records(&self) -> &[BreedRecord] {
    &self.records
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  pub fn column_names(&self) -> Vec<&'static str> {
    BreedColumn::ALL.iter().map(|c| c.name()).collect()
  }

  /// One description per record, in row order
  pub fn descriptions(&self) -> Vec<String> {
    self.records.iter().map(BreedRecord::describe).collect()
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;

  pub(crate) const SAMPLE_CSV: &str = "\
breed,size,coat_type,life_expectancy,temperament,energy_level,trainability,grooming
Labrador Retriever,Large,Double,10-12 years,\"Friendly, Active\",High,Easy,Moderate
German Shepherd,Large,Double,9-13 years,\"Loyal, Confident\",High,Easy,High
Golden Retriever,Large,Double,10-12 years,\"Friendly, Intelligent\",High,Easy,High
";

  pub(crate) fn sample_table() -> BreedTable {
    BreedTable::from_reader(SAMPLE_CSV.as_bytes()).unwrap()
  }

  #[test]
  fn test_from_reader_parses_quoted_fields() {
    let table = sample_table();
    assert_eq!(table.len(), 3);
    assert_eq!(table.records()[0].breed, "Labrador Retriever");
    assert_eq!(table.records()[0].temperament, "Friendly, Active");
  }

  #[test]
  fn test_describe_uses_fixed_template() {
    let table = sample_table();
    let record = &table.records()[0];
    assert_eq!(
      record.describe(),
      "The Labrador Retriever is a Large sized dog. It has Double fur and typically lives \
       10-12 years years. This breed is known for being Friendly, Active. They require High \
       exercise and are Easy to train. Their grooming needs are Moderate."
    );
  }

  #[test]
  fn test_descriptions_are_one_per_record() {
    let table = sample_table();
    let descriptions = table.descriptions();

    assert_eq!(descriptions.len(), table.len());
    for description in &descriptions {
      assert!(description.contains("is a"));
      assert!(description.contains("sized dog"));
    }
  }

  #[test]
  fn test_missing_file_is_unavailable() {
    let err = BreedTable::from_csv_path(Path::new("/definitely/not/here.csv")).unwrap_err();
    assert!(err.is_unavailable());
  }

  #[test]
  fn test_missing_column_is_dataset_error() {
    let csv = "breed,size\nPug,Small\n";
    let err = BreedTable::from_reader(csv.as_bytes()).unwrap_err();
    assert!(matches!(err, WoofwiseError::Dataset(_)));
  }

  #[test]
  fn test_header_only_wrong_schema_is_dataset_error() {
    let err = BreedTable::from_reader("name,weight\n".as_bytes()).unwrap_err();
    match err {
      WoofwiseError::Dataset(message) => {
        assert!(message.contains("breed"));
        assert!(message.contains("grooming"));
      }
      other => panic!("expected dataset error, got {other:?}"),
    }
  }

  #[test]
  fn test_header_only_valid_schema_is_empty() {
    let header = SAMPLE_CSV.lines().next().unwrap();
    let table = BreedTable::from_reader(format!("{header}\n").as_bytes()).unwrap();
    assert!(table.is_empty());
  }

  #[test]
  fn test_duplicate_names_are_kept() {
    let csv = format!("{}Labrador Retriever,Medium,Short,11-13 years,Calm,Low,Moderate,Low\n", SAMPLE_CSV);
    let table = BreedTable::from_reader(csv.as_bytes()).unwrap();
    assert_eq!(table.len(), 4);
    assert_eq!(table.records()[0].breed, table.records()[3].breed);
  }

  #[test]
  fn test_column_parsing() {
    assert_eq!("life_expectancy".parse::<BreedColumn>().unwrap(), BreedColumn::LifeExpectancy);
    assert_eq!("Energy_Level".parse::<BreedColumn>().unwrap(), BreedColumn::EnergyLevel);
    assert!("weight".parse::<BreedColumn>().is_err());
    assert_eq!(sample_table().column_names().len(), 8);
  }

  #[test]
  fn test_get_reads_column() {
    let table = sample_table();
    let record = &table.records()[1];
    assert_eq!(record.get(BreedColumn::Breed), "German Shepherd");
    assert_eq!(record.get(BreedColumn::Grooming), "High");
  }
}
