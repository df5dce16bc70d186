use std::collections::BTreeSet;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::store::{
    open_atomic, NamingScheme, StagedFile, StagedWrite, StoreError, StoredWeights, WeightRow,
    WeightStore,
};

/// Categorized weight table stored as CSV rows with percentage weights.
///
/// Only active rows are read back. A write activates every pushed row and keeps rows for
/// variables outside the pushed set as inactive.
#[derive(Debug, Clone)]
pub struct TableFileStore {
    name: String,
    path: PathBuf,
}

impl TableFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            name: "weights-table".to_string(),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every row on disk, active or not.
    pub fn rows(&self) -> Result<Vec<WeightRow>, StoreError> {
        let mut reader = match csv::Reader::from_path(&self.path) {
            Ok(reader) => reader,
            Err(err) => {
                let missing = matches!(
                    err.kind(),
                    csv::ErrorKind::Io(io) if io.kind() == ErrorKind::NotFound
                );
                return if missing {
                    Ok(Vec::new())
                } else {
                    Err(self.csv_error(err))
                };
            }
        };

        reader
            .deserialize::<WeightRow>()
            .map(|row| row.map_err(|err| self.csv_error(err)))
            .collect()
    }

    fn csv_error(&self, source: csv::Error) -> StoreError {
        StoreError::Csv {
            store: self.name.clone(),
            source,
        }
    }
}

impl WeightStore for TableFileStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn scheme(&self) -> NamingScheme {
        NamingScheme::Table
    }

    fn read(&self) -> Result<StoredWeights, StoreError> {
        let rows = self
            .rows()?
            .into_iter()
            .filter(|row| row.is_active)
            .collect();
        Ok(StoredWeights::Table(rows))
    }

    fn stage(&self, weights: &StoredWeights) -> Result<Box<dyn StagedWrite>, StoreError> {
        let StoredWeights::Table(incoming) = weights else {
            return Err(StoreError::SchemeMismatch {
                store: self.name.clone(),
                expected: NamingScheme::Table,
            });
        };

        let pushed: BTreeSet<&str> = incoming
            .iter()
            .map(|row| row.variable_id.as_str())
            .collect();
        let retired = self
            .rows()?
            .into_iter()
            .filter(|row| !pushed.contains(row.variable_id.as_str()))
            .map(|row| WeightRow {
                is_active: false,
                ..row
            });

        let mut file = open_atomic(&self.name, &self.path)?;
        {
            let mut writer = csv::Writer::from_writer(&mut file);
            for row in incoming.iter().cloned().chain(retired) {
                writer.serialize(row).map_err(|err| self.csv_error(err))?;
            }
            writer
                .flush()
                .map_err(|source| StoreError::io(&self.name, source))?;
        }
        file.flush()
            .map_err(|source| StoreError::io(&self.name, source))?;

        Ok(Box::new(StagedFile::new(&self.name, file)))
    }
}
