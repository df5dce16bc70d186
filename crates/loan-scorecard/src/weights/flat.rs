use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use super::store::{
    open_atomic, NamingScheme, StagedFile, StagedWrite, StoreError, StoredWeights, WeightStore,
};

/// JSON object of `variable_id -> fraction`.
#[derive(Debug, Clone)]
pub struct FlatFileStore {
    name: String,
    path: PathBuf,
}

impl FlatFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            name: "weights-file".to_string(),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WeightStore for FlatFileStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn scheme(&self) -> NamingScheme {
        NamingScheme::Flat
    }

    fn read(&self) -> Result<StoredWeights, StoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Ok(StoredWeights::Flat(BTreeMap::new()))
            }
            Err(err) => return Err(StoreError::io(&self.name, err)),
        };

        let weights: BTreeMap<String, f64> = serde_json::from_reader(BufReader::new(file))
            .map_err(|source| StoreError::Json {
                store: self.name.clone(),
                source,
            })?;

        Ok(StoredWeights::Flat(weights))
    }

    fn stage(&self, weights: &StoredWeights) -> Result<Box<dyn StagedWrite>, StoreError> {
        let StoredWeights::Flat(weights) = weights else {
            return Err(StoreError::SchemeMismatch {
                store: self.name.clone(),
                expected: NamingScheme::Flat,
            });
        };

        let mut file = open_atomic(&self.name, &self.path)?;
        serde_json::to_writer_pretty(&mut file, weights).map_err(|source| StoreError::Json {
            store: self.name.clone(),
            source,
        })?;

        Ok(Box::new(StagedFile::new(&self.name, file)))
    }
}
