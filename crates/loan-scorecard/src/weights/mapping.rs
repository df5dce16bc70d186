use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::scoring::defaults::TABLE_ID_RENAMES;
use crate::scoring::VariableScoringRegistry;

/// One variable's identity in both naming schemes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub flat_id: String,
    pub table_id: String,
    pub category: String,
}

impl MappingEntry {
    pub fn new(
        flat_id: impl Into<String>,
        table_id: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            flat_id: flat_id.into(),
            table_id: table_id.into(),
            category: category.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    #[error("flat id '{0}' is mapped more than once")]
    DuplicateFlatId(String),
    #[error("table id '{0}' is mapped more than once")]
    DuplicateTableId(String),
}

/// Explicit bidirectional id table between the flat and table stores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdMapping {
    by_flat: BTreeMap<String, MappingEntry>,
    flat_by_table: BTreeMap<String, String>,
}

impl IdMapping {
    pub fn new(entries: impl IntoIterator<Item = MappingEntry>) -> Result<Self, MappingError> {
        let mut mapping = Self::default();
        for entry in entries {
            mapping.insert(entry)?;
        }
        Ok(mapping)
    }

    /// Mapping for every registered variable. Table ids follow the registry id unless
    /// the variable has a known rename.
    pub fn from_registry(registry: &VariableScoringRegistry) -> Result<Self, MappingError> {
        Self::new(registry.definitions().map(|definition| {
            let flat_id = definition.id.as_str();
            MappingEntry::new(flat_id, table_id_for(flat_id), definition.category.clone())
        }))
    }

    pub fn insert(&mut self, entry: MappingEntry) -> Result<(), MappingError> {
        if self.by_flat.contains_key(&entry.flat_id) {
            return Err(MappingError::DuplicateFlatId(entry.flat_id));
        }
        if self.flat_by_table.contains_key(&entry.table_id) {
            return Err(MappingError::DuplicateTableId(entry.table_id));
        }

        self.flat_by_table
            .insert(entry.table_id.clone(), entry.flat_id.clone());
        self.by_flat.insert(entry.flat_id.clone(), entry);
        Ok(())
    }

    pub fn remove(&mut self, flat_id: &str) -> Option<MappingEntry> {
        let entry = self.by_flat.remove(flat_id)?;
        self.flat_by_table.remove(&entry.table_id);
        Some(entry)
    }

    pub fn by_flat(&self, flat_id: &str) -> Option<&MappingEntry> {
        self.by_flat.get(flat_id)
    }

    pub fn by_table(&self, table_id: &str) -> Option<&MappingEntry> {
        self.flat_by_table
            .get(table_id)
            .and_then(|flat_id| self.by_flat.get(flat_id))
    }

    pub fn entries(&self) -> impl Iterator<Item = &MappingEntry> {
        self.by_flat.values()
    }

    pub fn len(&self) -> usize {
        self.by_flat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_flat.is_empty()
    }
}

/// Table id a registry id is stored under.
pub fn table_id_for(flat_id: &str) -> String {
    TABLE_ID_RENAMES
        .iter()
        .find(|(flat, _)| *flat == flat_id)
        .map(|(_, table)| (*table).to_string())
        .unwrap_or_else(|| flat_id.to_string())
}
