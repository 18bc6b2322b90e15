//! Sheet identifier registry.
//!
//! The mapper registers each sheet once, in document order. Every later
//! extractor resolves sheet names through here so a chart or pivot that
//! names a sheet lands on the same id the mapper produced.

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::SkipReason;

#[derive(Debug, Default, Clone)]
pub struct SheetRegistry {
    ids_by_name: HashMap<String, String>,
    ordinals_by_name: HashMap<String, usize>,
    ids_by_ordinal: Vec<String>,
}

impl SheetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh id for the next sheet and record it under `name`.
    ///
    /// A repeated name keeps its first mapping; the new ordinal still gets
    /// its own id.
    pub fn register(&mut self, name: &str) -> String {
        let id = Uuid::new_v4().simple().to_string();
        let ordinal = self.ids_by_ordinal.len();
        self.ids_by_ordinal.push(id.clone());
        self.ids_by_name
            .entry(name.to_string())
            .or_insert_with(|| id.clone());
        self.ordinals_by_name
            .entry(name.to_string())
            .or_insert(ordinal);
        id
    }

    pub fn id_for_name(&self, name: &str) -> Option<&str> {
        self.ids_by_name.get(name).map(String::as_str)
    }

    pub fn ordinal_for_name(&self, name: &str) -> Option<usize> {
        self.ordinals_by_name.get(name).copied()
    }

    pub fn id_for_ordinal(&self, ordinal: usize) -> Option<&str> {
        self.ids_by_ordinal.get(ordinal).map(String::as_str)
    }

    /// Look a sheet up by name for an extractor; a miss is a skip, not an error.
    pub fn resolve(&self, name: &str) -> Result<&str, SkipReason> {
        self.id_for_name(name)
            .ok_or_else(|| SkipReason::UnknownSheet(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.ids_by_ordinal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids_by_ordinal.is_empty()
    }

    /// Ids in registration order.
    pub fn ids(&self) -> &[String] {
        &self.ids_by_ordinal
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut reg = SheetRegistry::new();
        let a = reg.register("Sales");
        let b = reg.register("Costs");
        assert_ne!(a, b);
        assert_eq!(reg.id_for_name("Sales"), Some(a.as_str()));
        assert_eq!(reg.ordinal_for_name("Costs"), Some(1));
        assert_eq!(reg.id_for_ordinal(1), Some(b.as_str()));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_unknown_sheet_is_skip() {
        let reg = SheetRegistry::new();
        assert_eq!(
            reg.resolve("Ghost"),
            Err(SkipReason::UnknownSheet("Ghost".to_string()))
        );
    }

    #[test]
    fn test_ids_differ_between_registries() {
        let mut first = SheetRegistry::new();
        let mut second = SheetRegistry::new();
        assert_ne!(first.register("Sheet1"), second.register("Sheet1"));
    }

    #[test]
    fn test_duplicate_name_keeps_first_mapping() {
        let mut reg = SheetRegistry::new();
        let first = reg.register("Dup");
        let second = reg.register("Dup");
        assert_eq!(reg.id_for_name("Dup"), Some(first.as_str()));
        assert_eq!(reg.id_for_ordinal(1), Some(second.as_str()));
        assert_eq!(reg.ordinal_for_name("Dup"), Some(0));
    }
}
