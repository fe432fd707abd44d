use crate::types::SymbolEntry;
use log::trace;

/// Symbol table: labels in definition order with their resolved addresses.
/// Lookups ignore case; names are stored as written by the classifier.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    entries: Vec<SymbolEntry>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&SymbolEntry> {
        self.entries
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
    }

    /// Append a label. Callers check for duplicates first.
    pub fn insert(&mut self, name: &str, address: u32) {
        trace!("TSI += {} @ {:06X}", name, address);
        self.entries.push(SymbolEntry {
            name: name.to_string(),
            address,
        });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[SymbolEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(name, address as six hex digits)` pairs for display
    pub fn to_display_pairs(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|entry| (entry.name.clone(), format!("{:06X}", entry.address)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ignores_case() {
        let mut tsi = SymbolTable::new();
        tsi.insert("LOOP", 0x107);
        assert!(tsi.contains("loop"));
        assert_eq!(tsi.get("Loop").unwrap().address, 0x107);
        assert!(tsi.get("L2").is_none());
    }

    #[test]
    fn test_display_pairs_keep_order() {
        let mut tsi = SymbolTable::new();
        tsi.insert("B", 0x10);
        tsi.insert("A", 0xABCDEF);
        assert_eq!(
            tsi.to_display_pairs(),
            vec![
                ("B".to_string(), "000010".to_string()),
                ("A".to_string(), "ABCDEF".to_string())
            ]
        );
        tsi.clear();
        assert!(tsi.is_empty());
    }
}
