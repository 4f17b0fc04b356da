use dashmap::DashMap;

/// In-memory store for the keys this node owns. Values are opaque bytes.
///
/// Backed by a concurrent map: operations on distinct keys proceed in
/// parallel, operations on the same key are serialized per entry, so a
/// concurrent set/delete pair can never interleave into a corrupt value.
pub struct LocalStore {
    data: DashMap<String, Vec<u8>>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.data.get(key).map(|entry| entry.value().clone())
    }

    pub fn set(&self, key: String, value: Vec<u8>) {
        self.data.insert(key, value);
    }

    /// Removes a key, returning its value, or `None` if it was absent.
    pub fn delete(&self, key: &str) -> Option<Vec<u8>> {
        self.data.remove(key).map(|(_, value)| value)
    }

    pub fn keys(&self) -> Vec<String> {
        self.data.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Every (key, value) pair, cloned out for migration.
    pub fn entries(&self) -> Vec<(String, Vec<u8>)> {
        self.data
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}
