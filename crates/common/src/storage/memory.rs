//! In-process store

use super::{ArtifactStore, TableKey, TableKind};
use crate::errors::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryArtifactStore {
    tables: RwLock<HashMap<TableKey, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn get(&self, key: &TableKey) -> Result<Option<Vec<u8>>> {
        Ok(self.tables.read().await.get(key).cloned())
    }

    async fn put(&self, key: &TableKey, bytes: Vec<u8>) -> Result<()> {
        self.tables.write().await.insert(key.clone(), bytes);
        Ok(())
    }

    async fn versions(&self, kind: TableKind) -> Result<Vec<String>> {
        let mut versions: Vec<String> = self
            .tables
            .read()
            .await
            .keys()
            .filter(|k| k.kind == kind)
            .filter_map(|k| k.version.clone())
            .collect();
        versions.sort();
        Ok(versions)
    }
}
