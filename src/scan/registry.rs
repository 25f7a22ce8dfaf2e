//! Asset Registry - the scan universe `All`

use std::collections::BTreeSet;

use crate::Result;
use crate::asset::AssetId;
use crate::storage::MediaStore;

/// Immutable set of every image asset in the store, computed once per scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetRegistry {
    ids: BTreeSet<AssetId>,
}

impl AssetRegistry {
    /// Enumerate every `image/*` asset. A store failure here is fatal for the scan.
    pub fn enumerate<S: MediaStore + ?Sized>(store: &S) -> Result<Self> {
        let ids: BTreeSet<AssetId> = store.list_image_asset_ids()?.into_iter().collect();
        tracing::debug!("Asset registry holds {} image assets", ids.len());
        Ok(Self { ids })
    }

    /// Build a registry from known ids
    pub fn from_ids(ids: impl IntoIterator<Item = AssetId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    /// Membership test used to keep `Used ⊆ All`
    pub fn contains(&self, id: AssetId) -> bool {
        self.ids.contains(&id)
    }

    /// Ids in ascending order
    pub fn iter(&self) -> impl Iterator<Item = AssetId> + '_ {
        self.ids.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;

    #[test]
    fn test_enumerate_only_images() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_attachment(5, "image/webp", "x.webp").unwrap();
        store.insert_attachment(2, "image/gif", "y.gif").unwrap();
        store.insert_attachment(9, "video/mp4", "z.mp4").unwrap();
        store.insert_content(7, "post", "publish", "").unwrap();

        let registry = AssetRegistry::enumerate(&store).unwrap();
        let ids: Vec<u64> = registry.iter().map(|id| id.get()).collect();
        assert_eq!(ids, vec![2, 5]);
        assert!(registry.contains(AssetId::new(5).unwrap()));
        assert!(!registry.contains(AssetId::new(9).unwrap()));
    }

    #[test]
    fn test_empty_store() {
        let store = SqliteStore::open_in_memory().unwrap();
        let registry = AssetRegistry::enumerate(&store).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }
}
