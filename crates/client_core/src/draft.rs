use shared::domain::ProductId;

use crate::{
    catalog::{Product, ProductStore},
    error::StoreError,
    transport::FilePart,
};

/// Locally staged, unconfirmed image edits for one product.
///
/// Nothing here is ever mistaken for confirmed store state: staged additions
/// and removals live only in this value until `commit`, which replays them
/// through the store's confirmed operations in order (removals first, then
/// uploads).
#[derive(Debug, Default)]
pub struct ImageDraft {
    additions: Vec<FilePart>,
    removals: Vec<String>,
}

impl ImageDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage_add(&mut self, part: FilePart) {
        self.additions.push(part);
    }

    pub fn stage_remove(&mut self, url: impl Into<String>) {
        let url = url.into();
        if !self.removals.contains(&url) {
            self.removals.push(url);
        }
    }

    pub fn unstage_remove(&mut self, url: &str) {
        self.removals.retain(|staged| staged != url);
    }

    pub fn staged_additions(&self) -> &[FilePart] {
        &self.additions
    }

    pub fn staged_removals(&self) -> &[String] {
        &self.removals
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }

    /// Applies the staged edits against the store. Returns the product as of
    /// the last confirmed step, or None when there was nothing staged. Stops
    /// at the first failure; already-confirmed steps stay applied.
    pub async fn commit(
        self,
        store: &ProductStore,
        id: ProductId,
    ) -> Result<Option<Product>, StoreError> {
        let mut last = None;
        for url in &self.removals {
            last = Some(store.remove_image(id, url).await?);
        }
        if !self.additions.is_empty() {
            last = Some(store.add_images(id, self.additions).await?);
        }
        Ok(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(name: &str) -> FilePart {
        FilePart {
            filename: name.to_string(),
            mime_type: Some("image/png".to_string()),
            bytes: vec![1, 2, 3],
        }
    }

    #[test]
    fn staging_is_local_and_deduplicated() {
        let mut draft = ImageDraft::new();
        assert!(draft.is_empty());

        draft.stage_add(part("a.png"));
        draft.stage_remove("/uploads/products/old.png");
        draft.stage_remove("/uploads/products/old.png");
        assert_eq!(draft.staged_additions().len(), 1);
        assert_eq!(draft.staged_removals().len(), 1);

        draft.unstage_remove("/uploads/products/old.png");
        assert!(draft.staged_removals().is_empty());
        assert!(!draft.is_empty());
    }
}
