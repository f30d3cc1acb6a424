use crate::{
    models::page::Cursor,
    providers::{clover_rest::response as clover, square_rest::response as square},
};

/// Raw catalog objects of one page, in the shape the provider returned them.
#[derive(Debug, Clone)]
pub enum CatalogObjects {
    /// Items, categories and images (Square returns them mixed in one listing).
    Square(Vec<square::CatalogObject>),
    /// Inventory items with categories, stock and item group expanded.
    Clover(Vec<clover::Item>),
}

impl CatalogObjects {
    pub fn len(&self) -> usize {
        match self {
            CatalogObjects::Square(objects) => objects.len(),
            CatalogObjects::Clover(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One page of a catalog listing plus the cursor of the following page.
#[derive(Debug, Clone)]
pub struct CatalogPage {
    pub objects: CatalogObjects,
    pub next: Option<Cursor>,
}

/// A category as looked up by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCategory {
    pub id: String,
    pub name: String,
}
