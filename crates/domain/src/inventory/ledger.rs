use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{Page, PageRequest, ProductId};
use tokio::sync::{Mutex, RwLock};

use super::{Category, InventoryError, NewProduct, Product, ProductSearch, Reservation};
use crate::money::{DiscountPercent, Money};

/// Read access to the product catalog.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Current snapshot of the product with this slug.
    async fn find_by_slug(&self, slug: &str) -> Result<Product, InventoryError>;

    /// Products matching `criteria`, sorted by name.
    async fn search(
        &self,
        criteria: &ProductSearch,
        page: PageRequest,
    ) -> Result<Page<Product>, InventoryError>;
}

/// Stock reservations for orders.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Takes `quantity` units of an active product.
    ///
    /// Linearizable per product: of several reservations racing for the
    /// last units, only those the stock covers succeed.
    async fn reserve(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Reservation, InventoryError>;

    /// Returns `quantity` units to stock. Never fails; unknown products are
    /// logged and ignored.
    async fn release(&self, product_id: ProductId, quantity: u32);
}

#[derive(Debug, Default)]
struct Catalog {
    products: HashMap<ProductId, Arc<Mutex<Product>>>,
    slugs: HashMap<String, ProductId>,
}

/// In-memory catalog and ledger.
///
/// Each product sits behind its own mutex, which is the serialization point
/// for its stock counter. Reservations on different products never contend.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventory {
    catalog: Arc<RwLock<Catalog>>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a product to the catalog.
    #[tracing::instrument(skip(self, product), fields(slug = %product.slug))]
    pub async fn register_product(&self, product: NewProduct) -> Result<Product, InventoryError> {
        let slug = product.slug.trim().to_string();
        if slug.is_empty() {
            return Err(InventoryError::InvalidProduct("slug is required".to_string()));
        }
        if product.unit_price.is_negative() {
            return Err(InventoryError::InvalidProduct(format!(
                "unit price must not be negative, got {}",
                product.unit_price
            )));
        }

        let mut catalog = self.catalog.write().await;
        if catalog.slugs.contains_key(&slug) {
            return Err(InventoryError::DuplicateSlug { slug });
        }

        let created = Product {
            id: ProductId::new(),
            slug: slug.clone(),
            name: product.name,
            category: product
                .category
                .filter(|name| !name.trim().is_empty())
                .map(|name| Category { name }),
            unit_price: product.unit_price,
            discount: product.discount,
            amount: product.amount,
            active: product.active,
            created_at: Utc::now(),
        };

        catalog.slugs.insert(slug, created.id);
        catalog
            .products
            .insert(created.id, Arc::new(Mutex::new(created.clone())));

        tracing::info!(product_id = %created.id, "product registered");
        Ok(created)
    }

    /// Changes price and discount. Existing orders keep their frozen prices.
    pub async fn update_pricing(
        &self,
        product_id: ProductId,
        unit_price: Money,
        discount: DiscountPercent,
    ) -> Result<Product, InventoryError> {
        if unit_price.is_negative() {
            return Err(InventoryError::InvalidProduct(format!(
                "unit price must not be negative, got {unit_price}"
            )));
        }
        let entry = self.entry(product_id).await?;
        let mut product = entry.lock().await;
        product.unit_price = unit_price;
        product.discount = discount;
        Ok(product.clone())
    }

    pub async fn set_active(
        &self,
        product_id: ProductId,
        active: bool,
    ) -> Result<Product, InventoryError> {
        let entry = self.entry(product_id).await?;
        let mut product = entry.lock().await;
        product.active = active;
        Ok(product.clone())
    }

    /// Adds `quantity` units of new stock.
    pub async fn restock(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Product, InventoryError> {
        let entry = self.entry(product_id).await?;
        let mut product = entry.lock().await;
        product.amount = product.amount.saturating_add(quantity);
        Ok(product.clone())
    }

    /// Snapshot of a product by id.
    pub async fn product(&self, product_id: ProductId) -> Result<Product, InventoryError> {
        let entry = self.entry(product_id).await?;
        let product = entry.lock().await;
        Ok(product.clone())
    }

    async fn entry(&self, product_id: ProductId) -> Result<Arc<Mutex<Product>>, InventoryError> {
        self.catalog
            .read()
            .await
            .products
            .get(&product_id)
            .cloned()
            .ok_or(InventoryError::UnknownProduct(product_id))
    }

    async fn snapshot_all(&self) -> Vec<Product> {
        let entries: Vec<_> = self.catalog.read().await.products.values().cloned().collect();
        let mut products = Vec::with_capacity(entries.len());
        for entry in entries {
            products.push(entry.lock().await.clone());
        }
        products
    }
}

#[async_trait]
impl ProductCatalog for InMemoryInventory {
    async fn find_by_slug(&self, slug: &str) -> Result<Product, InventoryError> {
        let not_found = || InventoryError::ProductNotFound {
            slug: slug.to_string(),
        };
        let product_id = self
            .catalog
            .read()
            .await
            .slugs
            .get(slug.trim())
            .copied()
            .ok_or_else(not_found)?;
        self.product(product_id).await.map_err(|_| not_found())
    }

    async fn search(
        &self,
        criteria: &ProductSearch,
        page: PageRequest,
    ) -> Result<Page<Product>, InventoryError> {
        let predicate = criteria.to_predicate()?;
        let mut matches = predicate.select(self.snapshot_all().await);
        matches.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.slug.cmp(&b.slug)));
        Ok(Page::slice(matches, page))
    }
}

#[async_trait]
impl InventoryLedger for InMemoryInventory {
    async fn reserve(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Reservation, InventoryError> {
        let entry = self.entry(product_id).await?;
        let mut product = entry.lock().await;

        if !product.active {
            metrics::counter!("inventory_reservations_rejected_total", "reason" => "inactive")
                .increment(1);
            return Err(InventoryError::ProductInactive {
                slug: product.slug.clone(),
            });
        }

        if quantity > product.amount {
            metrics::counter!(
                "inventory_reservations_rejected_total",
                "reason" => "insufficient_stock"
            )
            .increment(1);
            return Err(InventoryError::InsufficientStock {
                slug: product.slug.clone(),
                requested: quantity,
                available: product.amount,
            });
        }

        product.amount -= quantity;
        tracing::debug!(
            slug = %product.slug,
            quantity,
            remaining = product.amount,
            "stock reserved"
        );

        Ok(Reservation {
            product_id,
            slug: product.slug.clone(),
            unit_price: product.unit_price,
            discount: product.discount,
            quantity,
        })
    }

    async fn release(&self, product_id: ProductId, quantity: u32) {
        match self.entry(product_id).await {
            Ok(entry) => {
                let mut product = entry.lock().await;
                product.amount = product.amount.saturating_add(quantity);
                tracing::debug!(slug = %product.slug, quantity, "stock released");
            }
            Err(_) => {
                tracing::warn!(%product_id, quantity, "release for unknown product ignored");
            }
        }
    }
}
