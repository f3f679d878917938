use crate::{
    entities::{
        category, product, product::ProductStatus, Category, CategoryModel, Product, ProductModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Product catalog management for shops.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// Input for creating a product listing.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub shop_id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub description: String,
    pub regular_price: Decimal,
    pub quantity: i32,
    pub weight_grams: i32,
    pub length_cm: i32,
    pub width_cm: i32,
    pub height_cm: i32,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, input), fields(shop_id = %input.shop_id))]
    pub async fn create_product(&self, input: NewProduct) -> Result<ProductModel, ServiceError> {
        if input.regular_price <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Regular price must be positive".to_string(),
            ));
        }
        if input.quantity < 0 {
            return Err(ServiceError::ValidationError(
                "Stock quantity cannot be negative".to_string(),
            ));
        }
        if input.weight_grams <= 0
            || input.length_cm <= 0
            || input.width_cm <= 0
            || input.height_cm <= 0
        {
            return Err(ServiceError::ValidationError(
                "Package weight and dimensions must be positive".to_string(),
            ));
        }

        Category::find_by_id(input.category_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Category {} not found", input.category_id))
            })?;

        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            shop_id: Set(input.shop_id),
            category_id: Set(input.category_id),
            name: Set(input.name),
            description: Set(input.description),
            regular_price: Set(input.regular_price),
            quantity: Set(input.quantity),
            status: Set(ProductStatus::Active),
            weight_grams: Set(input.weight_grams),
            length_cm: Set(input.length_cm),
            width_cm: Set(input.width_cm),
            height_cm: Set(input.height_cm),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductCreated(created.id))
            .await;
        info!("Product {} listed by shop {}", created.id, created.shop_id);
        Ok(created)
    }

    pub async fn get_product(&self, product_id: Uuid) -> Result<ProductModel, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    #[instrument(skip(self))]
    pub async fn set_stock(
        &self,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<ProductModel, ServiceError> {
        if quantity < 0 {
            return Err(ServiceError::ValidationError(
                "Stock quantity cannot be negative".to_string(),
            ));
        }
        let product = self.get_product(product_id).await?;
        let mut active: product::ActiveModel = product.into();
        active.quantity = Set(quantity);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    #[instrument(skip(self))]
    pub async fn set_status(
        &self,
        product_id: Uuid,
        status: ProductStatus,
    ) -> Result<ProductModel, ServiceError> {
        let product = self.get_product(product_id).await?;
        let mut active: product::ActiveModel = product.into();
        active.status = Set(status);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    pub async fn list_for_shop(
        &self,
        shop_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<ProductModel>, u64), ServiceError> {
        let paginator = Product::find()
            .filter(product::Column::ShopId.eq(shop_id))
            .order_by_desc(product::Column::CreatedAt)
            .paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let data = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((data, total))
    }

    /// Browsable storefront listing: active products, newest first, optionally
    /// restricted to one category.
    pub async fn list_active(
        &self,
        category_id: Option<Uuid>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<ProductModel>, u64), ServiceError> {
        let mut query = Product::find().filter(product::Column::Status.eq(ProductStatus::Active));
        if let Some(category_id) = category_id {
            query = query.filter(product::Column::CategoryId.eq(category_id));
        }
        let paginator = query
            .order_by_desc(product::Column::CreatedAt)
            .paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let data = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((data, total))
    }

    pub async fn create_category(&self, name: String) -> Result<CategoryModel, ServiceError> {
        if name.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Category name cannot be empty".to_string(),
            ));
        }
        let model = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            created_at: Set(Utc::now()),
        };
        Ok(model.insert(&*self.db).await?)
    }

    pub async fn list_categories(&self) -> Result<Vec<CategoryModel>, ServiceError> {
        Ok(Category::find()
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await?)
    }
}
