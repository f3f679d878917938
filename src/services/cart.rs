use crate::{
    entities::{
        cart_item, product::ProductStatus, CartItem, CartItemModel, Product, ProductModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Shopping cart service.
///
/// Quantities are clamped to the product's available stock at write time, so
/// a cart row never promises more units than the shop can sell.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Adds a product to the buyer's cart, or tops up the existing row.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartItemModel, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must be positive".to_string(),
            ));
        }

        let product = self.sellable_product(product_id).await?;

        let existing = CartItem::find_by_id((user_id, product_id))
            .one(&*self.db)
            .await?;

        let item = match existing {
            Some(item) => {
                let clamped = (item.quantity + quantity).min(product.quantity);
                let mut active: cart_item::ActiveModel = item.into();
                active.quantity = Set(clamped);
                active.updated_at = Set(Utc::now());
                active.update(&*self.db).await?
            }
            None => {
                let item = cart_item::ActiveModel {
                    user_id: Set(user_id),
                    product_id: Set(product_id),
                    quantity: Set(quantity.min(product.quantity)),
                    created_at: Set(Utc::now()),
                    updated_at: Set(Utc::now()),
                };
                item.insert(&*self.db).await?
            }
        };

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                user_id,
                product_id,
                quantity: item.quantity,
            })
            .await;

        info!(
            "Cart of {} now holds {} x product {}",
            user_id, item.quantity, product_id
        );
        Ok(item)
    }

    /// Sets the quantity of a cart row; zero or negative removes it.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Option<CartItemModel>, ServiceError> {
        if quantity <= 0 {
            self.remove_item(user_id, product_id).await?;
            return Ok(None);
        }

        let product = self.sellable_product(product_id).await?;
        let item = CartItem::find_by_id((user_id, product_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} is not in the cart", product_id))
            })?;

        let mut active: cart_item::ActiveModel = item.into();
        active.quantity = Set(quantity.min(product.quantity));
        active.updated_at = Set(Utc::now());
        Ok(Some(active.update(&*self.db).await?))
    }

    #[instrument(skip(self))]
    pub async fn remove_item(&self, user_id: Uuid, product_id: Uuid) -> Result<(), ServiceError> {
        CartItem::delete_by_id((user_id, product_id))
            .exec(&*self.db)
            .await?;
        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                user_id,
                product_id,
            })
            .await;
        Ok(())
    }

    /// Returns the buyer's cart joined with product details.
    pub async fn get_cart(&self, user_id: Uuid) -> Result<Vec<CartLine>, ServiceError> {
        let rows = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .find_also_related(Product)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(item, product)| product.map(|p| CartLine::new(item, p)))
            .collect())
    }

    /// Groups the buyer's selected cart items by owning shop.
    ///
    /// This is the mechanism by which one checkout submission becomes N
    /// sales orders: shipping quotes and coupons are shop-scoped, so each
    /// group is priced and persisted as its own order.
    pub async fn group_by_shop<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: Uuid,
        selected_product_ids: &[Uuid],
    ) -> Result<Vec<ShopGroup>, ServiceError> {
        let rows = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductId.is_in(selected_product_ids.to_vec()))
            .find_also_related(Product)
            .all(conn)
            .await?;

        if rows.is_empty() {
            return Err(ServiceError::ValidationError(
                "No cart items match the selected products".to_string(),
            ));
        }

        let mut groups: Vec<ShopGroup> = Vec::new();
        for (item, product) in rows {
            let product = product.ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", item.product_id))
            })?;
            match groups.iter_mut().find(|g| g.shop_id == product.shop_id) {
                Some(group) => group.items.push(GroupItem {
                    product,
                    quantity: item.quantity,
                }),
                None => groups.push(ShopGroup {
                    shop_id: product.shop_id,
                    items: vec![GroupItem {
                        product,
                        quantity: item.quantity,
                    }],
                }),
            }
        }
        Ok(groups)
    }

    async fn sellable_product(&self, product_id: Uuid) -> Result<ProductModel, ServiceError> {
        let product = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        if product.status != ProductStatus::Active {
            return Err(ServiceError::ValidationError(format!(
                "Product {} is not available",
                product_id
            )));
        }
        if product.quantity <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "Product {} is out of stock",
                product_id
            )));
        }
        Ok(product)
    }
}

/// One cart row joined with its product.
#[derive(Debug, Serialize)]
pub struct CartLine {
    pub product: ProductModel,
    pub quantity: i32,
}

impl CartLine {
    fn new(item: CartItemModel, product: ProductModel) -> Self {
        Self {
            quantity: item.quantity,
            product,
        }
    }
}

/// The subset of a checkout's cart items belonging to one shop; becomes
/// exactly one sales order.
#[derive(Debug, Clone)]
pub struct ShopGroup {
    pub shop_id: Uuid,
    pub items: Vec<GroupItem>,
}

#[derive(Debug, Clone)]
pub struct GroupItem {
    pub product: ProductModel,
    pub quantity: i32,
}

impl ShopGroup {
    /// Distinct category ids across the group, used for coupon restriction
    /// checks.
    pub fn category_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.items.iter().map(|i| i.product.category_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}
