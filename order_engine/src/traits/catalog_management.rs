use crate::{
    db_types::{Coupon, CouponId, NewCoupon, NewProduct, Product, ProductId},
    traits::OrderError,
};

#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    async fn insert_product(&self, product: NewProduct) -> Result<Product, OrderError>;

    /// Returns the product if it exists and has not been soft-deleted.
    async fn fetch_active_product(&self, product_id: ProductId) -> Result<Option<Product>, OrderError>;

    async fn issue_coupon(&self, coupon: NewCoupon) -> Result<Coupon, OrderError>;

    async fn fetch_coupon(&self, coupon_id: CouponId) -> Result<Option<Coupon>, OrderError>;
}
