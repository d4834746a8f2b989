//! Pure domain logic: stock math, variant consolidation, pricing,
//! role-based projection, and the checkout cart snapshot.

pub mod cart;
pub mod pricing;
pub mod projection;
pub mod stock;
pub mod variants;
