pub mod carts;
pub mod inventory;
pub mod orders;
pub mod payments;
pub mod pricing;
