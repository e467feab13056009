pub mod inventory;
pub mod label;
