pub mod label_repo;
pub use label_repo::LabelRepository;
pub mod inventory_repo;
pub use inventory_repo::InventoryRepository;
