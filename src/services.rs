pub mod label_context;
pub mod label_renderer;
pub mod label_service;
pub mod pdf;
pub mod plugins;
pub mod template_engine;
