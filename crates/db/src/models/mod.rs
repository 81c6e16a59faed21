pub mod event_log;
pub mod garment;
pub mod garment_service;
pub mod order;
pub mod service;
pub mod task;
pub mod timer;
