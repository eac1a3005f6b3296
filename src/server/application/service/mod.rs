pub mod interface_translator;
pub mod lifecycle_service;
pub mod power_guard;
pub mod storage_reconciler;
pub mod template_reconciler;
