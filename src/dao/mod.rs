/// Storage-level models shared by every backend.
pub mod models;
/// Session persistence trait and its backends.
pub mod session_store;
/// Storage abstraction layer for database operations.
pub mod storage;
