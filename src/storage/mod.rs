pub mod layout;
pub mod file_lock;
pub mod snapshot;
pub mod persistence;
