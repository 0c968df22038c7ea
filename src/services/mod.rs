pub mod chat_store;
pub mod directory;

pub use chat_store::ChatStore;
pub use directory::Directory;
