// Database module
// SQLite with the sqlite-vec extension holds passages and their embeddings

pub mod sqlite;

pub use sqlite::*;
