pub mod sqlite;

pub use sqlite::SqliteStore;

#[cfg(test)]
mod tests;
