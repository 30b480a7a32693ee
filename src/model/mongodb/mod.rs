mod bson;
mod collection;
mod errors;

pub use bson::Id;
pub use collection::{ensure_indexes_exist, indexes, Coll, MongoCollection};
pub use errors::duplicate_key_message;
