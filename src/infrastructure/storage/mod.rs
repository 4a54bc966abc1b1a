mod object_media_store;
mod store_factory;

pub use object_media_store::{ObjectMediaStore, S3Location};
pub use store_factory::MediaStoreFactory;
