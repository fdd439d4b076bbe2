use wordcloud_core::object_store::ObjectWriteOptions;

/// Storage seam for the generate handler. The S3-backed implementation
/// lives in the runtime binary; tests and the local pipeline supply
/// in-memory stores.
pub trait ImageStore {
    fn put_image(&self, key: &str, body: &[u8], options: &ObjectWriteOptions)
        -> Result<(), String>;
}
