//! Storage provider trait definitions

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use dataroom_core::{
    ByteStream, GetOptions, ListOptions, ListResult, PutOptions, PutResult, Result,
    SignedUrlOptions, StorageObjectInfo,
};
use futures::{StreamExt, TryStreamExt};

/// Uniform object storage contract implemented by every backend
///
/// Not-found is never an error: `get`/`get_info` return `Ok(None)`,
/// `exists`/`delete` return `Ok(false)` and `list` returns an empty page.
/// Backend and transport failures propagate unchanged; nothing here retries.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &'static str;

    /// Store `data` under `key`
    ///
    /// The returned hash is the SHA-256 of the bytes physically stored, so it
    /// covers the ciphertext when `opts.encrypt` is set.
    async fn put(&self, key: &str, data: Bytes, opts: PutOptions) -> Result<PutResult>;

    /// Buffer a stream fully, then [`put`](Self::put) it
    async fn put_stream(
        &self,
        key: &str,
        stream: ByteStream,
        opts: PutOptions,
    ) -> Result<PutResult> {
        let buffer = stream
            .try_fold(BytesMut::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await?;
        self.put(key, buffer.freeze(), opts).await
    }

    /// Read an object, decrypting when `opts.decrypt` is set
    async fn get(&self, key: &str, opts: GetOptions) -> Result<Option<Bytes>>;

    /// Read an object as a stream
    ///
    /// The default reads the whole object and yields it as one chunk.
    async fn get_stream(&self, key: &str, opts: GetOptions) -> Result<Option<ByteStream>> {
        let data = self.get(key, opts).await?;
        Ok(data.map(|bytes| futures::stream::once(async move { Ok(bytes) }).boxed()))
    }

    /// Delete an object; `false` when it did not exist
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Check whether an object exists
    async fn exists(&self, key: &str) -> Result<bool>;

    /// List keys, sorted, one page at a time
    async fn list(&self, opts: ListOptions) -> Result<ListResult>;

    /// Describe an object without reading its content
    async fn get_info(&self, key: &str) -> Result<Option<StorageObjectInfo>>;

    /// Time-limited URL authorizing `opts.method` on `key`
    async fn get_signed_url(&self, key: &str, opts: SignedUrlOptions) -> Result<String>;

    /// Copy stored bytes from `source` to `dest`
    ///
    /// Not atomic on every backend; callers must not rely on it being
    /// transactional.
    async fn copy(&self, source: &str, dest: &str) -> Result<()>;
}
