//! Test fixtures for generating test data.

use bytes::Bytes;
use futures::Stream;
use scrivener_metadata::MetadataStore;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

static USER_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate deterministic test data based on a seed.
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}

/// Stream `data` in chunks of `chunk_size`.
#[allow(dead_code)]
pub fn content(data: &[u8], chunk_size: usize) -> impl Stream<Item = std::io::Result<Bytes>> + Send + use<> {
    let chunks: Vec<_> = data
        .chunks(chunk_size)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    futures::stream::iter(chunks)
}

/// A stream that yields one chunk and then breaks.
#[allow(dead_code)]
pub fn broken_content() -> impl Stream<Item = std::io::Result<Bytes>> + Send {
    futures::stream::iter(vec![
        Ok(Bytes::from_static(b"first chunk")),
        Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "client went away",
        )),
    ])
}

/// Create a user with a unique email.
#[allow(dead_code)]
pub async fn create_user(store: &dyn MetadataStore) -> Uuid {
    let n = USER_COUNTER.fetch_add(1, Ordering::Relaxed);
    store
        .create_user(&format!("user{n}-{}@example.com", Uuid::new_v4().simple()))
        .await
        .expect("create user")
        .user_id
}
