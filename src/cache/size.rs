/// Bytes an entry is charged against the cache's `max_size`.
#[inline]
pub fn entry_size(key: &str, value: &[u8]) -> u64 {
    (key.len() + value.len()) as u64
}
