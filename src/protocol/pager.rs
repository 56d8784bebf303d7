//! Paging of oversized results onto the constrained transport.
//!
//! Offset paging slices a byte-stable snapshot of the full serialized
//! payload; index paging serves one ranked item at a time. Both rely on the
//! snapshot staying fixed for the duration of a pagination session, which
//! the result cache provides for its validity window.

/// Reserved terminal value signaling end-of-sequence in index paging.
/// Distinct from any JSON payload or diagnostic the handler produces.
pub const TERMINAL_MARKER: &[u8] = b"__END_OF_LIST__";

/// Reserved payload for an index whose item has no usable identity. The
/// controller advances its cursor past it like any other response.
pub const SKIP_MARKER: &[u8] = b"__SKIP__";

/// One item of an ordered result list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedItem {
    /// Primary identifying field; empty means "present but unusable".
    pub id: String,
    /// Serialized single-item payload.
    pub payload: Vec<u8>,
}

/// Immutable result of one query execution, in both paged forms.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Full serialized payload for offset paging.
    pub raw: Vec<u8>,
    /// Ranked items for index paging.
    pub items: Vec<IndexedItem>,
}

/// Result of an index-paged lookup.
#[derive(Debug, PartialEq, Eq)]
pub enum IndexPage<'a> {
    Item(&'a [u8]),
    Skip,
    End,
}

/// Slice `payload` at `offset`, at most `chunk_size` bytes. Offsets at or
/// past the end yield an empty slice.
pub fn offset_chunk(payload: &[u8], offset: usize, chunk_size: usize) -> &[u8] {
    if offset >= payload.len() {
        return &[];
    }
    let end = offset.saturating_add(chunk_size).min(payload.len());
    &payload[offset..end]
}

/// Look up the `index`-th item of the ranked list.
pub fn index_entry(items: &[IndexedItem], index: usize) -> IndexPage<'_> {
    match items.get(index) {
        None => IndexPage::End,
        Some(item) if item.id.trim().is_empty() => IndexPage::Skip,
        Some(item) => IndexPage::Item(&item.payload),
    }
}
