use thiserror::Error;

/// Invalid paging arguments. Raised before any page metadata is computed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    #[error("page size must be at least 1 (got {0})")]
    InvalidPageSize(i64),

    #[error("page number must be at least 1 (got {0})")]
    InvalidPageNumber(i64),

    /// A caller-sliced window holds more items than one page can.
    #[error("page window holds {len} items but the page size is {page_size}")]
    WindowTooLarge { len: u64, page_size: u64 },
}

/// A `ResultType` code outside the known range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown result type code {0}")]
pub struct UnknownOutcome(pub u8);

/// Failure while encoding an envelope body.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to encode JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to encode XML body: {0}")]
    Xml(#[from] quick_xml::Error),
}
