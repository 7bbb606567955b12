use thiserror::Error;

#[derive(Error, Debug)]
pub enum NvcellError {
    #[error("record of {record} bytes plus {overhead} bytes of entry overhead does not fit in a {capacity}-byte region")]
    RecordTooLarge {
        record: usize,
        overhead: usize,
        capacity: usize,
    },

    #[error("region exhausted: no slot with enough contiguous room remains")]
    RegionExhausted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NvcellError>;
