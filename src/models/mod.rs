pub mod batch;
pub mod classification;
pub mod item;
pub mod message;

pub use batch::{Batch, BatchEntry};
pub use classification::{ClassificationOutcome, ClassificationResult};
pub use item::{ElementRef, Item, ItemId};
pub use message::{
    CheckSpoilersPayload, CheckSpoilersResponse, ContentMessage, PageInstanceId,
    UpdateSpoilerCountPayload,
};
