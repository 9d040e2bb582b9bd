pub mod access_request;
pub mod level;

pub use access_request::{
    AccessRequest, AccessRequestStatus, AccessRequestView, CreateAccessRequestPayload,
    CreateAccessRequestResponse,
};
pub use level::{normalize_level_name, Level, LevelAccessView, BEGINNER_DIFFICULTY};
