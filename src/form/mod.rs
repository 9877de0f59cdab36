pub mod requests;

pub use requests::{
    validate_bulk_delete, validate_generate, validate_manual_add, BulkDeleteRequest,
    ClearRequest, GenerateAllRequest, GenerateRequest, GridQuery, LoginRequest,
    ManualAddRequest, MoveRequest,
};
