//! Request extractors, response helpers and pagination

pub mod extract;
pub mod pagination;
pub mod response;

pub use extract::{ValidatedJson, ValidatedQuery};
pub use pagination::{PageQuery, PageRequest, PaginationMeta};
pub use response::{Created, NoContent, SuccessResponse};
