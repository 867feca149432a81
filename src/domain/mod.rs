//! Domain types and DTOs
//!
//! Entities, request/response shapes with their validation rules, and the
//! pure scoring functions. Nothing in here touches storage or HTTP.

pub mod applications;
pub mod auth;
pub mod dashboard;
pub mod listings;
pub mod matching;
pub mod messages;
pub mod profiles;
pub mod saved;
pub mod users;
pub mod validation;
pub mod viewings;

pub use applications::{Application, ApplicationStatus};
pub use listings::{HousingType, Listing, ListingStatus};
pub use messages::Message;
pub use profiles::Profile;
pub use saved::SavedListing;
pub use users::{Role, User};
pub use viewings::{Viewing, ViewingStatus};
