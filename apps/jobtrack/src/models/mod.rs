pub mod search;
pub mod user;

pub use search::{JobListing, JobSearchParams, NormalizedSearchParams};
pub use user::{
    Application, ApplicationStatus, CachedProfile, ProfileData, ResumeUpload, SaveUserData,
    UserRecord,
};
