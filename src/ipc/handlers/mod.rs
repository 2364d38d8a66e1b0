pub mod attendance;
pub mod backup;
pub mod core;
pub mod courses;
pub mod schedule;
pub mod setup;
pub mod sync;
pub mod users;
