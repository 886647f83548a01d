pub mod job;
pub mod pet_video;
pub mod request;
pub mod resolution;
