pub mod home;
pub mod resource;
