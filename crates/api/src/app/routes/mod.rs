pub mod permissions;
pub mod roles;
pub mod system;
pub mod users;
