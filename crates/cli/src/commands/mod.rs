pub mod chat;
pub mod doctor;
pub mod providers;
pub mod serve;
pub mod validate;
