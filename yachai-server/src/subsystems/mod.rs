pub mod listener;
pub mod moderate;
pub mod submit;
