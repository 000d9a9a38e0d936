pub mod message;
pub mod request;
pub mod session_id;
pub mod stage;
pub mod state;
