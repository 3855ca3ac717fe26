pub mod discovery;
pub mod heartbeat;
pub mod notification;
pub mod registry;
