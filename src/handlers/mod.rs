pub mod discovery;
pub mod health;
pub mod nf_instances;
pub mod subscriptions;
