pub mod app_state;
pub mod error;
pub mod heartbeat;
pub mod nf_profile;
pub mod notification;
pub mod patch;
pub mod problem_details;
pub mod subscription;

pub use app_state::*;
pub use error::*;
pub use heartbeat::*;
pub use nf_profile::*;
pub use notification::*;
pub use patch::*;
pub use problem_details::*;
pub use subscription::*;
