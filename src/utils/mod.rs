pub mod json_patch;
pub mod retry;
