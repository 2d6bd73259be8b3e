pub mod flip;
pub mod xendit;

pub use flip::FlipGateway;
pub use xendit::XenditGateway;
