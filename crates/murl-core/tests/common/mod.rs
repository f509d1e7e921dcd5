pub mod fake_bridge;
pub mod range_server;
