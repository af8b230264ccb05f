pub mod client;
pub mod flaky;
pub mod foreground;
pub mod remote;
pub mod surface;

pub use client::TestClient;
pub use flaky::{DiskSwitch, FlakyStore};
pub use foreground::{Behavior, TestHost, TestInstance};
pub use remote::{Reply, StubGateway};
pub use surface::TestSurface;
