//! Common test utilities and infrastructure
//!
//! Worker programs are small `sh` scripts speaking the same stdio protocol as
//! the real worker, so pool tests exercise real processes and pipes.

pub mod fixtures;
pub mod helpers;

#[allow(unused_imports)]
pub use fixtures::TestFixtures;
#[allow(unused_imports)]
pub use helpers::TestHelpers;
