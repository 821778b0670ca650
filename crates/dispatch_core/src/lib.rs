pub mod bus;
pub mod dispatcher;
pub mod event;
pub mod fleet;
pub mod journey;
pub mod route;
pub mod routing;
pub mod sequence;
pub mod spatial;
pub mod telemetry;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
