//! Integration tests for PWM-SSC acceptance testing.
//!
//! No hardware is needed; every test runs on the simulated controller.

mod capture_test;
mod common;
mod construction_test;
mod teardown_test;
