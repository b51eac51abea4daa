//! Integration tests

mod console_test;
mod listener_test;
mod session_test;
mod support;
