//! Common test utilities for seisplot.
//!
//! This module provides shared utilities for testing the seisplot server.

// Not every test binary uses every helper
#![allow(dead_code)]

pub mod http_client;
pub mod image_utils;
pub mod mock_data_center;
pub mod test_data;
