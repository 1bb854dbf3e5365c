//! Test Fixtures Module
//!
//! This module provides test fixtures for voice bridge testing:
//! - Audio fixtures (programmatically generated)
//! - Mock services (recognizer, chat model, synthesizer, faulty stages)

// Allow dead code in test fixtures - not every test binary uses every helper
#![allow(dead_code)]

pub mod audio_fixtures;
pub mod mock_services;

pub use audio_fixtures::*;
pub use mock_services::*;
