//! Shared constants for the fixit workflow.

use std::time::Duration;

pub const BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub const GEMINI_3_FLASH_PREVIEW: &str = "gemini-3-flash-preview";
pub const GEMINI_2_5_FLASH: &str = "gemini-2.5-flash";
pub const GEMINI_2_5_FLASH_LITE: &str = "gemini-2.5-flash-lite";
pub const GEMINI_2_5_PRO: &str = "gemini-2.5-pro";

pub const DEFAULT_MODEL: &str = GEMINI_3_FLASH_PREVIEW;

pub const AVAILABLE_MODELS: &[&str] = &[
    GEMINI_3_FLASH_PREVIEW,
    GEMINI_2_5_FLASH,
    GEMINI_2_5_FLASH_LITE,
    GEMINI_2_5_PRO,
];

/// Fixed interval between file readiness checks. No backoff; the wait budget
/// is bounded by `MAX_POLL_ATTEMPTS`.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Up to 30 checks at 2 seconds apart, a 60 second budget.
pub const MAX_POLL_ATTEMPTS: usize = 30;
