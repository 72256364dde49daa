//! Heuristic detection of anti-bot interstitials
//!
//! Deliberately permissive: a false positive only costs an extra fetch
//! strategy, a false negative corrupts the page analysis.

/// Case-sensitive substrings that identify a challenge page
const CHALLENGE_MARKERS: &[&str] = &[
    "cf-browser-verification",
    "cf_chl_opt",
    "challenge-platform",
    "Attention Required! | Cloudflare",
    "Just a moment...",
    "Checking your browser",
    "Verify you are human",
    "verify you are human",
    "Access Denied",
    "Access denied",
    "captcha",
    "CAPTCHA",
    "g-recaptcha",
    "h-captcha",
    "px-captcha",
    "DataDome",
    "_Incapsula_Resource",
    "Sucuri WebSite Firewall",
    "awswaf",
];

/// Generic blocking language, only meaningful on short bodies
const SHORT_BODY_HINTS: &[&str] = &["javascript", "enable cookies", "wait"];

/// Bodies shorter than this are checked for [`SHORT_BODY_HINTS`]
const SHORT_BODY_LIMIT: usize = 5000;

/// Statuses that always escalate to the next fetch strategy
const ESCALATION_STATUSES: &[u16] = &[0, 403, 406, 429, 503];

/// Returns true if `body` looks like a bot challenge rather than content
///
/// # Examples
///
/// ```
/// use spiderfrog::crawler::is_challenge;
///
/// assert!(is_challenge("<h1>Verify you are human</h1>"));
/// assert!(!is_challenge("<h1>Welcome</h1>"));
/// ```
pub fn is_challenge(body: &str) -> bool {
    if CHALLENGE_MARKERS.iter().any(|marker| body.contains(marker)) {
        return true;
    }

    if body.len() < SHORT_BODY_LIMIT {
        let lower = body.to_lowercase();
        return SHORT_BODY_HINTS.iter().any(|hint| lower.contains(hint));
    }

    false
}

/// True if the status alone forces escalation
pub fn is_blocking_status(status: u16) -> bool {
    ESCALATION_STATUSES.contains(&status)
}

/// True if a response must be escalated, by status or by body
pub fn needs_escalation(status: u16, body: &str) -> bool {
    is_blocking_status(status) || is_challenge(body)
}
