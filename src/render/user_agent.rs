//! User agent handling for renders and media fetches.

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Real browser user agents for impersonate mode.
pub const IMPERSONATE_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
];

/// Pseudo-random index from the clock; good enough to spread choices.
pub fn random_index(len: usize) -> usize {
    use std::time::SystemTime;
    if len == 0 {
        return 0;
    }
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as usize)
        .unwrap_or(0);
    nanos % len
}

/// Get a random user agent for impersonate mode.
pub fn random_user_agent() -> &'static str {
    IMPERSONATE_USER_AGENTS[random_index(IMPERSONATE_USER_AGENTS.len())]
}

/// Resolve user agent from config value.
/// - None => default desktop Chrome agent
/// - "impersonate" => random real browser user agent
/// - other => custom user agent string
pub fn resolve_user_agent(config: Option<&str>) -> String {
    match config {
        None => USER_AGENT.to_string(),
        Some("impersonate") => random_user_agent().to_string(),
        Some(custom) => custom.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_user_agent() {
        assert_eq!(resolve_user_agent(None), USER_AGENT);
        assert!(resolve_user_agent(Some("impersonate")).contains("Mozilla"));
        assert_eq!(resolve_user_agent(Some("MyBot/1.0")), "MyBot/1.0");
    }

    #[test]
    fn test_random_index_in_range() {
        for len in 1..10 {
            assert!(random_index(len) < len);
        }
        assert_eq!(random_index(0), 0);
    }
}
