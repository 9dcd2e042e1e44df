//! User-agent rotation and randomized pauses between browser actions.

use rand::Rng;
use rand::seq::SliceRandom;
use std::time::Duration;
use tracing::debug;

pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:122.0) Gecko/20100101 Firefox/122.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:122.0) Gecko/20100101 Firefox/122.0",
];

pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// A user agent different from `current`, when the list allows it.
pub fn rotate_user_agent(current: &str) -> &'static str {
    let others: Vec<&'static str> = USER_AGENTS
        .iter()
        .copied()
        .filter(|ua| *ua != current)
        .collect();
    others
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or_else(random_user_agent)
}

/// `navigator.platform` value consistent with a user agent.
pub fn platform_for(user_agent: &str) -> &'static str {
    if user_agent.contains("Windows") {
        "Win32"
    } else if user_agent.contains("Mac") {
        "MacIntel"
    } else {
        "Linux x86_64"
    }
}

pub fn random_window_size() -> (u32, u32) {
    let mut rng = rand::thread_rng();
    (rng.gen_range(1200..=1920), rng.gen_range(800..=1080))
}

/// Human-like waits. Disabled pacing returns immediately, which keeps tests
/// and local fixture runs fast.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    enabled: bool,
}

impl Pacing {
    pub fn new(enabled: bool) -> Self {
        Pacing { enabled }
    }

    pub fn disabled() -> Self {
        Pacing { enabled: false }
    }

    pub async fn pause(&self, min: Duration, max: Duration, reason: &str) {
        if !self.enabled {
            return;
        }
        let delay = if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        };
        debug!(delay_ms = delay.as_millis() as u64, reason, "Pausing");
        tokio::time::sleep(delay).await;
    }
}
