use once_cell::sync::Lazy;
use std::env;

pub static SUPABASE_URL: Lazy<Option<String>> = Lazy::new(|| {
    env::var("SUPABASE_URL")
        .ok()
        .map(|url| url.trim_end_matches('/').to_string())
        .filter(|url| !url.is_empty())
});

pub static SUPABASE_SERVICE_KEY: Lazy<Option<String>> = Lazy::new(|| {
    env::var("SUPABASE_SERVICE_ROLE_KEY")
        .or_else(|_| env::var("SUPABASE_SERVICE_KEY"))
        .or_else(|_| env::var("SUPABASE_KEY"))
        .ok()
        .filter(|key| !key.is_empty())
});

pub static STORAGE_BUCKET: Lazy<String> = Lazy::new(|| {
    env::var("SUPABASE_STORAGE_BUCKET").unwrap_or_else(|_| "property-media".to_string())
});

pub static LISTINGS_API_URL: Lazy<Option<String>> = Lazy::new(|| {
    env::var("LISTINGS_API_URL")
        .ok()
        .map(|url| url.trim_end_matches('/').to_string())
        .filter(|url| !url.is_empty())
});

pub static LISTINGS_API_TOKEN: Lazy<Option<String>> =
    Lazy::new(|| env::var("LISTINGS_API_TOKEN").ok().filter(|t| !t.is_empty()));

pub fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|value| value.trim().parse::<T>().ok())
}

pub fn port() -> u16 {
    env_parse("PORT").unwrap_or(8000)
}

pub fn body_limit() -> usize {
    env_parse::<usize>("REQUEST_MAX_BYTES")
        .filter(|v| *v > 0)
        .unwrap_or(32 * 1024 * 1024)
}

pub fn idempotency_ttl_secs() -> u64 {
    env_parse("IDEMPOTENCY_TTL_SECS").unwrap_or(3600)
}

/// How long a wizard may sit untouched before it is closed and dropped.
pub fn session_idle_secs() -> u64 {
    env_parse::<u64>("SESSION_IDLE_SECS")
        .filter(|v| *v > 0)
        .unwrap_or(2 * 3600)
}

pub fn session_sweep_secs() -> u64 {
    env_parse::<u64>("SESSION_SWEEP_SECS")
        .filter(|v| *v > 0)
        .unwrap_or(60)
}
