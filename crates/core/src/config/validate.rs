use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Search limits are non-zero and ordered
/// - Crawler and swarm-join timeouts are non-zero
/// - The player port range fits in u16
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.search.default_limit == 0 {
        return Err(ConfigError::ValidationError(
            "search.default_limit cannot be 0".to_string(),
        ));
    }

    if config.search.max_limit < config.search.default_limit {
        return Err(ConfigError::ValidationError(
            "search.max_limit must be >= search.default_limit".to_string(),
        ));
    }

    if config.crawlers.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "crawlers.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.swarm.join_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "swarm.join_timeout_secs cannot be 0".to_string(),
        ));
    }

    if config
        .player
        .port_range_start
        .checked_add(config.player.max_streams)
        .is_none()
    {
        return Err(ConfigError::ValidationError(
            "player port range overflows".to_string(),
        ));
    }

    Ok(())
}
