//! Server configuration from environment variables.
//!
//! Values are whitespace-trimmed because default loading mechanisms (e.g.
//! secrets mounted as files) routinely include trailing newlines.

#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Redis address, host:port.
    pub redis_addr: String,
    /// Redis password, empty for none.
    pub redis_pass: String,
    /// Redis database index.
    pub redis_db: i64,
    /// HTTP listen port.
    pub http_port: String,
    /// Directory served for the web frontend.
    pub static_dir: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            redis_addr: trimmed_env("REDIS_ADDR", "localhost:6379"),
            redis_pass: trimmed_env("REDIS_PASS", ""),
            redis_db: trimmed_env("REDIS_DB", "0").parse().unwrap_or(0),
            http_port: trimmed_env("HTTP_PORT", "8080"),
            static_dir: trimmed_env("STATIC_DIR", "./web"),
        }
    }

    /// Connection URL for the Redis client.
    pub fn redis_url(&self) -> String {
        if self.redis_pass.is_empty() {
            format!("redis://{}/{}", self.redis_addr, self.redis_db)
        } else {
            format!(
                "redis://:{}@{}/{}",
                self.redis_pass, self.redis_addr, self.redis_db
            )
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.http_port)
    }
}

fn trimmed_env(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(value) => {
            let value = value.trim();
            if value.is_empty() {
                default.to_string()
            } else {
                value.to_string()
            }
        }
        Err(_) => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        // Scoped to variables unlikely to exist in a test environment.
        let config = ServerConfig {
            redis_addr: "localhost:6379".to_string(),
            redis_pass: String::new(),
            redis_db: 0,
            http_port: "8080".to_string(),
            static_dir: "./web".to_string(),
        };
        assert_eq!(config.redis_url(), "redis://localhost:6379/0");
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_redis_url_with_password() {
        let config = ServerConfig {
            redis_addr: "redis.internal:6380".to_string(),
            redis_pass: "hunter2".to_string(),
            redis_db: 3,
            http_port: "8080".to_string(),
            static_dir: "./web".to_string(),
        };
        assert_eq!(config.redis_url(), "redis://:hunter2@redis.internal:6380/3");
    }
}
