// Configuration - Environment variables with defaults
// A `.env` file in the working directory is loaded first when present.
//
// | Variable                       | Default                  |
// |--------------------------------|--------------------------|
// | `ASTRO_HOST`                   | `0.0.0.0`                |
// | `ASTRO_PORT`                   | `8000`                   |
// | `ASTRO_LOG_LEVEL`              | `info`                   |
// | `ASTRO_OLLAMA_URL`             | `http://localhost:11434` |
// | `ASTRO_MODEL`                  | `llama3.1`               |
// | `ASTRO_INDEX_PATH`             | `./rag_index.json`       |
// | `ASTRO_CATALOG_PATH`           | unset (built-in catalog) |
// | `ASTRO_ORACLE_TIMEOUT_SECS`    | `120`                    |
// | `ASTRO_RETRIEVAL_TIMEOUT_SECS` | `10`                     |
// | `ASTRO_RETRIEVAL_K`            | `5`                      |
// | `ASTRO_DEFAULT_FPS`            | `30`                     |
// | `ASTRO_PREFER_PRESETS`         | `false`                  |
// | `ASTRO_CHAT_DOMAIN_GATE`       | `true`                   |

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Tracing filter string, e.g. `"astro_thesaurus=debug,info"`
    pub log_level: String,
    pub ollama_url: String,
    pub model: String,
    pub index_path: PathBuf,
    pub catalog_path: Option<PathBuf>,
    pub oracle_timeout: Duration,
    pub retrieval_timeout: Duration,
    pub retrieval_k: usize,
    pub default_fps: u32,
    /// Serve matching presets without asking the oracle
    pub prefer_presets: bool,
    /// Reject questions outside orbital mechanics
    pub chat_domain_gate: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            host:              env_str("ASTRO_HOST", "0.0.0.0"),
            port:              env_parse("ASTRO_PORT", 8000_u16),
            log_level:         env_str("ASTRO_LOG_LEVEL", "info"),
            ollama_url:        env_str("ASTRO_OLLAMA_URL", "http://localhost:11434"),
            model:             env_str("ASTRO_MODEL", "llama3.1"),
            index_path:        PathBuf::from(env_str("ASTRO_INDEX_PATH", "./rag_index.json")),
            catalog_path:      std::env::var("ASTRO_CATALOG_PATH").ok().filter(|p| !p.is_empty()).map(PathBuf::from),
            oracle_timeout:    Duration::from_secs(env_parse("ASTRO_ORACLE_TIMEOUT_SECS", 120)),
            retrieval_timeout: Duration::from_secs(env_parse("ASTRO_RETRIEVAL_TIMEOUT_SECS", 10)),
            retrieval_k:       env_parse("ASTRO_RETRIEVAL_K", 5_usize).max(1),
            default_fps:       env_parse("ASTRO_DEFAULT_FPS", 30_u32).clamp(1, 60),
            prefer_presets:    env_bool("ASTRO_PREFER_PRESETS", false),
            chat_domain_gate:  env_bool("ASTRO_CHAT_DOMAIN_GATE", true),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::from_env();
        assert!(cfg.port > 0);
        assert!(cfg.retrieval_k >= 1);
        assert!((1..=60).contains(&cfg.default_fps));
        assert!(!cfg.ollama_url.is_empty());
    }

    #[test]
    fn env_helpers_fall_back_on_garbage() {
        std::env::set_var("ASTRO_TEST_GARBAGE_PORT", "not-a-number");
        assert_eq!(env_parse("ASTRO_TEST_GARBAGE_PORT", 8000_u16), 8000);
        std::env::set_var("ASTRO_TEST_FLAG", "TRUE");
        assert!(env_bool("ASTRO_TEST_FLAG", false));
        assert!(env_bool("ASTRO_TEST_FLAG_MISSING", true));
        std::env::remove_var("ASTRO_TEST_GARBAGE_PORT");
        std::env::remove_var("ASTRO_TEST_FLAG");
    }
}
