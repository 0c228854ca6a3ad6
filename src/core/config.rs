use crate::core::errors::ConfigError;
use crate::core::types::LayoutStyle;
use std::env;
use std::path::Path;
use tracing::Level;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: Level,
}

/// Remote collaborator configuration
#[derive(Debug, Clone)]
pub struct CollaboratorConfig {
    pub api_key: Option<String>,
    pub text_model: String,
    pub image_model: String,
    pub remote_enabled: bool,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    /// When false and no remote collaborator is reachable, jobs fail with
    /// NotSupported instead of using the placeholder pipeline.
    pub local_fallback_enabled: bool,
}

/// Panel/page geometry and planning configuration
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub panel_size: u32,
    pub page_width: u32,
    pub page_height: u32,
    pub margin: u32,
    pub gutter: u32,
    pub layout_style: LayoutStyle,
    pub fallback_panel_count: usize,
    pub panels_per_page: usize,
}

/// Content filtering vocabulary overrides (newline-separated term files)
#[derive(Debug, Clone)]
pub struct SafetyConfig {
    pub banned_terms_file: Option<String>,
    pub allowed_compounds_file: Option<String>,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub collaborator: CollaboratorConfig,
    pub generation: GenerationConfig,
    pub safety: SafetyConfig,
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env()?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_env() -> Result<Self, ConfigError> {
        let log_level = env::var("LOG_LEVEL")
            .ok()
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(Level::INFO);

        let layout_style = env::var("LAYOUT_STYLE")
            .ok()
            .map(|s| {
                s.parse::<LayoutStyle>()
                    .map_err(ConfigError::UnknownLayoutStyle)
            })
            .transpose()?
            .unwrap_or(LayoutStyle::Dynamic);

        Ok(Self {
            server: ServerConfig {
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1430),
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                log_level,
            },
            collaborator: CollaboratorConfig {
                api_key: env::var("GEMINI_API_KEY")
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty()),
                text_model: env::var("TEXT_MODEL")
                    .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
                image_model: env::var("IMAGE_MODEL")
                    .unwrap_or_else(|_| "gemini-2.5-flash-image".to_string()),
                remote_enabled: env::var("REMOTE_ENABLED")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(true),
                request_timeout_secs: env::var("API_TIMEOUT_SECONDS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
                max_retries: env::var("MAX_RETRIES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
                local_fallback_enabled: env::var("LOCAL_FALLBACK_ENABLED")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(true),
            },
            generation: GenerationConfig {
                panel_size: env::var("PANEL_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(512),
                page_width: env::var("PAGE_WIDTH")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1024),
                page_height: env::var("PAGE_HEIGHT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1536),
                margin: env::var("PAGE_MARGIN")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(48),
                gutter: env::var("PANEL_GUTTER")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(20),
                layout_style,
                fallback_panel_count: env::var("FALLBACK_PANEL_COUNT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3),
                panels_per_page: 4,
            },
            safety: SafetyConfig {
                banned_terms_file: env::var("BANNED_TERMS_FILE").ok(),
                allowed_compounds_file: env::var("ALLOWED_COMPOUNDS_FILE").ok(),
            },
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(64..=2048).contains(&self.generation.panel_size) {
            return Err(ConfigError::InvalidPanelSize(self.generation.panel_size));
        }

        if self.generation.page_width < 256 || self.generation.page_height < 256 {
            return Err(ConfigError::InvalidPageSize {
                width: self.generation.page_width,
                height: self.generation.page_height,
            });
        }

        // Enough room for at least one panel after margins and gutters
        let reserved = self.generation.margin * 2 + self.generation.gutter * 3;
        if reserved >= self.generation.page_width || reserved >= self.generation.page_height {
            return Err(ConfigError::InvalidSpacing {
                margin: self.generation.margin,
                gutter: self.generation.gutter,
            });
        }

        if !(1..=4).contains(&self.generation.fallback_panel_count) {
            return Err(ConfigError::InvalidFallbackPanelCount(
                self.generation.fallback_panel_count,
            ));
        }

        for path in [
            self.safety.banned_terms_file.as_deref(),
            self.safety.allowed_compounds_file.as_deref(),
        ]
        .into_iter()
        .flatten()
        {
            if !Path::new(path).exists() {
                return Err(ConfigError::VocabularyFileUnreadable {
                    path: path.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
                });
            }
        }

        Ok(())
    }

    pub fn server_host(&self) -> &str {
        &self.server.host
    }

    pub fn server_port(&self) -> u16 {
        self.server.port
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }
}

// Note: No Default implementation because Config::new() can fail.
// Tests that need a config use Config::for_tests().

impl Config {
    /// Fixed configuration for tests; skips environment loading entirely.
    pub fn for_tests() -> Self {
        Self {
            server: ServerConfig {
                port: 0,
                host: "127.0.0.1".to_string(),
                log_level: Level::WARN,
            },
            collaborator: CollaboratorConfig {
                api_key: None,
                text_model: "test-text".to_string(),
                image_model: "test-image".to_string(),
                remote_enabled: false,
                request_timeout_secs: 5,
                max_retries: 0,
                local_fallback_enabled: true,
            },
            generation: GenerationConfig {
                panel_size: 128,
                page_width: 512,
                page_height: 768,
                margin: 24,
                gutter: 10,
                layout_style: LayoutStyle::Dynamic,
                fallback_panel_count: 3,
                panels_per_page: 4,
            },
            safety: SafetyConfig {
                banned_terms_file: None,
                allowed_compounds_file: None,
            },
        }
    }
}
