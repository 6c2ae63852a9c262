//! Configuration schema types for `sitepipe.toml`
//!
//! Every field has a default, and the defaults reproduce the classic
//! `app/` → `dist/` front-end layout, so a project without a config file
//! builds the same way as one with an empty file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Output style of compiled stylesheets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StyleOutput {
    /// Human-readable CSS
    #[default]
    Expanded,
    /// Whitespace-free CSS
    Compressed,
}

/// Style preprocessing section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StylesConfig {
    /// Glob pattern for Sass sources
    #[serde(default = "default_styles_src")]
    pub src: String,
    /// Directory receiving the generated CSS tree
    #[serde(default = "default_styles_out")]
    pub out: PathBuf,
    /// Output style passed to the compiler
    #[serde(default)]
    pub output_style: StyleOutput,
}

fn default_styles_src() -> String {
    "app/scss/**/*.scss".to_string()
}

fn default_styles_out() -> PathBuf {
    PathBuf::from("app/css")
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            src: default_styles_src(),
            out: default_styles_out(),
            output_style: StyleOutput::default(),
        }
    }
}

/// HTML bundling section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleConfig {
    /// Glob pattern for HTML entry files
    #[serde(default = "default_bundle_html")]
    pub html: String,
    /// Production output directory
    #[serde(default = "default_dist")]
    pub out: PathBuf,
    /// Minify concatenated scripts
    #[serde(default = "default_true")]
    pub minify_js: bool,
    /// Minify concatenated stylesheets
    #[serde(default = "default_true")]
    pub minify_css: bool,
}

fn default_bundle_html() -> String {
    "app/*.html".to_string()
}

fn default_dist() -> PathBuf {
    PathBuf::from("dist")
}

fn default_true() -> bool {
    true
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self { html: default_bundle_html(), out: default_dist(), minify_js: true, minify_css: true }
    }
}

/// Image optimization section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    /// Glob pattern for source images (brace alternation allowed)
    #[serde(default = "default_images_src")]
    pub src: String,
    /// Output directory for optimized images
    #[serde(default = "default_images_out")]
    pub out: PathBuf,
    /// JPEG re-encode quality (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Route images through the transformation cache
    #[serde(default = "default_true")]
    pub cache: bool,
}

fn default_images_src() -> String {
    "app/images/**/*.{png,jpg,jpeg,gif,svg}".to_string()
}

fn default_images_out() -> PathBuf {
    PathBuf::from("dist/images")
}

fn default_jpeg_quality() -> u8 {
    85
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            src: default_images_src(),
            out: default_images_out(),
            jpeg_quality: default_jpeg_quality(),
            cache: true,
        }
    }
}

/// Font copy section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontsConfig {
    /// Glob pattern for font files
    #[serde(default = "default_fonts_src")]
    pub src: String,
    /// Output directory for fonts
    #[serde(default = "default_fonts_out")]
    pub out: PathBuf,
}

fn default_fonts_src() -> String {
    "app/fonts/**/*".to_string()
}

fn default_fonts_out() -> PathBuf {
    PathBuf::from("dist/fonts")
}

impl Default for FontsConfig {
    fn default() -> Self {
        Self { src: default_fonts_src(), out: default_fonts_out() }
    }
}

/// Production cleanup section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanConfig {
    /// Directory removed by `clean-output`
    #[serde(default = "default_dist")]
    pub target: PathBuf,
    /// Allow deleting the project root or paths outside it
    #[serde(default)]
    pub force: bool,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self { target: default_dist(), force: false }
    }
}

/// Transformation cache section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache directory
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".sitepipe-cache")
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { dir: default_cache_dir() }
    }
}

/// Dev server section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Directory served at `/`
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,
    /// First port to try
    #[serde(default = "default_port")]
    pub port: u16,
    /// How many consecutive ports to try when the first one is taken
    #[serde(default = "default_port_attempts")]
    pub port_attempts: u16,
    /// Inject the live-reload client into served HTML
    #[serde(default = "default_true")]
    pub inject_client: bool,
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("app")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_port_attempts() -> u16 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            host: default_host(),
            port: default_port(),
            port_attempts: default_port_attempts(),
            inject_client: true,
        }
    }
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
    /// Clear terminal between rebuilds
    #[serde(default)]
    pub clear_screen: bool,
    /// Patterns whose changes trigger a full browser reload
    #[serde(default = "default_reload_patterns")]
    pub reload: Vec<String>,
}

fn default_debounce_ms() -> u32 {
    100
}

fn default_reload_patterns() -> Vec<String> {
    vec!["app/*.html".to_string(), "app/js/**/*.js".to_string()]
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 100, clear_screen: false, reload: default_reload_patterns() }
    }
}

/// Complete `sitepipe.toml` configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub styles: StylesConfig,
    #[serde(default)]
    pub bundle: BundleConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub fonts: FontsConfig,
    #[serde(default)]
    pub clean: CleanConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "images.jpeg_quality")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sitepipe.toml: '{}' {}", self.field, self.message)
    }
}

impl ProjectConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        let patterns = [
            ("styles.src", &self.styles.src),
            ("bundle.html", &self.bundle.html),
            ("images.src", &self.images.src),
            ("fonts.src", &self.fonts.src),
        ];
        for (field, pattern) in patterns {
            if pattern.trim().is_empty() {
                errors.push(ConfigValidationError {
                    field: field.to_string(),
                    message: "must be a non-empty glob pattern".to_string(),
                });
            }
        }

        for (i, pattern) in self.watch.reload.iter().enumerate() {
            if pattern.trim().is_empty() {
                errors.push(ConfigValidationError {
                    field: format!("watch.reload[{}]", i),
                    message: "must be a non-empty glob pattern".to_string(),
                });
            }
        }

        if self.images.jpeg_quality == 0 || self.images.jpeg_quality > 100 {
            errors.push(ConfigValidationError {
                field: "images.jpeg_quality".to_string(),
                message: "must be between 1 and 100".to_string(),
            });
        }

        if self.server.port == 0 {
            errors.push(ConfigValidationError {
                field: "server.port".to_string(),
                message: "must be a positive port number".to_string(),
            });
        }

        if self.server.port_attempts == 0 {
            errors.push(ConfigValidationError {
                field: "server.port_attempts".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.watch.debounce_ms == 0 {
            errors.push(ConfigValidationError {
                field: "watch.debounce_ms".to_string(),
                message: "must be a positive number of milliseconds".to_string(),
            });
        }

        if self.clean.target.as_os_str().is_empty() {
            errors.push(ConfigValidationError {
                field: "clean.target".to_string(),
                message: "must name a directory".to_string(),
            });
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}
