//! Compositor configuration.
//!
//! `CompositorConfig` describes a single overlay window: the browser page it
//! shows, how big it is, and which compositing path it uses. Defaults are
//! provided via [`Default`], and [`CompositorConfig::builder()`] offers a
//! fluent, validating way to customize them.
//!
//! # Examples
//!
//! ## Use defaults
//! ```rust
//! use gosub_compositor::config::CompositorConfig;
//! let cfg = CompositorConfig::default();
//! assert_eq!((cfg.width, cfg.height), (800, 600));
//! assert_eq!(cfg.windowless_frame_rate, 240);
//! ```
//!
//! ## Customize with the builder
//! ```rust
//! use gosub_compositor::config::CompositorConfig;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = CompositorConfig::builder()
//!     .size(1920, 1080)
//!     .url("nui://game/ui/root.html")
//!     .raw_blit(true)
//!     .window_context("chat")
//!     .storage_root("/tmp/overlay")
//!     .build()?; // returns Result<CompositorConfig, ConfigError>
//! assert!(cfg.cache_path().is_some());
//! # Ok(()) }
//! ```
//!
//! # Fields (summary)
//! - `width`, `height`: initial size in pixels (default 800x600).
//! - `url`: page loaded by the browser session.
//! - `raw_blit`: composite without a shader pass and track the host's output resolution.
//! - `shared_resources`: use GPU shared textures and external begin-frame pacing.
//! - `shared_texture_supported`: the platform can import shared textures at all.
//! - `deferred`: postpone session creation until the first `consume`.
//! - `window_context`: named browser context; empty means the global context.
//! - `storage_root`: directory under which per-context caches live.
//! - `windowless_frame_rate`: frame rate cap passed to the browser (1..=240).
//! - `row_alignment`: alignment of the CPU staging buffer dimensions (power of two).
//! - `paint_queue_capacity`: bound of the accelerated paint queue.
//!
//! # Errors
//!
//! Builder validation and [`CompositorConfig::from_json`] return
//! [`ConfigError`] if values are invalid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Highest frame rate the browser accepts for windowless rendering.
pub const MAX_FRAME_RATE: u32 = 240;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    pub width: u32,
    pub height: u32,
    pub url: String,
    pub raw_blit: bool,
    pub shared_resources: bool,
    pub shared_texture_supported: bool,
    pub deferred: bool,
    pub window_context: String,
    pub storage_root: Option<PathBuf>,
    pub windowless_frame_rate: u32,
    pub row_alignment: u32,
    pub paint_queue_capacity: usize,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            url: "about:blank".to_string(),
            raw_blit: false,
            shared_resources: true,
            shared_texture_supported: true,
            deferred: false,
            window_context: String::new(),
            storage_root: None,
            windowless_frame_rate: MAX_FRAME_RATE,
            row_alignment: 16,
            paint_queue_capacity: 64,
        }
    }
}

impl CompositorConfig {
    pub fn builder() -> CompositorConfigBuilder {
        CompositorConfigBuilder::default()
    }

    /// Parses and validates a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: CompositorConfig = serde_json::from_str(json)?;
        validate(&config)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate(self)
    }

    /// Shared textures are only requested when both enabled and supported.
    pub fn shared_texture_enabled(&self) -> bool {
        self.shared_resources && self.shared_texture_supported
    }

    pub fn external_begin_frame_enabled(&self) -> bool {
        self.shared_resources
    }

    /// Cache directory of the window's browser context, `<storage_root>/context-<name>`.
    ///
    /// Returns `None` for the global context (empty name) or when no storage
    /// root is configured.
    pub fn cache_path(&self) -> Option<PathBuf> {
        if self.window_context.is_empty() {
            return None;
        }

        self.storage_root
            .as_ref()
            .map(|root| root.join(format!("context-{}", self.window_context)))
    }
}

/// Builder for [`CompositorConfig`].
#[derive(Debug, Clone, Default)]
pub struct CompositorConfigBuilder {
    inner: CompositorConfig,
}

impl CompositorConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut CompositorConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn size(self, width: u32, height: u32) -> Self {
        self.map(|c| {
            c.width = width;
            c.height = height;
        })
    }
    pub fn url<S: Into<String>>(self, url: S) -> Self { self.map(|c| c.url = url.into()) }
    pub fn raw_blit(self, on: bool) -> Self { self.map(|c| c.raw_blit = on) }
    pub fn shared_resources(self, on: bool) -> Self { self.map(|c| c.shared_resources = on) }
    pub fn shared_texture_supported(self, on: bool) -> Self { self.map(|c| c.shared_texture_supported = on) }
    pub fn deferred(self, on: bool) -> Self { self.map(|c| c.deferred = on) }
    pub fn window_context<S: Into<String>>(self, name: S) -> Self { self.map(|c| c.window_context = name.into()) }
    pub fn storage_root<P: Into<PathBuf>>(self, root: P) -> Self { self.map(|c| c.storage_root = Some(root.into())) }
    pub fn windowless_frame_rate(self, fps: u32) -> Self { self.map(|c| c.windowless_frame_rate = fps) }
    pub fn row_alignment(self, alignment: u32) -> Self { self.map(|c| c.row_alignment = alignment) }
    pub fn paint_queue_capacity(self, n: usize) -> Self { self.map(|c| c.paint_queue_capacity = n) }

    /// Apply multiple changes in one go.
    pub fn with(self, f: impl FnOnce(&mut CompositorConfig)) -> Self { self.map(f) }

    /// Validate and build the final config.
    pub fn build(self) -> Result<CompositorConfig, ConfigError> {
        validate(&self.inner)?;
        Ok(self.inner)
    }
}

// ---------- Validation ----------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("size {width}x{height} must be non-zero in both dimensions")]
    ZeroSize { width: u32, height: u32 },

    #[error("row_alignment {0} must be a power of two")]
    BadAlignment(u32),

    #[error("paint_queue_capacity must be at least 1")]
    ZeroQueueCapacity,

    #[error("windowless_frame_rate {0} is out of range (expected 1..=240)")]
    FrameRateOutOfRange(u32),

    #[error("invalid configuration document: {0}")]
    Json(#[from] serde_json::Error),
}

fn validate(c: &CompositorConfig) -> Result<(), ConfigError> {
    if c.width == 0 || c.height == 0 {
        return Err(ConfigError::ZeroSize {
            width: c.width,
            height: c.height,
        });
    }
    if !c.row_alignment.is_power_of_two() {
        return Err(ConfigError::BadAlignment(c.row_alignment));
    }
    if c.paint_queue_capacity == 0 {
        return Err(ConfigError::ZeroQueueCapacity);
    }
    if !(1..=MAX_FRAME_RATE).contains(&c.windowless_frame_rate) {
        return Err(ConfigError::FrameRateOutOfRange(c.windowless_frame_rate));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = CompositorConfig::default();
        assert!(cfg.validate().is_ok());
        assert!(cfg.shared_texture_enabled());
        assert!(cfg.external_begin_frame_enabled());
        assert_eq!(cfg.cache_path(), None);
    }

    #[test]
    fn builder_rejects_bad_values() {
        assert!(matches!(
            CompositorConfig::builder().size(0, 10).build(),
            Err(ConfigError::ZeroSize { width: 0, height: 10 })
        ));
        assert!(matches!(
            CompositorConfig::builder().row_alignment(12).build(),
            Err(ConfigError::BadAlignment(12))
        ));
        assert!(matches!(
            CompositorConfig::builder().row_alignment(0).build(),
            Err(ConfigError::BadAlignment(0))
        ));
        assert!(matches!(
            CompositorConfig::builder().paint_queue_capacity(0).build(),
            Err(ConfigError::ZeroQueueCapacity)
        ));
        assert!(matches!(
            CompositorConfig::builder().windowless_frame_rate(241).build(),
            Err(ConfigError::FrameRateOutOfRange(241))
        ));
    }

    #[test]
    fn shared_textures_need_platform_support() {
        let cfg = CompositorConfig::builder()
            .shared_texture_supported(false)
            .build()
            .expect("valid config");
        assert!(!cfg.shared_texture_enabled());
        // begin-frame pacing only depends on the shared resources switch
        assert!(cfg.external_begin_frame_enabled());
    }

    #[test]
    fn cache_path_uses_named_context() {
        let cfg = CompositorConfig::builder()
            .window_context("chat")
            .storage_root("/var/cache/overlay")
            .build()
            .expect("valid config");
        assert_eq!(
            cfg.cache_path(),
            Some(PathBuf::from("/var/cache/overlay").join("context-chat"))
        );

        let global = CompositorConfig::builder()
            .storage_root("/var/cache/overlay")
            .build()
            .expect("valid config");
        assert_eq!(global.cache_path(), None);
    }

    #[test]
    fn json_fills_in_defaults() {
        let cfg = CompositorConfig::from_json(r#"{ "width": 1280, "raw_blit": true }"#)
            .expect("valid json");
        assert_eq!(cfg.width, 1280);
        assert_eq!(cfg.height, 600);
        assert!(cfg.raw_blit);
        assert_eq!(cfg.paint_queue_capacity, 64);
    }

    #[test]
    fn json_is_validated() {
        assert!(matches!(
            CompositorConfig::from_json(r#"{ "height": 0 }"#),
            Err(ConfigError::ZeroSize { .. })
        ));
        assert!(matches!(
            CompositorConfig::from_json("{ not json"),
            Err(ConfigError::Json(_))
        ));
    }
}
