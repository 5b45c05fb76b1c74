use thiserror::Error;

/// Errors surfaced by the demo. Rendering itself never fails once the
/// configuration has been validated.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config file '{path}': {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The depth-capture pass renders into the visible framebuffer, so the
    /// shadow map can never be larger than the window.
    #[error(
        "shadow map resolution {resolution} exceeds the display surface {width}x{height}"
    )]
    ShadowMapTooLarge {
        resolution: usize,
        width: usize,
        height: usize,
    },

    #[error("window error: {0}")]
    Window(#[from] minifb::Error),

    #[error("failed to save image to '{path}': {source}")]
    ImageSave {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
