use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("no audio input device available")]
    NoDevice,

    #[error("no input device matching '{0}'")]
    DeviceNotFound(String),

    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query stream config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    Build(#[from] cpal::BuildStreamError),

    #[error("failed to start input stream: {0}")]
    Play(#[from] cpal::PlayStreamError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("palette holds {got} pixels, matrix needs {want}")]
    PaletteSize { got: usize, want: usize },

    #[error("{0} is out of range")]
    OutOfRange(&'static str),
}
