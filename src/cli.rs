use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sinegraph", about = "Looping multi-track player with a layered spectrum plot")]
pub struct Cli {
    /// Audio tracks to loop (WAV, MP3, FLAC, OGG, AIFF). Overrides [[tracks]] in the config.
    pub tracks: Vec<PathBuf>,

    /// Config file (defaults to ./sinegraph.toml, then the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Where to write plot paths, one JSON object per line
    #[arg(short, long, default_value = "plots.jsonl")]
    pub output: PathBuf,

    /// Seconds of audio to run
    #[arg(short, long, default_value_t = 10.0)]
    pub seconds: f32,

    /// Session sample rate in Hz
    #[arg(long, default_value_t = 44100)]
    pub sample_rate: u32,

    /// Frames per host callback
    #[arg(long, default_value_t = 220)]
    pub buffer_frames: usize,

    /// FFT size (power of two); defaults to the next power of two above the buffer
    #[arg(long)]
    pub fft_size: Option<usize>,

    /// Track to analyse, by index (repeatable; defaults to every track)
    #[arg(long = "analysis-track")]
    pub analysis_tracks: Vec<usize>,

    /// Play through the default output device instead of the offline clock
    #[arg(long)]
    pub live: bool,
}
