pub mod analysis;
pub mod decode;
pub mod mixer;
#[cfg(feature = "playback")]
pub mod playback;
pub mod track;
