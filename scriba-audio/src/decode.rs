//! Compressed-container decoding to normalized mono PCM
//!
//! Demuxes an audio container (m4a/AAC recordings, plus MP3/FLAC/OGG/WAV),
//! decodes it to linear PCM, and downmixes to a single channel of f32
//! samples in [-1.0, 1.0).

use std::fs::File;
use std::path::{Path, PathBuf};
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, Track};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;
use tracing::debug;

/// Full-scale divisor for 16-bit normalization. Dividing by the negative
/// full-scale magnitude maps i16 onto [-1.0, 1.0); positive full scale lands
/// just under 1.0 and is left there rather than remapped.
const I16_FULL_SCALE: f32 = 32768.0;

/// Decoding errors. All are unrecoverable for the given input: the source
/// file is malformed or unsupported, so callers should report rather than
/// retry.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("no audio track found in {0}")]
    NoAudioTrack(PathBuf),

    #[error("missing format metadata for {0}")]
    MissingFormat(PathBuf),

    #[error("unsupported PCM encoding: {0}")]
    UnsupportedEncoding(&'static str),

    #[error("container decode failed: {0}")]
    Container(#[from] SymphoniaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for decode operations
pub type DecodeResult<T> = Result<T, DecodeError>;

/// A decoded, downmixed audio buffer. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Mono samples, normalized to approximately [-1.0, 1.0)
    pub samples: Vec<f32>,
    /// Sample rate the samples were decoded at
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Duration of the buffer in seconds
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Decode an audio container file to a mono f32 buffer.
///
/// Fails without partial output when the container has no audio track, when
/// the track does not declare its format, or when the decoded PCM layout is
/// neither 16-bit integer nor 32-bit float.
pub fn decode_to_mono(path: &Path) -> DecodeResult<DecodedAudio> {
    let file = File::open(path)?;
    let stream = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        stream,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = select_audio_track(format.tracks())
        .ok_or_else(|| DecodeError::NoAudioTrack(path.to_path_buf()))?;
    let track_id = track.id;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| DecodeError::MissingFormat(path.to_path_buf()))?;

    // A codec we cannot instantiate is the same condition as an undeclared
    // format: the track's encoding cannot be determined.
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|_| DecodeError::MissingFormat(path.to_path_buf()))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder.decode(&packet)?;
        append_downmixed(&decoded, &mut samples)?;
    }

    debug!(
        "Decoded {:?}: {} mono samples at {} Hz ({:.2}s)",
        path,
        samples.len(),
        sample_rate,
        samples.len() as f32 / sample_rate as f32
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

/// Pick the first track carrying an audio codec
fn select_audio_track(tracks: &[Track]) -> Option<&Track> {
    tracks
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
}

/// Downmix one decoded buffer into the output, averaging channels per frame.
///
/// The mix is a plain arithmetic mean; for 16-bit sources it is computed in
/// integer arithmetic before normalization, matching the recorder's own
/// playback path. Not loudness-weighted.
fn append_downmixed(decoded: &AudioBufferRef<'_>, out: &mut Vec<f32>) -> DecodeResult<()> {
    match decoded {
        AudioBufferRef::S16(buf) => {
            let channels = buf.spec().channels.count();
            if channels <= 1 {
                out.extend(buf.chan(0).iter().map(|&s| s as f32 / I16_FULL_SCALE));
            } else {
                for frame in 0..buf.frames() {
                    let mut sum = 0i32;
                    for ch in 0..channels {
                        sum += buf.chan(ch)[frame] as i32;
                    }
                    out.push((sum / channels as i32) as f32 / I16_FULL_SCALE);
                }
            }
            Ok(())
        }
        AudioBufferRef::F32(buf) => {
            let channels = buf.spec().channels.count();
            if channels <= 1 {
                out.extend_from_slice(buf.chan(0));
            } else {
                for frame in 0..buf.frames() {
                    let mut sum = 0f32;
                    for ch in 0..channels {
                        sum += buf.chan(ch)[frame];
                    }
                    out.push(sum / channels as f32);
                }
            }
            Ok(())
        }
        other => Err(DecodeError::UnsupportedEncoding(encoding_name(other))),
    }
}

fn encoding_name(buf: &AudioBufferRef<'_>) -> &'static str {
    match buf {
        AudioBufferRef::U8(_) => "u8",
        AudioBufferRef::U16(_) => "u16",
        AudioBufferRef::U24(_) => "u24",
        AudioBufferRef::U32(_) => "u32",
        AudioBufferRef::S8(_) => "s8",
        AudioBufferRef::S16(_) => "s16",
        AudioBufferRef::S24(_) => "s24",
        AudioBufferRef::S32(_) => "s32",
        AudioBufferRef::F32(_) => "f32",
        AudioBufferRef::F64(_) => "f64",
    }
}
