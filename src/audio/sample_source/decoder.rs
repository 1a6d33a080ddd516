// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::io::Cursor;

use symphonia::core::audio::SampleBuffer as PcmBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

use super::buffer::SampleBuffer;
use super::error::SampleSourceError;

/// Turns encoded audio into a fully decoded [`SampleBuffer`] at its native rate.
pub trait Decoder: Send + Sync {
    /// Decodes `data`. `extension` is a format hint such as `"wav"`, if known.
    fn decode(&self, data: Vec<u8>, extension: Option<&str>)
        -> Result<SampleBuffer, SampleSourceError>;
}

/// Decodes WAV, FLAC, MP3, Ogg and the other formats symphonia supports.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl Decoder for SymphoniaDecoder {
    fn decode(
        &self,
        data: Vec<u8>,
        extension: Option<&str>,
    ) -> Result<SampleBuffer, SampleSourceError> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = extension {
            hint.with_extension(extension);
        }

        let probed = get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| SampleSourceError::Decode(format!("unrecognized format: {}", e)))?;
        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| SampleSourceError::Decode("no audio track found".to_string()))?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| SampleSourceError::Decode("sample rate not specified".to_string()))?;
        let mut decoder = get_codecs().make(&params, &DecoderOptions::default())?;

        let mut samples: Vec<f32> = Vec::new();
        let mut channels = params.channels.map(|c| c.count() as u16).unwrap_or(0);
        let mut pcm: Option<PcmBuffer<f32>> = None;

        while let Some(packet) = next_packet(format_reader.as_mut(), &mut *decoder)? {
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    // A corrupt packet loses a few milliseconds, not the whole sample.
                    debug!(err = e, "Skipping undecodable packet");
                    continue;
                }
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let spec = *decoded.spec();
            let frames = decoded.capacity() as u64;
            if channels == 0 {
                channels = spec.channels.count() as u16;
            }

            let needed = decoded.capacity() * spec.channels.count();
            if pcm.as_ref().map_or(true, |buffer| buffer.capacity() < needed) {
                pcm = Some(PcmBuffer::<f32>::new(frames, spec));
            }
            if let Some(buffer) = pcm.as_mut() {
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
        }

        if channels == 0 || samples.is_empty() {
            return Err(SampleSourceError::Decode(
                "stream contains no audio".to_string(),
            ));
        }

        let buffer = SampleBuffer::from_interleaved(&samples, channels, sample_rate);
        debug!(
            frames = buffer.len(),
            channels,
            sample_rate,
            "Decoded audio"
        );
        Ok(buffer)
    }
}

/// Reads the next packet, treating end of stream as `None` and resetting the
/// decoder when the container asks for it.
fn next_packet(
    format_reader: &mut dyn FormatReader,
    decoder: &mut dyn symphonia::core::codecs::Decoder,
) -> Result<Option<Packet>, SampleSourceError> {
    loop {
        match format_reader.next_packet() {
            Ok(packet) => return Ok(Some(packet)),
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(None)
            }
            Err(e) => return Err(e.into()),
        }
    }
}
