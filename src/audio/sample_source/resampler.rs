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
use std::str::FromStr;
use std::sync::Arc;

use rubato::{
    Resampler as _, SincFixedIn, SincInterpolationParameters, SincInterpolationType,
    WindowFunction,
};
use serde::Deserialize;

use super::buffer::{Format, SampleBuffer};
use super::error::SampleSourceError;
use super::frame::Frame;

/// Input block size for the sinc resampler.
const INPUT_BLOCK_SIZE: usize = 1024;

/// Converts a decoded buffer to another sample rate.
pub trait Resampler: Send + Sync {
    /// Resamples `buffer` to `target_rate`. Buffers already at the target rate are
    /// returned unchanged.
    fn resample(
        &self,
        buffer: SampleBuffer,
        target_rate: u32,
    ) -> Result<SampleBuffer, SampleSourceError>;
}

/// The available resampling algorithms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResamplerKind {
    /// Band-limited sinc interpolation.
    #[default]
    Sinc,
    /// Linear interpolation. Cheap, fine for drum hits and one-shots.
    Linear,
}

impl ResamplerKind {
    /// Creates the resampler for this kind.
    pub fn build(self) -> Arc<dyn Resampler> {
        match self {
            ResamplerKind::Sinc => Arc::new(SincResampler),
            ResamplerKind::Linear => Arc::new(LinearResampler),
        }
    }
}

impl FromStr for ResamplerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sinc" => Ok(ResamplerKind::Sinc),
            "linear" => Ok(ResamplerKind::Linear),
            _ => Err(format!("Unsupported resampler: {}", s)),
        }
    }
}

/// Number of output frames for `frames` input frames.
fn target_frames(frames: usize, source_rate: u32, target_rate: u32) -> usize {
    (frames as f64 * target_rate as f64 / source_rate as f64).ceil() as usize
}

/// Appends planar resampler output to the accumulated channels.
fn append(out: &mut [Vec<f32>; 2], chunk: Vec<Vec<f32>>) {
    for (dst, src) in out.iter_mut().zip(chunk) {
        dst.extend_from_slice(&src);
    }
}

/// Sinc resampler backed by rubato.
#[derive(Debug, Default, Clone, Copy)]
pub struct SincResampler;

impl Resampler for SincResampler {
    fn resample(
        &self,
        buffer: SampleBuffer,
        target_rate: u32,
    ) -> Result<SampleBuffer, SampleSourceError> {
        let format = buffer.format();
        let source_rate = format.sample_rate;
        if source_rate == target_rate || buffer.is_empty() {
            return Ok(buffer);
        }
        let failed = |_| SampleSourceError::ResamplingFailed(source_rate, target_rate);

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            oversampling_factor: 128,
            interpolation: SincInterpolationType::Linear,
            window: WindowFunction::BlackmanHarris2,
        };
        let mut resampler = SincFixedIn::<f32>::new(
            target_rate as f64 / source_rate as f64,
            1.0,
            params,
            INPUT_BLOCK_SIZE,
            2,
        )
        .map_err(|_| SampleSourceError::ResamplingFailed(source_rate, target_rate))?;

        let frames = buffer.into_frames();
        let left: Vec<f32> = frames.iter().map(|f| f.left).collect();
        let right: Vec<f32> = frames.iter().map(|f| f.right).collect();

        let expected = target_frames(frames.len(), source_rate, target_rate);
        let delay = resampler.output_delay();
        let mut out: [Vec<f32>; 2] = [
            Vec::with_capacity(expected + delay),
            Vec::with_capacity(expected + delay),
        ];

        let mut position = 0;
        while frames.len() - position >= resampler.input_frames_next() {
            let next = position + resampler.input_frames_next();
            let input: [&[f32]; 2] = [&left[position..next], &right[position..next]];
            let chunk = resampler.process(&input[..], None).map_err(failed)?;
            append(&mut out, chunk);
            position = next;
        }
        if position < frames.len() {
            let input: [&[f32]; 2] = [&left[position..], &right[position..]];
            let chunk = resampler
                .process_partial(Some(&input[..]), None)
                .map_err(failed)?;
            append(&mut out, chunk);
        }
        // Flush the filter tail until the delayed output covers the whole input.
        while out[0].len() < expected + delay {
            let chunk = resampler
                .process_partial(None::<&[&[f32]]>, None)
                .map_err(failed)?;
            if chunk.first().map_or(true, |c| c.is_empty()) {
                break;
            }
            append(&mut out, chunk);
        }

        let resampled = out[0]
            .iter()
            .zip(out[1].iter())
            .skip(delay)
            .take(expected)
            .map(|(l, r)| Frame::new(*l, *r))
            .collect();

        Ok(SampleBuffer::new(
            resampled,
            Format {
                sample_rate: target_rate,
                channels: format.channels,
            },
        ))
    }
}

/// Linear interpolation resampler.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinearResampler;

impl Resampler for LinearResampler {
    fn resample(
        &self,
        buffer: SampleBuffer,
        target_rate: u32,
    ) -> Result<SampleBuffer, SampleSourceError> {
        let format = buffer.format();
        let source_rate = format.sample_rate;
        if source_rate == target_rate || buffer.is_empty() {
            return Ok(buffer);
        }
        if source_rate == 0 || target_rate == 0 {
            return Err(SampleSourceError::ResamplingFailed(source_rate, target_rate));
        }

        let ratio = target_rate as f64 / source_rate as f64;
        let source = buffer.frames();
        let frames = (0..target_frames(source.len(), source_rate, target_rate))
            .map(|i| {
                let position = i as f64 / ratio;
                let index = position.floor() as usize;
                let frac = position.fract() as f32;

                let a = source.get(index).copied().unwrap_or(Frame::ZERO);
                let b = source.get(index + 1).copied().unwrap_or(a);
                Frame::new(
                    a.left + (b.left - a.left) * frac,
                    a.right + (b.right - a.right) * frac,
                )
            })
            .collect();

        Ok(SampleBuffer::new(
            frames,
            Format {
                sample_rate: target_rate,
                channels: format.channels,
            },
        ))
    }
}
