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
use std::{
    any::TypeId,
    io::Cursor,
    net::SocketAddr,
    path::Path,
    sync::Arc,
    thread,
    time::{Duration, SystemTime},
};

use hound::{SampleFormat, WavSpec, WavWriter};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::audio::sample_source::{Format, Frame, SampleBuffer};

/// Encodes planar channel data as an in-memory WAV file. `f32` samples are
/// written as 32-bit float, `i16` samples as 16-bit PCM.
pub fn wav_bytes<S: hound::Sample + Copy + 'static>(
    channels: &[Vec<S>],
    sample_rate: u32,
) -> Vec<u8> {
    let (sample_format, bits_per_sample) = if TypeId::of::<S>() == TypeId::of::<f32>() {
        (SampleFormat::Float, 32)
    } else if TypeId::of::<S>() == TypeId::of::<i16>() {
        (SampleFormat::Int, 16)
    } else {
        panic!("Unsupported sample type for test WAV");
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(
            &mut cursor,
            WavSpec {
                channels: channels.len() as u16,
                sample_rate,
                bits_per_sample,
                sample_format,
            },
        )
        .expect("create wav writer");

        let frames = channels.first().map(|c| c.len()).unwrap_or(0);
        for frame in 0..frames {
            for channel in channels {
                writer.write_sample(channel[frame]).expect("write sample");
            }
        }
        writer.finalize().expect("finalize wav");
    }
    cursor.into_inner()
}

/// Writes a WAV file to disk, see [`wav_bytes`].
pub fn write_wav<S: hound::Sample + Copy + 'static>(
    path: &Path,
    channels: &[Vec<S>],
    sample_rate: u32,
) {
    std::fs::write(path, wav_bytes(channels, sample_rate)).expect("write wav file");
}

/// Creates a shared buffer holding `count` copies of the given frame.
pub fn constant_buffer(frame: Frame, count: usize) -> Arc<SampleBuffer> {
    Arc::new(SampleBuffer::new(
        vec![frame; count],
        Format {
            sample_rate: 48000,
            channels: 2,
        },
    ))
}

/// Wait for the given predicate to return true or fail.
#[inline]
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = SystemTime::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    loop {
        let elapsed = start.elapsed().expect("System time error");
        if elapsed > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }
        thread::sleep(tick);
    }
}

/// Async version of [`eventually`] for tests running on a tokio runtime.
pub async fn eventually_async<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let tick = Duration::from_millis(10);
    for _ in 0..300 {
        if predicate() {
            return;
        }
        tokio::time::sleep(tick).await;
    }
    panic!("{}", error_msg);
}

/// Sends a bare HTTP/1.1 POST to `addr` and returns the response status code.
pub async fn http_post(addr: SocketAddr, path: &str, content_type: &str, body: &[u8]) -> u16 {
    let mut stream = TcpStream::connect(addr).await.expect("connect to server");
    let head = format!(
        concat!(
            "POST {} HTTP/1.1\r\n",
            "Host: {}\r\n",
            "Content-Type: {}\r\n",
            "Content-Length: {}\r\n",
            "Connection: close\r\n\r\n"
        ),
        path,
        addr,
        content_type,
        body.len()
    );
    stream.write_all(head.as_bytes()).await.expect("write request head");
    // The server may answer and hang up before reading an oversized body.
    let _ = stream.write_all(body).await;

    let mut response = Vec::new();
    let _ = stream.read_to_end(&mut response).await;
    String::from_utf8_lossy(&response)
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .expect("response status line")
}
