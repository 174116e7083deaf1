//! Audio block acquisition.
//!
//! A cpal input stream downmixes whatever the device delivers to mono i16
//! and hands complete fixed-size blocks to the pipeline over a bounded
//! channel. The callback never blocks; if the pipeline falls behind,
//! blocks are dropped and counted.

use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, StreamConfig};
use tracing::{error, info, warn};
use vubar_dsp::BLOCK_SIZE;

use crate::error::CaptureError;

type SampleBlock = Box<[i16; BLOCK_SIZE]>;

/// Blocking, bounded-latency source of capture blocks.
///
/// cpal streams are not `Send`, so a `BlockReader` must be opened on the
/// thread that will consume it — in practice, the pipeline thread.
pub struct BlockReader {
    rx: Receiver<SampleBlock>,
    block: SampleBlock,
    sample_rate: u32,
    stream_lost: bool,
    _stream: cpal::Stream,
}

impl BlockReader {
    /// Open the capture device and start streaming. Any failure here is a
    /// hardware-init fault and should abort startup.
    pub fn open(device_hint: Option<&str>) -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = pick_device(&host, device_hint)?;
        info!(
            "capturing from '{}'",
            device.name().unwrap_or_else(|_| "<unnamed>".into())
        );

        let supported = device.default_input_config()?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        let config: StreamConfig = supported.config();

        let (tx, rx) = sync_channel::<SampleBlock>(4);
        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, channels, tx)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, channels, tx)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, channels, tx)?,
            other => return Err(CaptureError::UnsupportedFormat(format!("{:?}", other))),
        };
        stream.play()?;
        info!("input stream running at {} Hz, {} channel(s)", sample_rate, channels);

        Ok(Self {
            rx,
            block: Box::new([0i16; BLOCK_SIZE]),
            sample_rate,
            stream_lost: false,
            _stream: stream,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Wait up to `timeout` for the next complete block.
    ///
    /// Returns `true` when a fresh block arrived. On timeout the previous
    /// block is kept — a degraded cycle, not a failure — and a diagnostic
    /// is emitted.
    pub fn capture_block(&mut self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(block) => {
                self.block = block;
                // Drain anything queued behind it so the display tracks
                // the newest audio rather than a backlog.
                while let Ok(newer) = self.rx.try_recv() {
                    self.block = newer;
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("no capture block within {:?}; reusing previous block", timeout);
                false
            }
            Err(RecvTimeoutError::Disconnected) => {
                if !self.stream_lost {
                    error!("capture stream ended; display continues on stale audio");
                    self.stream_lost = true;
                }
                std::thread::sleep(timeout);
                false
            }
        }
    }

    pub fn block(&self) -> &[i16; BLOCK_SIZE] {
        &self.block
    }
}

fn pick_device(host: &cpal::Host, hint: Option<&str>) -> Result<Device, CaptureError> {
    match hint {
        None => host.default_input_device().ok_or(CaptureError::NoDevice),
        Some(needle) => {
            let needle_lower = needle.to_lowercase();
            for device in host.input_devices()? {
                if let Ok(name) = device.name() {
                    if name.to_lowercase().contains(&needle_lower) {
                        return Ok(device);
                    }
                }
            }
            Err(CaptureError::DeviceNotFound(needle.to_string()))
        }
    }
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    channels: usize,
    tx: SyncSender<SampleBlock>,
) -> Result<cpal::Stream, CaptureError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    let mut pending: Vec<i16> = Vec::with_capacity(BLOCK_SIZE * 2);
    let mut dropped: u64 = 0;

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            for frame in data.chunks(channels.max(1)) {
                let mut acc = 0.0f32;
                for &sample in frame {
                    let value: f32 = cpal::Sample::from_sample(sample);
                    acc += value;
                }
                let mono = acc / frame.len() as f32;
                pending.push((mono * i16::MAX as f32) as i16);
            }

            while pending.len() >= BLOCK_SIZE {
                let mut block = Box::new([0i16; BLOCK_SIZE]);
                block.copy_from_slice(&pending[..BLOCK_SIZE]);
                pending.drain(..BLOCK_SIZE);

                match tx.try_send(block) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        dropped += 1;
                        if dropped % 64 == 1 {
                            warn!("pipeline behind; {} capture blocks dropped", dropped);
                        }
                    }
                    Err(TrySendError::Disconnected(_)) => {}
                }
            }
        },
        move |err| {
            error!("input stream error: {}", err);
        },
        None,
    )?;

    Ok(stream)
}
