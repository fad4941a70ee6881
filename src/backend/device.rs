//! Real-time audio output using cpal
//!
//! Each context owns one output stream on the default (or named) device.
//! The stream callback renders the context's [`MixGraph`]; closing the
//! context drops the stream, which releases the device.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, warn};

use super::{AudioBackend, OutputContext};
use crate::error::{LullError, Result};
use crate::graph::MixGraph;

fn unavailable<E>(reason: &str, err: E) -> LullError
where
    E: std::error::Error + Send + Sync + 'static,
{
    LullError::AudioUnavailable {
        reason: format!("{}: {}", reason, err),
        source: Some(Box::new(err)),
    }
}

/// Backend opening cpal output streams
#[derive(Debug, Clone, Default)]
pub struct CpalBackend {
    device_name: Option<String>,
}

impl CpalBackend {
    /// Use the host's default output device
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the output device with this exact name
    pub fn with_device(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
        }
    }

    fn find_device(&self, host: &cpal::Host) -> Result<cpal::Device> {
        match &self.device_name {
            Some(wanted) => host
                .output_devices()
                .map_err(|e| unavailable("cannot enumerate output devices", e))?
                .find(|d| d.name().map(|n| n == *wanted).unwrap_or(false))
                .ok_or_else(|| LullError::unavailable(format!("output device '{}' not found", wanted))),
            None => host
                .default_output_device()
                .ok_or_else(|| LullError::unavailable("no audio output device found")),
        }
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        graph: Arc<Mutex<MixGraph>>,
        channels: usize,
    ) -> Result<cpal::Stream>
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        let mut scratch: Vec<f32> = Vec::new();
        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    scratch.clear();
                    scratch.resize(data.len(), 0.0);
                    if let Ok(mut graph) = graph.lock() {
                        graph.fill_interleaved(&mut scratch, channels);
                    }
                    for (out, &sample) in data.iter_mut().zip(scratch.iter()) {
                        *out = T::from_sample(sample);
                    }
                },
                |err| error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| unavailable("cannot build output stream", e))
    }
}

impl AudioBackend for CpalBackend {
    type Context = CpalContext;

    fn name(&self) -> &str {
        "cpal"
    }

    fn open(&mut self) -> Result<CpalContext> {
        let host = cpal::default_host();
        info!("Audio host: {:?}", host.id());

        let device = self.find_device(&host)?;
        if let Ok(name) = device.name() {
            info!("Audio device: {}", name);
        }

        let config = device
            .default_output_config()
            .map_err(|e| unavailable("no usable output configuration", e))?;
        let sample_rate = config.sample_rate().0;
        let channels = config.channels() as usize;

        let graph = Arc::new(Mutex::new(MixGraph::new(sample_rate)));
        let stream_config: cpal::StreamConfig = config.clone().into();

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &stream_config, graph.clone(), channels)
            }
            cpal::SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &stream_config, graph.clone(), channels)
            }
            cpal::SampleFormat::U16 => {
                Self::build_stream::<u16>(&device, &stream_config, graph.clone(), channels)
            }
            other => {
                return Err(LullError::unavailable(format!(
                    "unsupported sample format {:?}",
                    other
                )))
            }
        }?;

        stream
            .play()
            .map_err(|e| unavailable("cannot start output stream", e))?;
        info!("Audio stream started at {} Hz, {} channels", sample_rate, channels);

        Ok(CpalContext {
            graph,
            stream: Some(stream),
            sample_rate,
        })
    }
}

/// A live cpal output stream and its graph
pub struct CpalContext {
    graph: Arc<Mutex<MixGraph>>,
    stream: Option<cpal::Stream>,
    sample_rate: u32,
}

impl OutputContext for CpalContext {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn with_graph<R>(&mut self, f: impl FnOnce(&mut MixGraph) -> Result<R>) -> Result<R> {
        if self.stream.is_none() {
            return Err(LullError::graph("output stream is closed"));
        }
        let mut graph = self
            .graph
            .lock()
            .map_err(|_| LullError::graph("graph lock poisoned"))?;
        f(&mut *graph)
    }

    fn inspect<R>(&self, f: impl FnOnce(&MixGraph) -> R) -> Option<R> {
        self.stream.as_ref()?;
        let graph = self.graph.lock().ok()?;
        Some(f(&*graph))
    }

    fn close(&mut self) -> Result<()> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };
        if let Err(e) = stream.pause() {
            warn!("Failed to pause stream before close: {}", e);
        }
        drop(stream);
        let mut graph = self
            .graph
            .lock()
            .map_err(|_| LullError::graph("graph lock poisoned"))?;
        graph.close();
        info!("Audio stream closed");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.stream.is_none()
    }
}

impl Drop for CpalContext {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close audio stream on drop: {}", e);
        }
    }
}
