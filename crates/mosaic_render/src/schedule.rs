//! Render coalescing and off-thread per-cell color extraction.
//!
//! Interactive hosts re-trigger rendering on every configuration change.
//! Both mechanisms here use a generation counter so that only the most
//! recent request wins: earlier render tokens become stale, and extraction
//! results for superseded requests are dropped instead of being read as if
//! they were current.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use image::RgbaImage;
use log::debug;

use crate::mosaic::grid::{self, GridGeometry};

/// Hands out cancellation tokens for scheduled renders. Scheduling a new
/// render invalidates every token issued before it.
#[derive(Debug, Default)]
pub struct RenderScheduler {
    generation: Arc<AtomicU64>,
}

impl RenderScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&self) -> RenderToken {
        let id = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        RenderToken { id, generation: Arc::clone(&self.generation) }
    }
}

/// Token for one scheduled render. The host checks [`RenderToken::is_current`]
/// when its frame callback fires and skips the render if a newer request
/// superseded this one.
#[derive(Clone, Debug)]
pub struct RenderToken {
    id: u64,
    generation: Arc<AtomicU64>,
}

impl RenderToken {
    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.id
    }
}

struct ExtractionJob {
    pixels: RgbaImage,
    geometry: GridGeometry,
    generation: u64,
}

/// Host-visible extraction state. While a request is in flight the host
/// shows a placeholder; it must not read a stale or partial color array.
#[derive(Clone, Debug, PartialEq)]
pub enum ExtractionState {
    Idle,
    InFlight { generation: u64 },
    Ready { generation: u64, colors: Arc<Vec<[u8; 3]>> },
}

/// Dedicated extraction thread computing per-cell dominant colors from a
/// copy of the pixel buffer. Only one extraction is honored at a time: the
/// worker coalesces queued jobs to the newest one, and the host side drops
/// responses whose generation is no longer current.
pub struct ExtractionWorker {
    requests: Sender<ExtractionJob>,
    responses: Receiver<(u64, Arc<Vec<[u8; 3]>>)>,
    generation: u64,
    state: ExtractionState,
}

impl ExtractionWorker {
    pub fn spawn() -> Self {
        let (request_tx, request_rx) = mpsc::channel::<ExtractionJob>();
        let (response_tx, response_rx) = mpsc::channel();

        thread::spawn(move || {
            while let Ok(mut job) = request_rx.recv() {
                // Skip straight to the newest queued job.
                while let Ok(newer) = request_rx.try_recv() {
                    job = newer;
                }
                let colors = grid::dominant_colors(&job.pixels, &job.geometry);
                if response_tx.send((job.generation, Arc::new(colors))).is_err() {
                    break;
                }
            }
        });

        Self {
            requests: request_tx,
            responses: response_rx,
            generation: 0,
            state: ExtractionState::Idle,
        }
    }

    /// Submits a new extraction with a copy of the pixel buffer. Any cached
    /// or in-flight result is invalidated immediately.
    pub fn request(&mut self, pixels: &RgbaImage, geometry: GridGeometry) -> u64 {
        self.generation += 1;
        self.state = ExtractionState::InFlight { generation: self.generation };
        let job = ExtractionJob { pixels: pixels.clone(), geometry, generation: self.generation };
        let _ = self.requests.send(job);
        self.generation
    }

    /// Drains finished extractions, keeping only a result for the current
    /// generation; stale responses are dropped.
    pub fn poll(&mut self) -> &ExtractionState {
        while let Ok((generation, colors)) = self.responses.try_recv() {
            if generation == self.generation {
                self.state = ExtractionState::Ready { generation, colors };
            } else {
                debug!("dropping stale extraction result (generation {generation})");
            }
        }
        &self.state
    }

    /// The current per-cell color array, if extraction has finished and has
    /// not been superseded.
    pub fn colors(&mut self) -> Option<Arc<Vec<[u8; 3]>>> {
        match self.poll() {
            ExtractionState::Ready { colors, .. } => Some(Arc::clone(colors)),
            _ => None,
        }
    }

    /// Synchronous extraction through the same worker channel, for callers
    /// without a frame loop. Falls back to computing inline if the worker
    /// thread is gone.
    pub fn extract_blocking(
        &mut self,
        pixels: &RgbaImage,
        geometry: GridGeometry,
    ) -> Arc<Vec<[u8; 3]>> {
        let generation = self.request(pixels, geometry);

        loop {
            match self.responses.recv() {
                Ok((received, colors)) => {
                    if received == generation {
                        self.state =
                            ExtractionState::Ready { generation, colors: Arc::clone(&colors) };
                        return colors;
                    }
                    debug!("dropping stale extraction result (generation {received})");
                },
                Err(_) => {
                    let colors = Arc::new(grid::dominant_colors(pixels, &geometry));
                    self.state =
                        ExtractionState::Ready { generation, colors: Arc::clone(&colors) };
                    return colors;
                },
            }
        }
    }
}
