// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Background image worker.
//
// Decode, detection and rendering are CPU-bound, so they run on a dedicated
// blocking thread. Callers talk to it through a typed request enum; each
// `call` sends exactly one request and waits (bounded) for its reply.

use std::sync::Arc;
use std::time::Duration;

use cardwerk_core::error::{CardwerkError, Result};
use cardwerk_core::{CardwerkConfig, DetectedCard, PairRequest, PairResult};
use cardwerk_vision::{CardDetector, DecodedImage, Decoder, ExportRenderer, InputFile};
use image::DynamicImage;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, warn};

/// A unit of work for the image worker. Payloads are moved, not copied.
pub enum WorkerRequest {
    Decode(InputFile),
    Detect { file: String, image: DynamicImage },
    ProcessPair(PairRequest),
}

impl WorkerRequest {
    /// Method name used in logs and timeout errors.
    pub fn method(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::Detect { .. } => "detect",
            Self::ProcessPair(_) => "process_pair",
        }
    }
}

/// Reply to a `WorkerRequest`, one variant per request kind.
pub enum WorkerResponse {
    Decoded(Box<DecodedImage>),
    Detected(Vec<DetectedCard>),
    Rendered(PairResult),
}

/// The decoder, detector and renderer the worker thread dispatches to.
pub struct ImageEngine {
    decoder: Decoder,
    detector: CardDetector,
    renderer: ExportRenderer,
}

impl ImageEngine {
    pub fn new(decoder: Decoder, detector: CardDetector) -> Self {
        Self {
            decoder,
            detector,
            renderer: ExportRenderer::new(),
        }
    }

    pub fn from_config(config: &CardwerkConfig) -> Self {
        let decoder = Decoder::new(config.decoder.clone());
        #[cfg(feature = "heif")]
        let decoder = decoder.with_heif_converter(cardwerk_vision::LibHeifConverter::default());
        Self::new(decoder, CardDetector::new(config.detector.clone()))
    }

    /// Run one request to completion on the current thread.
    pub fn handle(&self, request: WorkerRequest) -> Result<WorkerResponse> {
        match request {
            WorkerRequest::Decode(file) => self
                .decoder
                .decode(&file)
                .map(|decoded| WorkerResponse::Decoded(Box::new(decoded))),
            WorkerRequest::Detect { file, image } => self
                .detector
                .detect_in(&file, &image)
                .map(WorkerResponse::Detected),
            WorkerRequest::ProcessPair(request) => self
                .renderer
                .process_pair(&request)
                .map(WorkerResponse::Rendered),
        }
    }
}

struct Envelope {
    request: WorkerRequest,
    reply: oneshot::Sender<Result<WorkerResponse>>,
}

/// Handle to the worker thread.
///
/// `call` takes `&mut self`, so a handle never has more than one request in
/// flight. Dropping the handle closes the channel and the thread exits once
/// its current request (if any) is done.
pub struct ImageWorker {
    engine: Arc<ImageEngine>,
    sender: mpsc::Sender<Envelope>,
    timeout: Duration,
}

impl ImageWorker {
    /// Start a worker thread. Must be called inside a Tokio runtime.
    pub fn spawn(engine: ImageEngine, timeout: Duration) -> Self {
        let engine = Arc::new(engine);
        let sender = start_thread(Arc::clone(&engine));
        info!(timeout_secs = timeout.as_secs(), "image worker started");
        Self {
            engine,
            sender,
            timeout,
        }
    }

    pub fn from_config(config: &CardwerkConfig) -> Self {
        Self::spawn(
            ImageEngine::from_config(config),
            Duration::from_secs(config.worker.request_timeout_secs),
        )
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Send one request and wait for its reply.
    ///
    /// On timeout the thread is abandoned and a fresh one takes its place;
    /// the abandoned thread exits after finishing its current request.
    #[instrument(skip(self, request), fields(method = request.method()))]
    pub async fn call(&mut self, request: WorkerRequest) -> Result<WorkerResponse> {
        let method = request.method();
        let (reply, response) = oneshot::channel();

        if self.sender.send(Envelope { request, reply }).await.is_err() {
            self.respawn();
            return Err(CardwerkError::WorkerUnavailable(format!(
                "worker thread had exited before {method}"
            )));
        }

        match tokio::time::timeout(self.timeout, response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                warn!("worker thread dropped the request");
                self.respawn();
                Err(CardwerkError::WorkerUnavailable(format!(
                    "worker stopped while handling {method}"
                )))
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "worker request timed out");
                self.respawn();
                Err(CardwerkError::Timeout {
                    operation: method.to_string(),
                    seconds: self.timeout.as_secs(),
                })
            }
        }
    }

    fn respawn(&mut self) {
        self.sender = start_thread(Arc::clone(&self.engine));
        debug!("image worker replaced");
    }

    // -- Typed helpers --------------------------------------------------------

    pub async fn decode(&mut self, file: InputFile) -> Result<DecodedImage> {
        match self.call(WorkerRequest::Decode(file)).await? {
            WorkerResponse::Decoded(decoded) => Ok(*decoded),
            _ => Err(mismatch("decode")),
        }
    }

    pub async fn detect(
        &mut self,
        file: impl Into<String>,
        image: DynamicImage,
    ) -> Result<Vec<DetectedCard>> {
        let request = WorkerRequest::Detect {
            file: file.into(),
            image,
        };
        match self.call(request).await? {
            WorkerResponse::Detected(cards) => Ok(cards),
            _ => Err(mismatch("detect")),
        }
    }

    pub async fn process_pair(&mut self, request: PairRequest) -> Result<PairResult> {
        match self.call(WorkerRequest::ProcessPair(request)).await? {
            WorkerResponse::Rendered(result) => Ok(result),
            _ => Err(mismatch("process_pair")),
        }
    }
}

fn mismatch(method: &str) -> CardwerkError {
    CardwerkError::WorkerUnavailable(format!("unexpected response to {method}"))
}

fn start_thread(engine: Arc<ImageEngine>) -> mpsc::Sender<Envelope> {
    let (sender, mut receiver) = mpsc::channel::<Envelope>(1);
    tokio::task::spawn_blocking(move || {
        while let Some(Envelope { request, reply }) = receiver.blocking_recv() {
            let method = request.method();
            let result = engine.handle(request);
            if reply.send(result).is_err() {
                debug!(method, "reply discarded; caller gave up");
            }
        }
        debug!("image worker thread exiting");
    });
    sender
}
