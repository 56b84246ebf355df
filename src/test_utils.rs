use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc::{Receiver, Sender},
        Mutex,
    },
};

use reqwest::StatusCode;

use crate::{
    transport::{Transport, TransportResponse},
    Error, Result,
};

/// Transport that serves canned responses and records requests.
///
/// Once the queue is exhausted, it keeps answering 304.
#[derive(Default)]
pub struct FakeTransport {
    responses: Mutex<VecDeque<Result<TransportResponse>>>,
    calls: AtomicUsize,
    validators: Mutex<Vec<Option<String>>>,
    gate: Option<Gate>,
}

/// Lets a test hold a request in flight: the transport signals `entered` and blocks until
/// `release` receives a message.
struct Gate {
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl FakeTransport {
    pub fn new() -> FakeTransport {
        FakeTransport::default()
    }

    pub fn gated(entered: Sender<()>, release: Receiver<()>) -> FakeTransport {
        FakeTransport {
            gate: Some(Gate {
                entered: Mutex::new(entered),
                release: Mutex::new(release),
            }),
            ..FakeTransport::default()
        }
    }

    pub fn ok(self, body: &str, etag: Option<&str>) -> FakeTransport {
        self.push(Ok(TransportResponse {
            status: StatusCode::OK,
            body: body.as_bytes().to_vec(),
            validator: etag.map(str::to_owned),
        }))
    }

    pub fn status(self, status: StatusCode) -> FakeTransport {
        self.push(Ok(TransportResponse {
            status,
            body: Vec::new(),
            validator: None,
        }))
    }

    pub fn error(self, error: Error) -> FakeTransport {
        self.push(Err(error))
    }

    fn push(self, response: Result<TransportResponse>) -> FakeTransport {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn validators(&self) -> Vec<Option<String>> {
        self.validators.lock().unwrap().clone()
    }
}

impl Transport for FakeTransport {
    fn conditional_get(&self, _path: &str, validator: Option<&str>) -> Result<TransportResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.validators
            .lock()
            .unwrap()
            .push(validator.map(str::to_owned));

        if let Some(gate) = &self.gate {
            let _ = gate.entered.lock().unwrap().send(());
            let _ = gate.release.lock().unwrap().recv();
        }

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(TransportResponse {
                    status: StatusCode::NOT_MODIFIED,
                    body: Vec::new(),
                    validator: None,
                })
            })
    }
}
