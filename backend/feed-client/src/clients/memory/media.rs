use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::clients::{ClientError, ClientResult, MediaClient, UploadRequest};

#[derive(Default)]
struct MediaState {
    faults: VecDeque<ClientError>,
    uploads: Vec<UploadRequest>,
}

/// In-process media host. Uploaded objects are served from `base_url`.
pub struct MemoryMediaClient {
    base_url: String,
    state: Mutex<MediaState>,
}

impl MemoryMediaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            state: Mutex::new(MediaState::default()),
        }
    }

    /// Answer the next upload with a non-2xx status
    pub fn reject_next(&self, status: u16) {
        self.fail_next(ClientError::Rejected {
            status,
            message: "upload rejected".to_string(),
        });
    }

    pub fn fail_next(&self, err: ClientError) {
        self.state.lock().faults.push_back(err);
    }

    pub fn uploads(&self) -> Vec<UploadRequest> {
        self.state.lock().uploads.clone()
    }
}

#[async_trait]
impl MediaClient for MemoryMediaClient {
    async fn upload(&self, request: UploadRequest) -> ClientResult<String> {
        tokio::task::yield_now().await;

        let mut state = self.state.lock();
        if let Some(err) = state.faults.pop_front() {
            return Err(err);
        }
        if !request.source.is_valid() {
            return Err(ClientError::Rejected {
                status: 400,
                message: "empty upload".to_string(),
            });
        }

        let url = format!("{}/{}", self.base_url, request.object_name);
        state.uploads.push(request);
        Ok(url)
    }
}
