use std::time::Duration;

use salvo::prelude::*;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

use crate::inference::InferenceRequest;
use crate::state::AppState;

pub(crate) fn get_state(depot: &mut Depot) -> Result<&AppState, StatusError> {
    depot
        .obtain::<AppState>()
        .map_err(|_| StatusError::internal_server_error())
}

/// Queue a request on the inference thread and wait for its reply.
///
/// `wait` bounds the whole exchange: waiting for a free slot in a full queue
/// counts against it as well as waiting for the reply. On timeout the
/// request is dropped along with everything it owns.
pub(crate) async fn round_trip<R>(
    tx: &mpsc::Sender<InferenceRequest>,
    make_request: impl FnOnce(oneshot::Sender<R>) -> InferenceRequest,
    wait: Duration,
) -> Result<R, StatusError> {
    let (response_tx, response_rx) = oneshot::channel();
    let request = make_request(response_tx);

    let exchange = async move {
        tx.send(request).await.map_err(|_| {
            tracing::error!("Inference thread is not running");
            StatusError::internal_server_error()
        })?;
        response_rx.await.map_err(|_| {
            tracing::error!("Inference thread dropped the request");
            StatusError::internal_server_error()
        })
    };

    timeout(wait, exchange).await.map_err(|_| {
        tracing::error!("Inference timed out after {:?}", wait);
        StatusError::gateway_timeout()
    })?
}

/// Like [`round_trip`] for requests whose reply carries an engine result.
pub(crate) async fn send_and_wait<T>(
    tx: &mpsc::Sender<InferenceRequest>,
    make_request: impl FnOnce(oneshot::Sender<eyre::Result<T>>) -> InferenceRequest,
    wait: Duration,
) -> Result<T, StatusError> {
    round_trip(tx, make_request, wait).await?.map_err(|e| {
        tracing::error!("Inference error: {:#}", e);
        StatusError::internal_server_error()
    })
}
