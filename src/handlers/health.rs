use salvo::prelude::*;

use crate::inference::{InferenceRequest, ModelStatus};

use super::helpers::{get_state, round_trip};

/// GET /health - Health check
#[handler]
pub async fn health(res: &mut Response) {
    res.render(Json(serde_json::json!({
        "status": "healthy",
        "service": "video-vlm-api"
    })));
}

/// GET /v1/models/status - Get current model status
#[handler]
pub async fn model_status(depot: &mut Depot, res: &mut Response) -> Result<(), StatusError> {
    let state = get_state(depot)?;

    let status: ModelStatus = round_trip(
        &state.inference_tx,
        |response_tx| InferenceRequest::GetModelStatus { response_tx },
        state.inference_timeout,
    )
    .await?;

    res.render(Json(serde_json::json!({
        "status": "success",
        "worker_url": state.worker_url,
        "models": status
    })));
    Ok(())
}
