use salvo::cors::*;
use salvo::prelude::*;
use salvo::size_limiter::max_size;

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = handlers::upload::body_limit(state.max_upload_bytes);

    Router::new()
        .hoop(affix_state::inject(state))
        .hoop(
            Cors::new()
                .allow_origin(AllowOrigin::any())
                .allow_methods(AllowMethods::any())
                .allow_headers(AllowHeaders::any())
                .into_handler(),
        )
        // Health & model status
        .push(Router::with_path("health").get(handlers::health::health))
        .push(Router::with_path("v1/models/status").get(handlers::health::model_status))
        // Video upload + inference
        // Capped before multipart parsing spools the body to disk
        .push(
            Router::with_path("upload")
                .hoop(max_size(upload_limit))
                .post(handlers::upload::upload_video),
        )
}

#[cfg(test)]
mod tests {
    use salvo::test::{ResponseExt, TestClient};
    use tokio::sync::{mpsc, oneshot};

    use super::*;
    use crate::config::Config;
    use crate::engines::scripted::ScriptedBackend;

    #[tokio::test]
    async fn test_health_and_status_routes() {
        let (tx, rx) = mpsc::channel(4);
        let (ready_tx, ready_rx) = oneshot::channel();
        std::thread::spawn(move || {
            crate::inference::inference_thread(|| Ok(ScriptedBackend::new("ok")), rx, ready_tx);
        });
        ready_rx.await.unwrap().unwrap();
        let service = Service::new(build_router(AppState::new(&Config::from_env(), tx)));

        let mut res = TestClient::get("http://127.0.0.1:8000/health").send(&service).await;
        let json: serde_json::Value = res.take_json().await.unwrap();
        assert_eq!(json["status"], "healthy");

        let mut res = TestClient::get("http://127.0.0.1:8000/v1/models/status")
            .send(&service)
            .await;
        let json: serde_json::Value = res.take_json().await.unwrap();
        assert_eq!(json["models"]["vlm"], "scripted");
        assert_eq!(json["models"]["requests_served"], 0);
    }

    #[tokio::test]
    async fn test_upload_requires_post() {
        let (tx, _rx) = mpsc::channel(1);
        let service = Service::new(build_router(AppState::new(&Config::from_env(), tx)));
        let res = TestClient::get("http://127.0.0.1:8000/upload/").send(&service).await;
        assert_ne!(res.status_code, Some(StatusCode::OK));
    }
}
