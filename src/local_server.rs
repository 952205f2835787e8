use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use futures_util::{pin_mut, Stream, StreamExt};
use log::{error, info, warn};
use warp::http::{header, Method, StatusCode};
use warp::hyper::body::{Buf, Bytes};
use warp::reply::{Reply, Response};
use warp::{Filter, Rejection};

use crate::config::Config;
use crate::error::{GenerateError, StartupError};
use crate::gemini::ImageEditor;
use crate::wire::{GenerateParams, RemovalResult};

pub const MISSING_PARAMETERS: &str = "Missing required parameters";
pub const BODY_TOO_LARGE: &str = "Request body too large";

pub async fn start_server(
    config: &Config,
    editor: Arc<dyn ImageEditor>,
) -> Result<(), StartupError> {
    let (addr, server) = bind_server(config, editor)?;
    info!("Starting server at http://{}", addr);
    server.await;
    Ok(())
}

/// Binds the listener up front so a taken port is reported instead of panicking.
pub fn bind_server(
    config: &Config,
    editor: Arc<dyn ImageEditor>,
) -> Result<(SocketAddr, impl Future<Output = ()> + 'static), StartupError> {
    let routes = routes(editor, &config.static_dir, config.body_limit_bytes);
    warp::serve(routes)
        .try_bind_ephemeral(config.bind_addr)
        .map_err(|source| StartupError::Bind {
            addr: config.bind_addr,
            source,
        })
}

/// Every route the server answers, API first.
pub fn routes(
    editor: Arc<dyn ImageEditor>,
    static_dir: &Path,
    body_limit_bytes: u64,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let health_route = warp::path("health")
        .and(warp::path::end())
        .map(|| "Server is running");

    let index = warp::path::end().and(warp::fs::file(static_dir.join("index.html")));
    let static_files = warp::fs::dir(static_dir.to_path_buf());

    generate_route(editor, body_limit_bytes)
        .or(index)
        .or(health_route)
        .or(static_files)
}

/// `/api/generate`: POST relays to the editor, any other method gets 405.
pub fn generate_route(
    editor: Arc<dyn ImageEditor>,
    body_limit_bytes: u64,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let path = warp::path!("api" / "generate");

    let post = path
        .clone()
        .and(warp::post())
        .and(limited_body(body_limit_bytes))
        .and(with_editor(editor))
        .and_then(handle_generate);

    let other_methods = path.and(warp::method()).and_then(|method: Method| async move {
        if method == Method::POST {
            // Lets the POST branch's rejection (413) win.
            return Err(warp::reject::not_found());
        }
        Ok::<_, Rejection>(method_not_allowed(&method))
    });

    post.or(other_methods).unify().recover(handle_rejection).unify()
}

#[derive(Debug)]
struct BodyTooLarge;

impl warp::reject::Reject for BodyTooLarge {}

#[derive(Debug)]
struct BodyReadFailed(warp::Error);

impl warp::reject::Reject for BodyReadFailed {}

/// Collects the request body, chunked or not, refusing it once it passes `limit` bytes.
fn limited_body(limit: u64) -> impl Filter<Extract = (Bytes,), Error = Rejection> + Clone {
    warp::header::optional::<u64>("content-length")
        .and(warp::body::stream())
        .and_then(move |declared: Option<u64>, body| async move {
            if declared.is_some_and(|length| length > limit) {
                return Err(warp::reject::custom(BodyTooLarge));
            }
            collect_limited(body, limit).await
        })
}

async fn collect_limited<S, B>(body: S, limit: u64) -> Result<Bytes, Rejection>
where
    S: Stream<Item = Result<B, warp::Error>>,
    B: Buf,
{
    pin_mut!(body);
    let mut collected = Vec::new();
    while let Some(chunk) = body.next().await {
        let mut chunk = chunk.map_err(|err| warp::reject::custom(BodyReadFailed(err)))?;
        if (collected.len() + chunk.remaining()) as u64 > limit {
            return Err(warp::reject::custom(BodyTooLarge));
        }
        let bytes = chunk.copy_to_bytes(chunk.remaining());
        collected.extend_from_slice(&bytes);
    }
    Ok(Bytes::from(collected))
}

fn with_editor(
    editor: Arc<dyn ImageEditor>,
) -> impl Filter<Extract = (Arc<dyn ImageEditor>,), Error = Infallible> + Clone {
    warp::any().map(move || editor.clone())
}

async fn handle_generate(
    body: Bytes,
    editor: Arc<dyn ImageEditor>,
) -> Result<Response, Infallible> {
    let params: GenerateParams = serde_json::from_slice(&body).unwrap_or_default();

    let Some(params) = params.complete() else {
        return Ok(json_reply(
            &RemovalResult::failure(MISSING_PARAMETERS),
            StatusCode::BAD_REQUEST,
        ));
    };

    let outcome = editor
        .generate(params.base64_image_data, params.mime_type, params.user_prompt)
        .await;

    let reply = match outcome {
        Ok(result) => json_reply(&result, StatusCode::OK),
        Err(GenerateError::EmptyResponse) => {
            error!("Generation API returned an empty response");
            json_reply(
                &RemovalResult::failure(GenerateError::EmptyResponse.to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
        }
        Err(GenerateError::Transport(message)) => {
            error!("Error calling generation API: {}", message);
            json_reply(
                &RemovalResult::failure(format!("Failed to process image: {message}")),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
        }
    };
    Ok(reply)
}

fn method_not_allowed(method: &Method) -> Response {
    let reply = json_reply(
        &RemovalResult::failure(format!("Method {} Not Allowed", method)),
        StatusCode::METHOD_NOT_ALLOWED,
    );
    warp::reply::with_header(reply, header::ALLOW, "POST").into_response()
}

/// Body rejections become JSON; anything else is passed on to the next route.
async fn handle_rejection(err: Rejection) -> Result<Response, Rejection> {
    if err.find::<BodyTooLarge>().is_some() {
        return Ok(json_reply(
            &RemovalResult::failure(BODY_TOO_LARGE),
            StatusCode::PAYLOAD_TOO_LARGE,
        ));
    }
    if let Some(BodyReadFailed(cause)) = err.find::<BodyReadFailed>() {
        warn!("Failed to read request body: {}", cause);
        return Ok(json_reply(
            &RemovalResult::failure("Failed to read request body"),
            StatusCode::BAD_REQUEST,
        ));
    }
    Err(err)
}

fn json_reply(result: &RemovalResult, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(result), status).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Unreachable;

    #[async_trait]
    impl ImageEditor for Unreachable {
        async fn generate(
            &self,
            _image: &str,
            _mime: &str,
            _prompt: &str,
        ) -> Result<RemovalResult, GenerateError> {
            panic!("editor must not be called");
        }
    }

    #[tokio::test]
    async fn test_invalid_json_counts_as_missing() {
        let filter = generate_route(Arc::new(Unreachable), 1024);
        let res = warp::test::request()
            .method("POST")
            .path("/api/generate")
            .body("not json")
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: RemovalResult = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body, RemovalResult::failure(MISSING_PARAMETERS));
    }

    #[tokio::test]
    async fn test_oversized_body() {
        let filter = generate_route(Arc::new(Unreachable), 8);
        let res = warp::test::request()
            .method("POST")
            .path("/api/generate")
            .body(r#"{"base64ImageData":"aGk="}"#)
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body: RemovalResult = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body, RemovalResult::failure(BODY_TOO_LARGE));
    }

    #[tokio::test]
    async fn test_collect_limited_counts_every_chunk() {
        fn chunks() -> impl Stream<Item = Result<Bytes, warp::Error>> {
            futures_util::stream::iter(vec![
                Ok(Bytes::from_static(b"12345")),
                Ok(Bytes::from_static(b"678")),
            ])
        }

        let body = collect_limited(chunks(), 8).await.unwrap();
        assert_eq!(body.as_ref(), b"12345678");

        let rejection = collect_limited(chunks(), 7).await.unwrap_err();
        assert!(rejection.find::<BodyTooLarge>().is_some());
    }

    #[tokio::test]
    async fn test_taken_port_is_a_startup_error() {
        let config = Config::from_lookup(|key| match key {
            "API_KEY" => Some("k".to_string()),
            "CLEANSE_BIND" => Some("127.0.0.1:0".to_string()),
            _ => None,
        })
        .unwrap();
        let (addr, server) = bind_server(&config, Arc::new(Unreachable)).unwrap();
        tokio::spawn(server);

        let taken = Config {
            bind_addr: addr,
            ..config
        };
        let err = start_server(&taken, Arc::new(Unreachable)).await.unwrap_err();
        assert!(matches!(err, StartupError::Bind { addr: failed, .. } if failed == addr));
    }

    #[tokio::test]
    async fn test_other_paths_fall_through() {
        let filter = generate_route(Arc::new(Unreachable), 1024);
        let res = warp::test::request()
            .method("GET")
            .path("/api/other")
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
