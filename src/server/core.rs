// server/core.rs

use std::{
    io,
    path::PathBuf,
    sync::Arc,
};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{
        get,
        post,
    },
};
use thiserror::Error;
use tower_http::{
    limit::RequestBodyLimitLayer,
    services::ServeDir,
};
use tracing::info;

use super::endpoints::*;
use crate::{
    config::Config,
    storage::{
        Storage,
        StorageError,
    },
};

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("Failed to prepare storage: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to bind {0}: {1}")]
    Bind(String, #[source] io::Error),

    #[error("Server error: {0}")]
    Io(#[from] io::Error),
}

/// Everything the handlers need, handed in at startup
#[derive(Debug)]
pub struct AppState {
    pub storage:         Storage,
    pub public_dir:      PathBuf,
    pub video_extension: String,
    pub max_upload_size: Option<u64>,
}

impl AppState {
    /// # Build the state from config
    ///
    /// Creates the storage directory if it doesn't exist yet.
    pub async fn from_config(config: &Config) -> Result<Self, StorageError> {
        Ok(Self {
            storage:         Storage::open(&config.upload_dir).await?,
            public_dir:      config.public_dir.clone(),
            video_extension: config.video_extension.clone(),
            max_upload_size: config.max_upload_size,
        })
    }
}

pub fn router(state: AppState) -> Router {
    // Uploads are unlimited unless configured otherwise
    let mut upload_route = post(upload).layer(DefaultBodyLimit::disable());
    if let Some(limit) = state.max_upload_size {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        upload_route = upload_route.layer(RequestBodyLimitLayer::new(limit));
    }

    // Static files: content types, ranges and traversal checks are left to ServeDir
    let stored = ServeDir::new(state.storage.dir());
    let assets = ServeDir::new(&state.public_dir);

    Router::new()
        .route("/upload", upload_route)
        .route("/videos", get(videos))
        .nest_service("/uploads", stored)
        .fallback_service(assets)
        .with_state(Arc::new(state))
}

pub async fn serve(config: &Config) -> Result<(), ServeError> {
    let state = AppState::from_config(config).await?;
    info!(
        "Storing uploads in {:?}, serving assets from {:?}",
        state.storage.dir(),
        state.public_dir
    );

    let addr = &config.server_address;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServeError::Bind(addr.clone(), e))?;

    info!("Server running on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            | Ok(mut sig) => {
                sig.recv().await;
            },
            | Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod test {
    use std::{
        fs,
        path::Path,
        time::Duration,
    };

    use axum::{
        body::{
            Body,
            to_bytes,
        },
        http::{
            Request,
            StatusCode,
            header,
        },
        response::Response,
    };
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;

    const BOUNDARY: &str = "reelbox-test-boundary";

    struct Part<'a> {
        name:     &'a str,
        filename: Option<&'a str>,
        data:     &'a [u8],
    }

    fn video<'a>(filename: &'a str, data: &'a [u8]) -> Part<'a> {
        Part { name: "video", filename: Some(filename), data }
    }

    fn upload_request(parts: &[Part]) -> Request<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part.filename {
                | Some(f) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{f}\"\r\nContent-Type: video/mp4\r\n\r\n",
                        part.name
                    )
                    .as_bytes(),
                ),
                | None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name).as_bytes(),
                ),
            }
            body.extend_from_slice(part.data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::post("/upload")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> { Request::get(uri).body(Body::empty()).unwrap() }

    async fn text(resp: Response) -> String {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn stored_files(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect()
    }

    struct TestApp {
        tmp:    TempDir,
        router: Router,
    }

    impl TestApp {
        async fn new() -> Self { Self::with_config(|_| {}).await }

        async fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let mut config = Config {
                upload_dir: tmp.path().join("uploads"),
                public_dir: tmp.path().join("public"),
                ..Config::default()
            };
            tweak(&mut config);

            let state = AppState::from_config(&config).await.unwrap();
            Self { tmp, router: router(state) }
        }

        fn uploads(&self) -> std::path::PathBuf { self.tmp.path().join("uploads") }

        async fn send(&self, req: Request<Body>) -> Response {
            self.router.clone().oneshot(req).await.unwrap()
        }

        /// Uploads a file and returns the generated name
        async fn upload(&self, filename: &str, data: &[u8]) -> String {
            let resp = self.send(upload_request(&[video(filename, data)])).await;
            assert_eq!(resp.status(), StatusCode::OK);
            text(resp)
                .await
                .strip_prefix("File uploaded successfully: ")
                .unwrap()
                .to_owned()
        }
    }

    #[tokio::test]
    async fn startup_creates_upload_dir() {
        let app = TestApp::new().await;
        assert!(app.uploads().is_dir());
    }

    #[tokio::test]
    async fn upload_stores_exact_bytes() {
        let app = TestApp::new().await;

        let name = app.upload("clip.mp4", b"not really a video").await;

        assert!(name.ends_with("-clip.mp4"));
        assert_eq!(stored_files(&app.uploads()), vec![name.clone()]);
        assert_eq!(fs::read(app.uploads().join(&name)).unwrap(), b"not really a video");
    }

    #[tokio::test]
    async fn upload_without_video_field_is_rejected() {
        let app = TestApp::new().await;

        let req = upload_request(&[Part { name: "other", filename: Some("clip.mp4"), data: b"x" }]);
        let resp = app.send(req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(text(resp).await, "No file uploaded.");
        assert!(stored_files(&app.uploads()).is_empty());
    }

    #[tokio::test]
    /// A `video` field sent as a plain form value carries no file
    async fn upload_of_plain_field_is_rejected() {
        let app = TestApp::new().await;

        let req = upload_request(&[Part { name: "video", filename: None, data: b"x" }]);
        let resp = app.send(req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(text(resp).await, "No file uploaded.");
        assert!(stored_files(&app.uploads()).is_empty());
    }

    #[tokio::test]
    async fn upload_skips_other_fields() {
        let app = TestApp::new().await;

        let req = upload_request(&[
            Part { name: "title", filename: None, data: b"Morning commute" },
            video("commute.mp4", b"frames"),
        ]);
        let resp = app.send(req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let files = stored_files(&app.uploads());
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("-commute.mp4"));
    }

    #[tokio::test]
    /// Only the first `video` file is kept when a form sends several
    async fn upload_keeps_first_video() {
        let app = TestApp::new().await;

        let req = upload_request(&[video("front.mp4", b"first"), video("rear.mp4", b"second")]);
        let resp = app.send(req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let files = stored_files(&app.uploads());
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("-front.mp4"));
        assert_eq!(fs::read(app.uploads().join(&files[0])).unwrap(), b"first");
    }

    #[tokio::test]
    /// The body stops partway through the video part, with no closing boundary
    async fn truncated_upload_is_rejected() {
        let app = TestApp::new().await;

        let body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"video\"; filename=\"clip.mp4\"\r\n\r\npartial"
        );
        let req = Request::post("/upload")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap();
        let resp = app.send(req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(stored_files(&app.uploads()).is_empty());
    }

    #[tokio::test]
    async fn upload_without_boundary_is_rejected() {
        let app = TestApp::new().await;

        let req = Request::post("/upload")
            .header(header::CONTENT_TYPE, "multipart/form-data")
            .body(Body::from("video=clip.mp4"))
            .unwrap();
        let resp = app.send(req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(stored_files(&app.uploads()).is_empty());
    }

    #[tokio::test]
    async fn same_name_uploads_get_distinct_files() {
        let app = TestApp::new().await;

        let first = app.upload("clip.mp4", b"one").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = app.upload("clip.mp4", b"two").await;

        assert_ne!(first, second);
        assert_eq!(stored_files(&app.uploads()).len(), 2);
    }

    #[tokio::test]
    async fn empty_gallery() {
        let app = TestApp::new().await;

        let resp = app.send(get("/videos")).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(
            resp.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/html")
        );
        assert!(text(resp).await.contains("No videos uploaded yet."));
    }

    #[tokio::test]
    async fn gallery_lists_uploads() {
        let app = TestApp::new().await;
        let name = app.upload("clip.mp4", b"data").await;
        fs::write(app.uploads().join("notes.txt"), b"ignored").unwrap();

        let html = text(app.send(get("/videos")).await).await;

        assert!(html.contains(&format!(r#"src="/uploads/{name}""#)));
        assert!(html.contains(&format!(r#"<div class="filename">{name}</div>"#)));
        assert!(html.contains("clip.mp4"));
        assert!(!html.contains("notes.txt"));
        assert!(!html.contains("No videos uploaded yet."));
    }

    #[tokio::test]
    async fn gallery_fails_when_storage_vanishes() {
        let app = TestApp::new().await;
        fs::remove_dir(app.uploads()).unwrap();

        let resp = app.send(get("/videos")).await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(text(resp).await, "Unable to list videos");
    }

    #[tokio::test]
    async fn uploaded_files_are_served() {
        let app = TestApp::new().await;
        let name = app.upload("clip.mp4", b"0123456789").await;

        let resp = app.send(get(&format!("/uploads/{name}"))).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "video/mp4");
        assert_eq!(text(resp).await, "0123456789");
    }

    #[tokio::test]
    async fn ranges_are_served() {
        let app = TestApp::new().await;
        let name = app.upload("clip.mp4", b"0123456789").await;

        let req = Request::get(format!("/uploads/{name}"))
            .header(header::RANGE, "bytes=2-5")
            .body(Body::empty())
            .unwrap();
        let resp = app.send(req).await;

        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(resp.headers()[header::CONTENT_RANGE], "bytes 2-5/10");
        assert_eq!(text(resp).await, "2345");
    }

    #[tokio::test]
    async fn missing_upload_is_not_found() {
        let app = TestApp::new().await;
        let resp = app.send(get("/uploads/1700000000000-nope.mp4")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn traversal_is_not_found() {
        let app = TestApp::new().await;
        fs::write(app.tmp.path().join("secret.txt"), b"secret").unwrap();

        let resp = app.send(get("/uploads/..%2Fsecret.txt")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = app.send(get("/%2E%2E/secret.txt")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn public_assets_are_served() {
        let app = TestApp::new().await;
        let public = app.tmp.path().join("public");
        fs::create_dir_all(public.join("css")).unwrap();
        fs::write(public.join("index.html"), "<form>upload</form>").unwrap();
        fs::write(public.join("css/site.css"), "body {}").unwrap();

        let resp = app.send(get("/")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(text(resp).await, "<form>upload</form>");

        let resp = app.send(get("/css/site.css")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/css");

        let resp = app.send(get("/missing.js")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upload_limit_applies_when_configured() {
        let app = TestApp::with_config(|c| c.max_upload_size = Some(16)).await;

        let mut req = upload_request(&[video("clip.mp4", &[0u8; 1024])]);
        req.headers_mut()
            .insert(header::CONTENT_LENGTH, header::HeaderValue::from_static("1200"));
        let resp = app.send(req).await;

        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(stored_files(&app.uploads()).is_empty());
    }

    #[tokio::test]
    /// Uploads bigger than axum's default body limit must still go through
    async fn large_uploads_are_accepted_by_default() {
        let app = TestApp::new().await;
        let data = vec![7u8; 3 * 1024 * 1024];

        let name = app.upload("long-drive.mp4", &data).await;

        assert_eq!(fs::metadata(app.uploads().join(name)).unwrap().len(), data.len() as u64);
    }
}
