//! Drive v3 REST client.

use std::time::Duration;

use bytes::Bytes;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use drivefs_common::backend::{
    FieldSet, ListPage, ListQuery, ParentChange, RecordPatch, RemoteClient, RemoteError, GET_FIELDS,
    LIST_FIELDS,
};
use drivefs_common::records::RemoteRecord;

pub const DEFAULT_API_URL: &str = "https://www.googleapis.com/drive/v3";
pub const DEFAULT_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Clone)]
pub struct DriveClient {
    client: reqwest::Client,
    api_url: String,
    upload_url: String,
    access_token: String,
}

impl DriveClient {
    pub fn new(access_token: impl Into<String>) -> Result<Self, RemoteError> {
        Self::with_urls(access_token, DEFAULT_API_URL, DEFAULT_UPLOAD_URL)
    }

    /// Point the client at another endpoint (a proxy or a local emulator).
    pub fn with_urls(
        access_token: impl Into<String>,
        api_url: &str,
        upload_url: &str,
    ) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            upload_url: upload_url.trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        })
    }

    fn file_url(&self, id: &str) -> String {
        format!("{}/files/{}", self.api_url, urlencoding::encode(id))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.access_token)
            .query(&[("supportsAllDrives", "true")])
    }

    async fn send_json(&self, req: RequestBuilder, what: &str) -> Result<RemoteRecord, RemoteError> {
        let resp = check(req.send().await?, what).await?;
        let body = resp.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| RemoteError::Payload(format!("{}: {}", what, e)))
    }

    async fn send_bytes(&self, req: RequestBuilder, what: &str) -> Result<Bytes, RemoteError> {
        let resp = check(req.send().await?, what).await?;
        Ok(resp.bytes().await?)
    }

    /// Metadata-only requests go to the API endpoint as JSON; requests with
    /// media go to the upload endpoint as a multipart/related body.
    fn with_body(
        &self,
        method: Method,
        path: &str,
        metadata: &RecordPatch,
        media: Option<Bytes>,
    ) -> Result<RequestBuilder, RemoteError> {
        let req = match media {
            None => self
                .request(method, &format!("{}{}", self.api_url, path))
                .json(metadata),
            Some(data) => {
                let boundary = format!("drivefs-{}", uuid::Uuid::new_v4().simple());
                let media_type = metadata.mime_type.as_deref().unwrap_or(OCTET_STREAM);
                let body = multipart_related(metadata, &data, media_type, &boundary)?;
                self.request(method, &format!("{}{}", self.upload_url, path))
                    .query(&[("uploadType", "multipart")])
                    .header(
                        reqwest::header::CONTENT_TYPE,
                        format!("multipart/related; boundary={}", boundary),
                    )
                    .body(body)
            }
        };
        Ok(req.query(&[("fields", GET_FIELDS)]))
    }
}

async fn check(resp: Response, what: &str) -> Result<Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = api_message(&body);
    if status == StatusCode::NOT_FOUND {
        return Err(RemoteError::NotFound(format!("{}: {}", what, message)));
    }
    Err(RemoteError::Api {
        status: status.as_u16(),
        message,
    })
}

/// The `error.message` of a Drive error response, or the raw body.
fn api_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error)
        .and_then(|e| e.message)
        .unwrap_or_else(|| body.trim().to_string())
}

pub(crate) fn list_params(query: &ListQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("q", query.q.clone()),
        ("pageSize", query.page_size.to_string()),
        ("orderBy", query.order_by.clone()),
        ("spaces", "drive".to_string()),
        ("fields", LIST_FIELDS.to_string()),
    ];
    if let Some(drive_id) = &query.drive_id {
        params.push(("corpora", "drive".to_string()));
        params.push(("driveId", drive_id.clone()));
        params.push(("includeItemsFromAllDrives", "true".to_string()));
    }
    if let Some(token) = &query.page_token {
        params.push(("pageToken", token.clone()));
    }
    params
}

pub(crate) fn parent_params(parents: &ParentChange) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if !parents.add.is_empty() {
        params.push(("addParents", parents.add.join(",")));
    }
    if !parents.remove.is_empty() {
        params.push(("removeParents", parents.remove.join(",")));
    }
    params
}

pub(crate) fn multipart_related(
    metadata: &RecordPatch,
    media: &[u8],
    media_type: &str,
    boundary: &str,
) -> Result<Vec<u8>, RemoteError> {
    let json = serde_json::to_vec(metadata).map_err(|e| RemoteError::Payload(e.to_string()))?;
    let mut body = Vec::with_capacity(json.len() + media.len() + 256);
    body.extend_from_slice(
        format!("--{}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n", boundary).as_bytes(),
    );
    body.extend_from_slice(&json);
    body.extend_from_slice(format!("\r\n--{}\r\nContent-Type: {}\r\n\r\n", boundary, media_type).as_bytes());
    body.extend_from_slice(media);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    Ok(body)
}

#[async_trait::async_trait]
impl RemoteClient for DriveClient {
    async fn get(&self, id: &str, fields: FieldSet) -> Result<RemoteRecord, RemoteError> {
        debug!(id, fields = ?fields, "GET file");
        let req = self
            .request(Method::GET, &self.file_url(id))
            .query(&[("fields", fields.as_str())]);
        self.send_json(req, id).await
    }

    async fn list(&self, query: &ListQuery) -> Result<ListPage, RemoteError> {
        debug!(q = %query.q, page_token = ?query.page_token, "LIST files");
        let req = self
            .request(Method::GET, &format!("{}/files", self.api_url))
            .query(&list_params(query));
        let resp = check(req.send().await?, "list").await?;
        let body = resp.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| RemoteError::Payload(format!("list: {}", e)))
    }

    async fn create(&self, metadata: &RecordPatch, media: Option<Bytes>) -> Result<RemoteRecord, RemoteError> {
        debug!(name = ?metadata.name, with_media = media.is_some(), "CREATE file");
        let req = self.with_body(Method::POST, "/files", metadata, media)?;
        self.send_json(req, "create").await
    }

    async fn update(
        &self,
        id: &str,
        patch: &RecordPatch,
        parents: &ParentChange,
        media: Option<Bytes>,
    ) -> Result<RemoteRecord, RemoteError> {
        debug!(id, with_media = media.is_some(), "UPDATE file");
        let path = format!("/files/{}", urlencoding::encode(id));
        let req = self
            .with_body(Method::PATCH, &path, patch, media)?
            .query(&parent_params(parents));
        self.send_json(req, id).await
    }

    async fn copy(&self, id: &str, metadata: &RecordPatch) -> Result<RemoteRecord, RemoteError> {
        debug!(id, "COPY file");
        let path = format!("/files/{}/copy", urlencoding::encode(id));
        let req = self.with_body(Method::POST, &path, metadata, None)?;
        self.send_json(req, id).await
    }

    async fn export(&self, id: &str, mime_type: &str) -> Result<Bytes, RemoteError> {
        debug!(id, mime_type, "EXPORT file");
        let req = self
            .request(Method::GET, &format!("{}/export", self.file_url(id)))
            .query(&[("mimeType", mime_type)]);
        self.send_bytes(req, id).await
    }

    async fn download(&self, id: &str) -> Result<Bytes, RemoteError> {
        debug!(id, "DOWNLOAD file");
        let req = self
            .request(Method::GET, &self.file_url(id))
            .query(&[("alt", "media")]);
        self.send_bytes(req, id).await
    }
}
