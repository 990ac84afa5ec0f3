// Google Drive client - OAuth bearer tokens over plain HTTP requests.
// Covers only the surface the sync engine needs: list queries, folder
// creation, and multipart file upload/update.

use crate::auth::DriveAuth;
use crate::error::{Result, SyncError};
use mime_guess::from_path;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Drive file reference as consumed by the sync engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    /// Lowercase hex MD5 of the stored content. Absent for folders and
    /// Google-native document types.
    pub md5_checksum: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DriveFileResponse {
    id: String,
    name: String,
    #[serde(rename = "md5Checksum")]
    md5_checksum: Option<String>,
}

impl From<DriveFileResponse> for DriveFile {
    fn from(response: DriveFileResponse) -> Self {
        Self {
            id: response.id,
            name: response.name,
            md5_checksum: response.md5_checksum,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DriveFileListResponse {
    files: Option<Vec<DriveFileResponse>>,
}

/// Thin Drive v3 client over an authorized credential handle.
#[derive(Debug)]
pub struct DriveClient {
    auth: DriveAuth,
    http: reqwest::Client,
    api_base: String,
    upload_base: String,
}

impl DriveClient {
    pub fn new(auth: DriveAuth) -> Self {
        Self {
            auth,
            http: reqwest::Client::new(),
            api_base: DRIVE_API_BASE.to_string(),
            upload_base: DRIVE_UPLOAD_BASE.to_string(),
        }
    }

    /// Point the client at alternate endpoints (local test servers).
    pub fn with_base_urls(
        mut self,
        api_base: impl Into<String>,
        upload_base: impl Into<String>,
    ) -> Self {
        self.api_base = api_base.into();
        self.upload_base = upload_base.into();
        self
    }

    async fn access_token(&mut self) -> Result<String> {
        self.auth.access_token().await
    }

    /// Look up a folder by name at the root of the Drive hierarchy.
    pub async fn find_folder(&mut self, name: &str) -> Result<Option<String>> {
        debug!("Searching for folder: {}", name);

        let query = format!(
            "name='{name}' and mimeType='{FOLDER_MIME_TYPE}' and 'root' in parents and trashed=false"
        );

        let access_token = self.access_token().await?;
        let response = self
            .http
            .get(format!("{}/files", self.api_base))
            .header("Authorization", format!("Bearer {access_token}"))
            .query(&[("q", query.as_str()), ("fields", "files(id,name)")])
            .send()
            .await?;

        let list: DriveFileListResponse = Self::parse("folder search", response).await?;

        // First match wins; duplicate folder names are not reconciled.
        Ok(list
            .files
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|f| f.id))
    }

    /// Create a folder at the root of the Drive hierarchy.
    pub async fn create_folder(&mut self, name: &str) -> Result<String> {
        info!("Creating folder: {}", name);

        let metadata = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE
        });

        let access_token = self.access_token().await?;
        let response = self
            .http
            .post(format!("{}/files", self.api_base))
            .header("Authorization", format!("Bearer {access_token}"))
            .query(&[("fields", "id,name")])
            .json(&metadata)
            .send()
            .await?;

        let file: DriveFileResponse = Self::parse("folder creation", response).await?;
        Ok(file.id)
    }

    /// Look up a file by name under the given parent, requesting its
    /// stored content hash.
    pub async fn find_file(&mut self, name: &str, parent_id: &str) -> Result<Option<DriveFile>> {
        debug!("Searching for file {} under {}", name, parent_id);

        let query = format!("name='{name}' and '{parent_id}' in parents and trashed=false");

        let access_token = self.access_token().await?;
        let response = self
            .http
            .get(format!("{}/files", self.api_base))
            .header("Authorization", format!("Bearer {access_token}"))
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id,name,md5Checksum)"),
            ])
            .send()
            .await?;

        let list: DriveFileListResponse = Self::parse("file search", response).await?;

        // First match wins; duplicate names are not reconciled.
        Ok(list
            .files
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(DriveFile::from))
    }

    /// Upload a new file under the given parent.
    pub async fn create_file(
        &mut self,
        name: &str,
        parent_id: &str,
        content: Vec<u8>,
    ) -> Result<DriveFile> {
        info!("Uploading new file: {}", name);

        let metadata = serde_json::json!({
            "name": name,
            "parents": [parent_id]
        });
        let form = multipart_form(name, metadata, content)?;

        let access_token = self.access_token().await?;
        let response = self
            .http
            .post(format!("{}/files", self.upload_base))
            .header("Authorization", format!("Bearer {access_token}"))
            .query(&[
                ("uploadType", "multipart"),
                ("fields", "id,name,md5Checksum"),
            ])
            .multipart(form)
            .send()
            .await?;

        let file: DriveFileResponse = Self::parse("file upload", response).await?;
        Ok(file.into())
    }

    /// Replace an existing file's content in place; the name is unchanged.
    pub async fn update_file(
        &mut self,
        file_id: &str,
        name: &str,
        content: Vec<u8>,
    ) -> Result<DriveFile> {
        info!("Updating file: {} (ID: {})", name, file_id);

        let metadata = serde_json::json!({ "name": name });
        let form = multipart_form(name, metadata, content)?;

        let access_token = self.access_token().await?;
        let response = self
            .http
            .patch(format!("{}/files/{}", self.upload_base, file_id))
            .header("Authorization", format!("Bearer {access_token}"))
            .query(&[
                ("uploadType", "multipart"),
                ("fields", "id,name,md5Checksum"),
            ])
            .multipart(form)
            .send()
            .await?;

        let file: DriveFileResponse = Self::parse("file update", response).await?;
        Ok(file.into())
    }

    async fn parse<T: DeserializeOwned>(operation: &str, response: reqwest::Response) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SyncError::remote(format!(
                "Drive {operation} failed ({status}): {error_text}"
            )));
        }
        Ok(response.json().await?)
    }
}

fn multipart_form(name: &str, metadata: serde_json::Value, content: Vec<u8>) -> Result<Form> {
    let mime_type = from_path(name).first_or_octet_stream().to_string();

    let metadata_part = Part::text(metadata.to_string())
        .file_name("metadata")
        .mime_str("application/json")?;

    let file_part = Part::bytes(content)
        .file_name(name.to_string())
        .mime_str(&mime_type)?;

    Ok(Form::new()
        .part("metadata", metadata_part)
        .part("file", file_part))
}
