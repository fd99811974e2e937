use log::info;
use mongodb::bson::oid::ObjectId;
use rand::Rng;
use rocket::data::Capped;
use rocket::fs::TempFile;
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

use crate::errors::{AppError, Result};
use crate::models::Documents;

pub const MAX_FILE_BYTES: u64 = 5 * 1024 * 1024;
pub const MAX_FILES: usize = 3;
const MAX_BASE_LEN: usize = 50;
const WEB_ROOT_SEGMENT: &str = "uploads";

pub const ID_DOCUMENT_FIELD: &str = "identificationDocument";
pub const PASSPORT_PHOTO_FIELD: &str = "passportPhoto";
pub const UTILITY_BILL_FIELD: &str = "utilityBill";

/// Accepted document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Jpeg,
    Png,
    Pdf,
}

impl DocumentKind {
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" => Some(DocumentKind::Jpeg),
            "image/png" => Some(DocumentKind::Png),
            "application/pdf" => Some(DocumentKind::Pdf),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DocumentKind::Jpeg => "jpg",
            DocumentKind::Png => "png",
            DocumentKind::Pdf => "pdf",
        }
    }

    /// Whether a client-supplied extension names this kind.
    pub fn accepts_extension(&self, ext: &str) -> bool {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => *self == DocumentKind::Jpeg,
            "png" => *self == DocumentKind::Png,
            "pdf" => *self == DocumentKind::Pdf,
            _ => false,
        }
    }
}

/// An incoming file as the pipeline sees it.
#[rocket::async_trait]
pub trait DocumentSource: Send {
    /// Client-supplied file name, unsanitized.
    fn original_name(&self) -> Option<&str>;

    /// Declared content type as `type/subtype`.
    fn content_type(&self) -> Option<String>;

    fn size(&self) -> u64;

    /// False when the body was cut off at the transport's size limit.
    fn is_complete(&self) -> bool {
        true
    }

    async fn persist_to(&mut self, path: &Path) -> io::Result<()>;
}

#[rocket::async_trait]
impl<'v> DocumentSource for TempFile<'v> {
    fn original_name(&self) -> Option<&str> {
        self.raw_name()
            .map(|name| name.dangerous_unsafe_unsanitized_raw().as_str())
    }

    fn content_type(&self) -> Option<String> {
        TempFile::content_type(self).map(|ct| format!("{}/{}", ct.top(), ct.sub()))
    }

    fn size(&self) -> u64 {
        self.len()
    }

    async fn persist_to(&mut self, path: &Path) -> io::Result<()> {
        self.move_copy_to(path).await
    }
}

#[rocket::async_trait]
impl<'v> DocumentSource for Capped<TempFile<'v>> {
    fn original_name(&self) -> Option<&str> {
        self.value.original_name()
    }

    fn content_type(&self) -> Option<String> {
        DocumentSource::content_type(&self.value)
    }

    fn size(&self) -> u64 {
        self.value.len()
    }

    fn is_complete(&self) -> bool {
        Capped::is_complete(self)
    }

    async fn persist_to(&mut self, path: &Path) -> io::Result<()> {
        self.value.move_copy_to(path).await
    }
}

/// The three files a verification needs, one per slot.
pub struct DocumentSet<D> {
    pub identification_document: D,
    pub passport_photo: D,
    pub utility_bill: D,
}

impl<D> DocumentSet<D> {
    /// Builds the set from the files received in each multipart slot.
    pub fn from_slots(
        identification_document: Vec<D>,
        passport_photo: Vec<D>,
        utility_bill: Vec<D>,
    ) -> Result<Self> {
        let total = identification_document.len() + passport_photo.len() + utility_bill.len();
        if total > MAX_FILES {
            return Err(AppError::TooManyFiles);
        }

        let single = |mut files: Vec<D>| -> Result<D> {
            match files.len() {
                0 => Err(AppError::MissingDocuments),
                1 => files.pop().ok_or(AppError::MissingDocuments),
                _ => Err(AppError::TooManyFiles),
            }
        };

        Ok(DocumentSet {
            identification_document: single(identification_document)?,
            passport_photo: single(passport_photo)?,
            utility_bill: single(utility_bill)?,
        })
    }

    /// Builds the set from every file part of a request, keyed by field name.
    /// Parts under other names still count towards the limit.
    pub fn from_fields(parts: Vec<(String, D)>) -> Result<Self> {
        if parts.len() > MAX_FILES {
            return Err(AppError::TooManyFiles);
        }

        let (mut id, mut photo, mut bill) = (Vec::new(), Vec::new(), Vec::new());
        for (field, file) in parts {
            match field.as_str() {
                ID_DOCUMENT_FIELD => id.push(file),
                PASSPORT_PHOTO_FIELD => photo.push(file),
                UTILITY_BILL_FIELD => bill.push(file),
                _ => {}
            }
        }

        Self::from_slots(id, photo, bill)
    }
}

/// Replaces anything outside `[A-Za-z0-9_-]` with `_` and caps the length.
pub fn sanitize_base_name(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(MAX_BASE_LEN)
        .collect()
}

/// Splits a client file name into a safe base and extension. Directory parts are dropped.
fn split_original_name(original: &str) -> (String, Option<String>) {
    let file_name = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original);
    let path = Path::new(file_name);

    let base = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(sanitize_base_name)
        .unwrap_or_default();

    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            ext.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .take(10)
                .collect::<String>()
        })
        .filter(|ext| !ext.is_empty());

    (base, extension)
}

/// Projects a stored path onto the web: everything from the last `uploads`
/// directory onward, `/`-separated, with exactly one leading slash.
pub fn to_web_path(stored: &Path) -> String {
    let parts: Vec<String> = stored
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    // Only directories count as the marker, never the file name itself.
    let dirs = parts.len().saturating_sub(1);
    let start = parts[..dirs]
        .iter()
        .rposition(|p| p == WEB_ROOT_SEGMENT)
        .unwrap_or(0);

    format!("/{}", parts[start..].join("/"))
}

/// Validates, names and stores verification documents under a fixed root.
pub struct UploadPipeline {
    root: PathBuf,
    max_bytes: u64,
}

impl UploadPipeline {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        UploadPipeline {
            root: root.into(),
            max_bytes: MAX_FILE_BYTES,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    pub fn validate<D: DocumentSource>(&self, file: &D) -> Result<DocumentKind> {
        let kind = file
            .content_type()
            .as_deref()
            .and_then(DocumentKind::from_mime)
            .ok_or(AppError::InvalidFileType)?;

        if !file.is_complete() || file.size() > self.max_bytes {
            return Err(AppError::FileTooLarge);
        }

        Ok(kind)
    }

    pub fn validate_set<D: DocumentSource>(&self, set: &DocumentSet<D>) -> Result<()> {
        self.validate(&set.identification_document)?;
        self.validate(&set.passport_photo)?;
        self.validate(&set.utility_bill)?;
        Ok(())
    }

    /// `<owner>_<base>_<millis>-<random>.<ext>`; the owner prefix is omitted when unknown.
    pub fn unique_filename(&self, original: Option<&str>, fallback: &str, kind: DocumentKind, owner: Option<&ObjectId>) -> String {
        let (base, extension) = original
            .map(split_original_name)
            .unwrap_or_else(|| (String::new(), None));
        let base = if base.is_empty() { fallback.to_string() } else { base };
        let extension = extension
            .filter(|ext| kind.accepts_extension(ext))
            .unwrap_or_else(|| kind.extension().to_string());

        let unique = format!(
            "{}-{}",
            chrono::Utc::now().timestamp_millis(),
            rand::thread_rng().gen_range(0..1_000_000_000u32)
        );
        let prefix = owner.map(|id| format!("{}_", id.to_hex())).unwrap_or_default();

        format!("{}{}_{}.{}", prefix, base, unique, extension)
    }

    /// Writes one validated file and returns its web path.
    pub async fn store<D: DocumentSource>(&self, mut file: D, slot: &str, owner: Option<&ObjectId>) -> Result<String> {
        let kind = self.validate(&file)?;
        self.ensure_root().await?;

        let filename = self.unique_filename(file.original_name(), slot, kind, owner);
        let path = self.root.join(&filename);

        file.persist_to(&path).await?;
        info!("Stored {} ({} bytes) at {}", slot, file.size(), path.display());

        Ok(to_web_path(&path))
    }

    /// Validates all three files first, then writes them concurrently.
    pub async fn store_set<D: DocumentSource>(&self, set: DocumentSet<D>, owner: Option<&ObjectId>) -> Result<Documents> {
        self.validate_set(&set)?;

        let (id_document, passport_photo, utility_bill) = tokio::try_join!(
            self.store(set.identification_document, ID_DOCUMENT_FIELD, owner),
            self.store(set.passport_photo, PASSPORT_PHOTO_FIELD, owner),
            self.store(set.utility_bill, UTILITY_BILL_FIELD, owner),
        )?;

        Ok(Documents {
            id_document: Some(id_document),
            passport_photo: Some(passport_photo),
            utility_bill: Some(utility_bill),
        })
    }
}
