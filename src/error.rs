//! Error taxonomy shared by the transport client and the discount store.
//!
//! Every failure is surfaced as one fixed user-facing message. The store adds
//! an operation prefix for create/update/delete failures via [`ApiError::Operation`].

use thiserror::Error;

/// Store operation a failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    fn prefix(self) -> &'static str {
        match self {
            Self::Create => "Gagal menambahkan diskon",
            Self::Update => "Gagal memperbarui diskon",
            Self::Delete => "Gagal menghapus diskon",
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// Another record already uses this name (case-insensitive)
    #[error("Nama diskon sudah digunakan, silahkan gunakan nama lain.")]
    DuplicateName,

    #[error("Permintaan tidak valid. Periksa data yang dikirim.")]
    BadRequest,

    #[error("Token API tidak valid atau kedaluwarsa.")]
    Unauthorized,

    #[error("Endpoint tidak ditemukan.")]
    NotFound,

    #[error("Terlalu banyak permintaan. Silakan coba lagi nanti.")]
    RateLimited,

    #[error("Terjadi kesalahan di server.")]
    Server,

    #[error("Error {status}: {body}")]
    Http { status: u16, body: String },

    /// Request sent but no response arrived (connect failure or timeout)
    #[error("Tidak ada respons dari server. Periksa koneksi internet Anda.")]
    NoResponse,

    /// Successful status but a body that is not the JSON we expect
    #[error("Format respons dari server tidak valid: {0}")]
    InvalidResponse(String),

    #[error("Gagal membuat permintaan: {0}")]
    RequestSetup(String),

    #[error("Gagal mengakses penyimpanan konfigurasi: {0}")]
    Storage(String),

    #[error("{}: {source}", .op.prefix())]
    Operation {
        op: Operation,
        #[source]
        source: Box<ApiError>,
    },
}

impl ApiError {
    /// Maps a non-2xx status to its fixed message
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            404 => Self::NotFound,
            429 => Self::RateLimited,
            500 => Self::Server,
            _ => Self::Http {
                status,
                body: body.into(),
            },
        }
    }

    /// Connectivity or response-shape problems, the only failures `refresh`
    /// recovers from with the sample dataset.
    pub fn is_connectivity(&self) -> bool {
        match self {
            Self::NoResponse | Self::InvalidResponse(_) => true,
            Self::Operation { source, .. } => source.is_connectivity(),
            _ => false,
        }
    }

    pub(crate) fn during(self, op: Operation) -> Self {
        Self::Operation {
            op,
            source: Box::new(self),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            Self::NoResponse
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::RequestSetup(err.to_string())
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for ApiError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Storage(err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
