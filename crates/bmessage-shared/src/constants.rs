/// Application name
pub const APP_NAME: &str = "BMessage";

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 3000;

/// Maximum size of a single uploaded file (50 MiB)
pub const MAX_UPLOAD_SIZE: usize = 50 * 1024 * 1024;

/// Text left behind when a file-bearing message is deleted
pub const DELETED_FILE_PLACEHOLDER: &str = "[File deleted]";

/// Width of the base36 timestamp prefix of an invite link
pub const INVITE_PREFIX_LEN: usize = 9;

/// Random bytes appended to an invite link (12 base64url chars)
pub const INVITE_RANDOM_BYTES: usize = 9;

/// URL prefix under which uploaded files are addressed
pub const UPLOADS_URL_PREFIX: &str = "/uploads";
