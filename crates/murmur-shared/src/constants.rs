/// Application name
pub const APP_NAME: &str = "murmur";

/// Characters of message text copied into a notification preview
pub const PREVIEW_CHARS: usize = 50;

/// Preview used when a message carries only an image
pub const IMAGE_ONLY_PREVIEW: &str = "Sent an image";

/// Maximum length of a message body in characters
pub const MAX_MESSAGE_CHARS: usize = 10_000;

/// Maximum length of a group or user display name in characters
pub const MAX_NAME_CHARS: usize = 64;

/// A declined sender must wait this long before requesting again (3 days)
pub const FRIEND_REQUEST_COOLDOWN_HOURS: i64 = 72;

/// Page size of the notification feed
pub const NOTIFICATION_PAGE_LIMIT: u32 = 50;

/// Most users returned by a username search
pub const USER_SEARCH_LIMIT: u32 = 20;

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default queued events per live connection before pushes are dropped
pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;
