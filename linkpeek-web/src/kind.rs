//! Mapping of `og:type` strings and MIME types onto [`ContentKind`].

use linkpeek_common::ContentKind;

/// Audio and video types a media player would accept. Anything under
/// `audio/` is audio, everything else here is video. `text/*` entries (e.g.
/// subtitle tracks) are deliberately ignored by [`kind_for_mime_type`].
const AUDIOVISUAL_MIME_TYPES: &[&str] = &[
    "audio/3gpp",
    "audio/3gpp2",
    "audio/aac",
    "audio/aacp",
    "audio/ac3",
    "audio/aiff",
    "audio/amr",
    "audio/basic",
    "audio/eac3",
    "audio/flac",
    "audio/mp3",
    "audio/mp4",
    "audio/mpeg",
    "audio/mpeg3",
    "audio/mpegurl",
    "audio/mpg",
    "audio/ogg",
    "audio/opus",
    "audio/scpls",
    "audio/wav",
    "audio/wave",
    "audio/webm",
    "audio/vnd.wave",
    "audio/x-aac",
    "audio/x-aiff",
    "audio/x-caf",
    "audio/x-flac",
    "audio/x-m4a",
    "audio/x-m4b",
    "audio/x-m4p",
    "audio/x-mp3",
    "audio/x-mpeg",
    "audio/x-mpeg3",
    "audio/x-mpegurl",
    "audio/x-mpg",
    "audio/x-wav",
    "application/mp4",
    "application/mpegurl",
    "application/vnd.apple.mpegurl",
    "application/x-mpegurl",
    "text/vtt",
    "video/3gpp",
    "video/3gpp2",
    "video/avi",
    "video/mp2t",
    "video/mp4",
    "video/mpeg",
    "video/mpg",
    "video/msvideo",
    "video/ogg",
    "video/quicktime",
    "video/webm",
    "video/x-m4v",
    "video/x-mpeg",
    "video/x-mpg",
    "video/x-msvideo",
];

const IMAGE_MIME_TYPES: &[&str] = &[
    "image/bmp",
    "image/x-windows-bmp",
    "image/gif",
    "image/jpeg",
    "image/pjpeg",
    "image/x-icon",
    "image/png",
    "image/tiff",
    "image/x-tiff",
];

const DOCUMENT_MIME_TYPES: &[&str] = &[
    "application/vnd.ms-powerpoint",
    "application/mspowerpoint",
    "application/x-mspowerpoint",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.template",
    "application/vnd.ms-excel.addin.macroenabled.12",
    "application/vnd.ms-excel",
    "application/vnd.ms-excel.sheet.binary.macroenabled.12",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.template",
    "text/plain",
    "application/rtf",
    "application/x-rtf",
    "text/richtext",
    "application/pdf",
];

const HTML_MIME_TYPES: &[&str] = &["text/html", "text/x-server-parsed-html"];

const ARCHIVE_MIME_TYPES: &[&str] = &[
    "application/x-compress",
    "application/x-compressed",
    "application/x-zip-compressed",
    "application/zip",
    "multipart/x-zip",
];

/// Resolve an `og:type` value, accepting canonical raw values and the common
/// free-form aliases. Unknown strings yield `None`.
///
/// ```
/// use linkpeek_common::ContentKind;
/// use linkpeek_web::kind::kind_for_og_type;
///
/// assert_eq!(kind_for_og_type("video.tv_show"), Some(ContentKind::VideoTvShow));
/// assert_eq!(kind_for_og_type("film"), Some(ContentKind::VideoMovie));
/// assert_eq!(kind_for_og_type("podcast"), None);
/// ```
pub fn kind_for_og_type(og_type: &str) -> Option<ContentKind> {
    if let Ok(kind) = og_type.parse::<ContentKind>() {
        return Some(kind);
    }
    let kind = match og_type {
        "music.other" => ContentKind::Music,
        "music.track" | "song" | "track" => ContentKind::MusicSong,
        "playlist" => ContentKind::MusicPlaylist,
        "album" | "record" => ContentKind::MusicAlbum,
        "radio_station" | "radio" => ContentKind::MusicRadioStation,
        "video.other" => ContentKind::Video,
        "movie" | "film" => ContentKind::VideoMovie,
        "episode" => ContentKind::VideoEpisode,
        "tv_show" | "tv_series" => ContentKind::VideoTvShow,
        _ => return None,
    };
    Some(kind)
}

/// Classify a response by MIME type alone. Parameters such as `charset` are
/// ignored; anything unrecognised is [`ContentKind::FileOther`].
pub fn kind_for_mime_type(mime_type: &str) -> ContentKind {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let essence = essence.as_str();

    if !essence.starts_with("text/") && AUDIOVISUAL_MIME_TYPES.contains(&essence) {
        if essence.starts_with("audio/") {
            ContentKind::FileAudio
        } else {
            ContentKind::FileVideo
        }
    } else if IMAGE_MIME_TYPES.contains(&essence) {
        ContentKind::FileImage
    } else if DOCUMENT_MIME_TYPES.contains(&essence) {
        ContentKind::FileDocument
    } else if HTML_MIME_TYPES.contains(&essence) {
        ContentKind::Website
    } else if ARCHIVE_MIME_TYPES.contains(&essence) {
        ContentKind::FileArchive
    } else {
        ContentKind::FileOther
    }
}
