//! Engine command construction.

use crate::job::{ConversionOptions, TargetFormat};

/// What kind of media an input is, from its MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        let mime = mime_type.trim().to_ascii_lowercase();
        if mime.starts_with("video/") {
            Some(MediaKind::Video)
        } else if mime.starts_with("audio/") {
            Some(MediaKind::Audio)
        } else {
            None
        }
    }

    /// MIME type of the converted output.
    pub fn output_mime(&self, target_format: &TargetFormat) -> String {
        match self {
            MediaKind::Video => format!("video/{}", target_format.extension()),
            MediaKind::Audio => format!("audio/{}", target_format.extension()),
        }
    }
}

/// Maps a named resolution to a frame size. Unknown names get 720p.
pub fn resolution_size(resolution: &str) -> &'static str {
    match resolution.trim().to_ascii_lowercase().as_str() {
        "1080p" => "1920x1080",
        "720p" => "1280x720",
        "480p" => "854x480",
        "360p" => "640x360",
        _ => "1280x720",
    }
}

fn opt(options: &ConversionOptions, key: &str, default: &str) -> String {
    options.text(key).unwrap_or_else(|| default.to_string())
}

/// Builds engine arguments for a conversion. Paths are staged file names.
pub fn build_args(
    kind: MediaKind,
    input: &str,
    output: &str,
    options: &ConversionOptions,
) -> Vec<String> {
    let mut args = vec!["-i".to_string(), input.to_string()];

    match kind {
        MediaKind::Video => {
            args.extend([
                "-c:v".to_string(),
                opt(options, "videoCodec", "libx264"),
                "-c:a".to_string(),
                opt(options, "audioCodec", "aac"),
                "-b:v".to_string(),
                opt(options, "videoBitrate", "1M"),
                "-b:a".to_string(),
                opt(options, "audioBitrate", "128k"),
            ]);

            if let Some(resolution) = options.text("resolution") {
                args.extend(["-s".to_string(), resolution_size(&resolution).to_string()]);
            }
        }
        MediaKind::Audio => {
            // Plain numbers are kbps.
            let mut bitrate = opt(options, "audioBitrate", "128");
            if !bitrate.ends_with(['k', 'K']) {
                bitrate.push('k');
            }

            args.extend([
                "-c:a".to_string(),
                opt(options, "audioCodec", "libmp3lame"),
                "-b:a".to_string(),
                bitrate,
                "-ar".to_string(),
                opt(options, "sampleRate", "44100"),
            ]);
        }
    }

    args.push(output.to_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_from_mime() {
        assert_eq!(MediaKind::from_mime("video/mp4"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_mime("Audio/FLAC"), Some(MediaKind::Audio));
        assert_eq!(MediaKind::from_mime("application/pdf"), None);
        assert_eq!(MediaKind::from_mime(""), None);
    }

    #[test]
    fn test_video_defaults() {
        let args = build_args(MediaKind::Video, "in.mov", "out.mp4", &ConversionOptions::new());
        assert_eq!(
            args,
            vec![
                "-i", "in.mov", "-c:v", "libx264", "-c:a", "aac", "-b:v", "1M", "-b:a", "128k",
                "out.mp4"
            ]
        );
    }

    #[test]
    fn test_video_resolution() {
        let options = ConversionOptions::new()
            .with("resolution", "480p")
            .with("videoCodec", "libvpx-vp9");
        let args = build_args(MediaKind::Video, "in", "out", &options);
        assert!(args.windows(2).any(|w| w == ["-s", "854x480"]));
        assert!(args.windows(2).any(|w| w == ["-c:v", "libvpx-vp9"]));

        let options = ConversionOptions::new().with("resolution", "4k");
        let args = build_args(MediaKind::Video, "in", "out", &options);
        assert!(args.windows(2).any(|w| w == ["-s", "1280x720"]));
    }

    #[test]
    fn test_audio_defaults() {
        let args = build_args(MediaKind::Audio, "in.wav", "out.mp3", &ConversionOptions::new());
        assert_eq!(
            args,
            vec![
                "-i", "in.wav", "-c:a", "libmp3lame", "-b:a", "128k", "-ar", "44100", "out.mp3"
            ]
        );
    }

    #[test]
    fn test_audio_bitrate_and_sample_rate() {
        let options = ConversionOptions::new()
            .with("audioBitrate", 320i64)
            .with("sampleRate", 48000i64);
        let args = build_args(MediaKind::Audio, "in", "out", &options);
        assert!(args.windows(2).any(|w| w == ["-b:a", "320k"]));
        assert!(args.windows(2).any(|w| w == ["-ar", "48000"]));

        let options = ConversionOptions::new().with("audioBitrate", "192k");
        let args = build_args(MediaKind::Audio, "in", "out", &options);
        assert!(args.windows(2).any(|w| w == ["-b:a", "192k"]));
    }

    #[test]
    fn test_blank_options_use_defaults() {
        let options = ConversionOptions::new().with("audioCodec", "  ");
        let args = build_args(MediaKind::Audio, "in", "out", &options);
        assert!(args.windows(2).any(|w| w == ["-c:a", "libmp3lame"]));
    }

    #[test]
    fn test_output_mime() {
        assert_eq!(MediaKind::Video.output_mime(&TargetFormat::new("WEBM")), "video/webm");
        assert_eq!(MediaKind::Audio.output_mime(&TargetFormat::new("mp3")), "audio/mp3");
    }
}
