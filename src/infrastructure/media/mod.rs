mod ffmpeg_transcoder;
mod http_downloader;
mod http_resolver;
mod mermaid_renderer;

pub use ffmpeg_transcoder::FfmpegTranscoder;
pub use http_downloader::HttpMediaDownloader;
pub use http_resolver::HttpMediaResolver;
pub use mermaid_renderer::MermaidCliRenderer;
