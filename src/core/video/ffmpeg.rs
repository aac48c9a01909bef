//! Video decoding through the ffmpeg / ffprobe command-line tools.
//!
//! Tool lookup order: `FRAME_CURATOR_FFMPEG` / `FRAME_CURATOR_FFPROBE`
//! environment overrides, then `PATH`.

use super::error::{ExtractionError, Result};
use super::frame::Frame;
use super::source::{video_name, FrameSource};
use log::{debug, info, warn};
use serde::Deserialize;
use std::ffi::OsString;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;

fn resolve_tool(env_key: &str, default_name: &str) -> PathBuf {
    if let Ok(v) = std::env::var(env_key) {
        let p = PathBuf::from(&v);
        if p.exists() {
            return p;
        }
        warn!("{} points to missing file {}, using PATH", env_key, v);
    }
    PathBuf::from(default_name)
}

pub fn ffmpeg_path() -> PathBuf {
    resolve_tool("FRAME_CURATOR_FFMPEG", "ffmpeg")
}

pub fn ffprobe_path() -> PathBuf {
    resolve_tool("FRAME_CURATOR_FFPROBE", "ffprobe")
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

/// Stream geometry reported by ffprobe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoProbe {
    pub width: u32,
    pub height: u32,
    pub fps: Option<f64>,
    pub frame_count: Option<u64>,
}

/// Parses `"30000/1001"` or `"25"`; zero or malformed rates give `None`.
pub fn parse_frame_rate(rate: &str) -> Option<f64> {
    let fps = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

fn parse_probe(json: &str) -> Option<VideoProbe> {
    let parsed: ProbeOutput = serde_json::from_str(json).ok()?;
    let stream = parsed.streams.into_iter().next()?;
    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate));
    Some(VideoProbe {
        width: stream.width?,
        height: stream.height?,
        fps,
        frame_count: stream.nb_frames.and_then(|n| n.parse().ok()),
    })
}

pub fn probe(path: &Path) -> Result<VideoProbe> {
    let unavailable = |reason: String| ExtractionError::SourceUnavailable {
        path: path.to_path_buf(),
        reason,
    };

    let output = Command::new(ffprobe_path())
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate,avg_frame_rate,nb_frames",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .map_err(|e| unavailable(format!("ffprobe failed to start: {}", e)))?;

    if !output.status.success() {
        return Err(unavailable(format!(
            "ffprobe exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    parse_probe(&String::from_utf8_lossy(&output.stdout))
        .ok_or_else(|| unavailable("no video stream".to_string()))
}

/// Streams decoded RGB frames from an `ffmpeg` child process.
pub struct FfmpegVideoSource {
    name: Arc<str>,
    probe: VideoProbe,
    child: Child,
    stdout: ChildStdout,
    stderr: Option<JoinHandle<String>>,
    frame_bytes: usize,
    next_number: u64,
    finished: bool,
}

/// Arguments for streaming rgb24 frames to stdout.
///
/// Auto-rotation is disabled so the output raster keeps the coded
/// width/height reported by ffprobe.
fn decode_args(path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-v", "error", "-nostdin", "-noautorotate", "-i"]
        .iter()
        .map(OsString::from)
        .collect();
    args.push(path.as_os_str().to_os_string());
    args.extend(
        ["-f", "rawvideo", "-pix_fmt", "rgb24", "-"]
            .iter()
            .map(OsString::from),
    );
    args
}

/// Fills `buf` as far as the reader allows; returns the bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Decides whether the stream ended cleanly. A non-zero exit or a trailing
/// partial frame is a decode error.
fn check_end_of_stream(partial_bytes: usize, exited_ok: bool, stderr: &str) -> Result<()> {
    let stderr = stderr.trim();
    if !exited_ok {
        return Err(ExtractionError::Decode(format!("ffmpeg failed: {}", stderr)));
    }
    if partial_bytes > 0 {
        return Err(ExtractionError::Decode(format!(
            "truncated frame ({} bytes){}{}",
            partial_bytes,
            if stderr.is_empty() { "" } else { ": " },
            stderr
        )));
    }
    Ok(())
}

impl FfmpegVideoSource {
    pub fn open(path: &Path) -> Result<Self> {
        let probe = probe(path)?;
        if probe.width == 0 || probe.height == 0 {
            return Err(ExtractionError::SourceUnavailable {
                path: path.to_path_buf(),
                reason: format!("invalid dimensions {}x{}", probe.width, probe.height),
            });
        }

        let mut child = Command::new(ffmpeg_path())
            .args(decode_args(path))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ExtractionError::SourceUnavailable {
                path: path.to_path_buf(),
                reason: format!("ffmpeg failed to start: {}", e),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExtractionError::SourceUnavailable {
                path: path.to_path_buf(),
                reason: "ffmpeg stdout not captured".to_string(),
            })?;
        // 单独线程读 stderr，避免管道写满阻塞 ffmpeg
        let stderr = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut text = String::new();
                let _ = pipe.read_to_string(&mut text);
                text
            })
        });

        info!(
            "🎞️ Opened {} ({}x{}, fps {:?}, frames {:?})",
            path.display(),
            probe.width,
            probe.height,
            probe.fps,
            probe.frame_count
        );

        Ok(Self {
            name: Arc::from(video_name(path).as_str()),
            frame_bytes: probe.width as usize * probe.height as usize * 3,
            probe,
            child,
            stdout,
            stderr,
            next_number: 0,
            finished: false,
        })
    }

    pub fn probe(&self) -> &VideoProbe {
        &self.probe
    }
}

impl FrameSource for FfmpegVideoSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fps(&self) -> Option<f64> {
        self.probe.fps
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.finished {
            return Ok(None);
        }
        let mut data = vec![0u8; self.frame_bytes];
        let filled = read_full(&mut self.stdout, &mut data)?;
        if filled < self.frame_bytes {
            self.finished = true;
            let status = self.child.wait()?;
            let stderr = self
                .stderr
                .take()
                .and_then(|handle| handle.join().ok())
                .unwrap_or_default();
            check_end_of_stream(filled, status.success(), &stderr)?;
            debug!("{}: end of stream after {} frames", self.name, self.next_number);
            return Ok(None);
        }

        let frame_number = self.next_number;
        self.next_number += 1;
        let timestamp_ms = match self.probe.fps {
            Some(fps) => (frame_number as f64 * 1000.0 / fps) as u64,
            None => 0,
        };
        Ok(Some(
            Frame::new(self.probe.width, self.probe.height, data, timestamp_ms, frame_number)
                .with_source(Arc::clone(&self.name)),
        ))
    }
}

impl Drop for FfmpegVideoSource {
    fn drop(&mut self) {
        // 提前结束（max_frames）时 ffmpeg 仍在写管道
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        let ntsc = parse_frame_rate("30000/1001").unwrap();
        assert!((ntsc - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("abc"), None);
    }

    #[test]
    fn test_parse_probe_json() {
        let json = r#"{"streams":[{"width":1280,"height":720,
            "r_frame_rate":"30/1","avg_frame_rate":"0/0","nb_frames":"900"}]}"#;
        let probe = parse_probe(json).unwrap();
        assert_eq!((probe.width, probe.height), (1280, 720));
        assert_eq!(probe.fps, Some(30.0));
        assert_eq!(probe.frame_count, Some(900));
    }

    #[test]
    fn test_parse_probe_without_stream() {
        assert!(parse_probe(r#"{"streams":[]}"#).is_none());
        assert!(parse_probe("not json").is_none());
    }

    #[test]
    fn test_decode_args_disable_autorotate() {
        let args = decode_args(Path::new("/videos/portrait.mp4"));
        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();

        assert!(pos("-noautorotate") < pos("-i"));
        assert_eq!(args[pos("-i") + 1], OsString::from("/videos/portrait.mp4"));
        assert_eq!(args[pos("-pix_fmt") + 1], OsString::from("rgb24"));
        assert_eq!(args.last().unwrap(), "-");
    }

    #[test]
    fn test_read_full_reports_partial_frame() {
        let mut whole = std::io::Cursor::new(vec![7u8; 12]);
        let mut buf = [0u8; 6];
        assert_eq!(read_full(&mut whole, &mut buf).unwrap(), 6);
        assert_eq!(read_full(&mut whole, &mut buf).unwrap(), 6);
        assert_eq!(read_full(&mut whole, &mut buf).unwrap(), 0);

        let mut short = std::io::Cursor::new(vec![7u8; 4]);
        assert_eq!(read_full(&mut short, &mut buf).unwrap(), 4);
    }

    #[test]
    fn test_end_of_stream_checks() {
        assert!(check_end_of_stream(0, true, "").is_ok());
        assert!(matches!(
            check_end_of_stream(0, false, "Invalid data found when processing input"),
            Err(ExtractionError::Decode(msg)) if msg.contains("Invalid data")
        ));
        assert!(matches!(
            check_end_of_stream(1024, true, ""),
            Err(ExtractionError::Decode(msg)) if msg.contains("1024")
        ));
    }

    #[test]
    fn test_resolve_tool_fallback() {
        let path = resolve_tool("FRAME_CURATOR_TEST_NONEXISTENT", "testcmd");
        assert_eq!(path, PathBuf::from("testcmd"));
    }
}
