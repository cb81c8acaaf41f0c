use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::mpsc;
use std::thread;

use tracing::{debug, info, warn};

use crate::types::error::{PlayerError, Result};

/// `preprocessed_<stem>.mp4` next to the input.
pub fn preprocessed_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("preprocessed_{stem}.mp4"))
}

/// Arguments for a high-bitrate H.264/AAC re-encode with the moov atom up front.
pub fn ffmpeg_args(input: &Path, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = vec!["-y".into(), "-i".into()];
    args.push(input.to_string_lossy().into_owned());
    args.extend(
        [
            "-c:v", "libx264", "-c:a", "aac", "-preset", "veryfast", "-crf", "18", "-b:v",
            "10M", "-maxrate", "15M", "-bufsize", "20M", "-b:a", "320k", "-movflags",
            "+faststart", "-f", "mp4",
        ]
        .map(String::from),
    );
    args.push(output.to_string_lossy().into_owned());
    args
}

/// Re-encodes `input` with the ffmpeg CLI and returns the new file's path.
/// Blocks until ffmpeg exits.
pub fn preprocess_video(input: &Path) -> Result<PathBuf> {
    if !input.is_file() {
        return Err(PlayerError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} does not exist", input.display()),
        )));
    }
    let output = preprocessed_output_path(input);
    info!(input = %input.display(), output = %output.display(), "transcoding video");

    let result = Command::new("ffmpeg")
        .args(ffmpeg_args(input, &output))
        .output()?;
    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        let reason = stderr.lines().last().unwrap_or("ffmpeg exited with an error");
        warn!(status = ?result.status, "ffmpeg failed");
        return Err(PlayerError::Transcode(reason.to_string()));
    }
    Ok(output)
}

/// A re-encode running on its own thread. Poll it from the UI loop.
pub struct TranscodeJob {
    input: PathBuf,
    rx: mpsc::Receiver<Result<PathBuf>>,
}

impl TranscodeJob {
    pub fn spawn(input: PathBuf) -> Self {
        Self::spawn_with(input, preprocess_video)
    }

    fn spawn_with<F>(input: PathBuf, work: F) -> Self
    where
        F: FnOnce(&Path) -> Result<PathBuf> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let path = input.clone();
        thread::spawn(move || {
            // The job may have been dropped; nobody is left to tell.
            let _ = tx.send(work(&path));
        });
        debug!(input = %input.display(), "transcode started");
        Self { input, rx }
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    /// `None` while the worker is still running.
    pub fn poll(&self) -> Option<Result<PathBuf>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(PlayerError::Transcode(
                "transcode worker exited without a result".into(),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_output_path_sits_next_to_input() {
        let out = preprocessed_output_path(Path::new("/videos/holiday.mov"));
        assert_eq!(out, PathBuf::from("/videos/preprocessed_holiday.mp4"));
    }

    #[test]
    fn test_ffmpeg_args() {
        let args = ffmpeg_args(Path::new("in.mkv"), Path::new("out.mp4"));
        let joined = args.join(" ");
        assert!(joined.starts_with("-y -i in.mkv"));
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-preset veryfast -crf 18"));
        assert!(joined.contains("-b:v 10M -maxrate 15M -bufsize 20M"));
        assert!(joined.contains("-b:a 320k"));
        assert!(joined.contains("-movflags +faststart"));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.mp4");
        let err = preprocess_video(&missing).unwrap_err();
        assert!(matches!(err, PlayerError::Io(_)));
        assert!(!preprocessed_output_path(&missing).exists());
    }

    fn wait(job: &TranscodeJob) -> Result<PathBuf> {
        for _ in 0..500 {
            if let Some(result) = job.poll() {
                return result;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("transcode job never finished");
    }

    #[test]
    fn test_job_runs_off_the_calling_thread() {
        let caller = thread::current().id();
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        let job = TranscodeJob::spawn_with(PathBuf::from("in.mov"), move |input| {
            assert_ne!(thread::current().id(), caller);
            gate_rx.recv().ok();
            Ok(preprocessed_output_path(input))
        });
        assert!(job.poll().is_none());
        assert_eq!(job.input(), Path::new("in.mov"));

        gate_tx.send(()).unwrap();
        assert_eq!(wait(&job).unwrap(), PathBuf::from("preprocessed_in.mp4"));
    }

    #[test]
    fn test_job_reports_failure() {
        let job = TranscodeJob::spawn_with(PathBuf::from("in.mov"), |_| {
            Err(PlayerError::Transcode("encoder missing".into()))
        });
        let err = wait(&job).unwrap_err();
        assert!(err.to_string().contains("encoder missing"));
    }

    #[test]
    fn test_job_for_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let job = TranscodeJob::spawn(dir.path().join("gone.mp4"));
        assert!(matches!(wait(&job), Err(PlayerError::Io(_))));
    }
}
