use crate::types::{ClassificationResultMap, Classifier};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::process::Command;
use tracing::{debug, info};

/// Runs an external classifier program once per batch.
///
/// The program receives the media directory as its last argument and must
/// print a JSON object mapping file name (item id) to a boolean on stdout.
pub struct CommandClassifier {
    program: OsString,
    args: Vec<OsString>,
}

impl CommandClassifier {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

#[async_trait]
impl Classifier for CommandClassifier {
    fn classifier_name(&self) -> String {
        format!("command ({})", self.program.to_string_lossy())
    }

    async fn classify(&self, media_dir: &Path) -> anyhow::Result<ClassificationResultMap> {
        debug!("Running classifier {:?} on {}", self.program, media_dir.display());

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(media_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("spawning classifier {:?}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "classifier exited with {}: {}",
                output.status,
                stderr.trim()
            ));
        }

        let result: ClassificationResultMap = serde_json::from_slice(&output.stdout)
            .context("classifier output is not a JSON object of id -> bool")?;

        info!("Classifier labelled {} media files", result.len());
        Ok(result)
    }
}

/// Fixed-answer classifier for development and testing
pub struct MockClassifier {
    name: String,
    labels: ClassificationResultMap,
    calls: AtomicUsize,
    seen_dirs: Mutex<Vec<std::path::PathBuf>>,
    fail_with: Option<String>,
}

impl MockClassifier {
    pub fn new(name: String) -> Self {
        Self {
            name,
            labels: ClassificationResultMap::new(),
            calls: AtomicUsize::new(0),
            seen_dirs: Mutex::new(Vec::new()),
            fail_with: None,
        }
    }

    pub fn with_label(mut self, id: impl Into<String>, is_target: bool) -> Self {
        self.labels.insert(id.into(), is_target);
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = (S, bool)>,
        S: Into<String>,
    {
        self.labels
            .extend(labels.into_iter().map(|(id, is_target)| (id.into(), is_target)));
        self
    }

    /// Make every call fail with `message`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.fail_with = Some(message.into());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Directories passed to `classify`, in call order.
    pub fn seen_dirs(&self) -> Vec<std::path::PathBuf> {
        self.seen_dirs
            .lock()
            .map(|dirs| dirs.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    fn classifier_name(&self) -> String {
        format!("Mock Classifier ({})", self.name)
    }

    async fn classify(&self, media_dir: &Path) -> anyhow::Result<ClassificationResultMap> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut dirs) = self.seen_dirs.lock() {
            dirs.push(media_dir.to_path_buf());
        }

        if let Some(message) = &self.fail_with {
            return Err(anyhow!("{}", message));
        }

        Ok(self.labels.clone())
    }
}
