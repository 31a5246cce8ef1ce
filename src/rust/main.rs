use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use toxicheck::{
    result_rows, BuiltinModel, ClassifierError, ClassifierSession, Locale, ModelManager,
    OnnxModelLoader, ResultRow, RuntimeConfig, SessionState, DEFAULT_THRESHOLD,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Text to analyze. Lines are read from stdin when omitted
    text: Option<String>,

    /// Probability above which a category counts as detected
    #[arg(short, long, default_value_t = DEFAULT_THRESHOLD, env = "TOXICHECK_THRESHOLD")]
    threshold: f32,

    /// Restrict to these categories (repeatable). All categories when omitted
    #[arg(short, long = "category")]
    categories: Vec<String>,

    /// Display language for category names (fr, en)
    #[arg(short, long, default_value_t = Locale::Fr)]
    lang: Locale,

    /// Model cache directory. Defaults to $TOXICHECK_CACHE/models or the platform cache
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Force a fresh download of the model files
    #[arg(short, long)]
    fresh: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// ONNX Runtime intra-op threads (0 lets the runtime decide)
    #[arg(long, default_value_t = 0)]
    threads: usize,
}

fn status_line(lang: Locale, state: SessionState, threshold: f32) -> String {
    let threshold = (threshold * 100.0).round();
    match (lang, state) {
        (Locale::Fr, SessionState::Uninitialized) => "Initialisation...".to_string(),
        (Locale::Fr, SessionState::Loading) => "Chargement du modèle...".to_string(),
        (Locale::Fr, SessionState::Ready) => format!("Modèle prêt (seuil : {}%)", threshold),
        (Locale::Fr, SessionState::Failed) => "Modèle indisponible".to_string(),
        (Locale::En, SessionState::Uninitialized) => "Initializing...".to_string(),
        (Locale::En, SessionState::Loading) => "Loading model...".to_string(),
        (Locale::En, SessionState::Ready) => format!("Model ready (threshold: {}%)", threshold),
        (Locale::En, SessionState::Failed) => "Model not available".to_string(),
    }
}

fn print_rows(rows: &[ResultRow], lang: Locale, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(rows)?);
        return Ok(());
    }

    let width = rows.iter().map(|r| r.label.chars().count()).max().unwrap_or(0);
    for row in rows {
        println!(
            "  {:<width$}  {:>6}  {}",
            row.label,
            row.percent,
            lang.verdict(row.detected),
            width = width
        );
    }
    println!();
    Ok(())
}

/// Status line once loading settles, and whether classification can go on.
///
/// A failed load is reported only through the status line; the loader's
/// error is logged by the session.
fn settled_status(lang: Locale, state: SessionState, threshold: f32) -> (String, bool) {
    (status_line(lang, state, threshold), state == SessionState::Ready)
}

/// Decodes one stdin line, dropping it when it is not valid UTF-8.
fn decode_line(bytes: Vec<u8>) -> Option<String> {
    match String::from_utf8(bytes) {
        Ok(line) => Some(line),
        Err(e) => {
            warn!("Skipping input line that is not valid UTF-8: {}", e);
            None
        }
    }
}

/// Returns false once the session has been torn down.
async fn analyze(session: &ClassifierSession, text: &str, args: &Args) -> anyhow::Result<bool> {
    match session.classify(text).await {
        Ok(results) => {
            print_rows(&result_rows(&results, &args.lang.labels()), args.lang, args.json)?;
        }
        Err(ClassifierError::Cancelled) => return Ok(false),
        Err(e) if e.is_rejection() => debug!("Request not submitted: {}", e),
        Err(e) => eprintln!("{}", e),
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    env_logger::init();
    let args = Args::parse();

    let manager = match &args.models_dir {
        Some(dir) => ModelManager::new(dir),
        None => ModelManager::new_default(),
    }
    .context("Failed to create model cache directory")?;

    if args.fresh {
        info!("Fresh download requested - removing any existing model files...");
        manager.remove_download(&BuiltinModel::default().get_model_info().name)?;
    }

    let loader = OnnxModelLoader::new(manager)
        .with_runtime_config(RuntimeConfig::default().with_intra_threads(args.threads));
    let session = ClassifierSession::builder().with_loader(loader).build()?;

    let on_signal = session.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.teardown();
        }
    });

    eprintln!("{}", status_line(args.lang, SessionState::Loading, args.threshold));
    let loading = {
        let session = session.clone();
        let categories = args.categories.clone();
        let threshold = args.threshold;
        tokio::spawn(async move { session.initialize(threshold, categories).await })
    };

    let state = match loading.await? {
        Ok(state) => state,
        Err(ClassifierError::Cancelled) => return Ok(ExitCode::SUCCESS),
        Err(e) => return Err(e.into()),
    };
    let (status, ready) = settled_status(args.lang, state, args.threshold);
    eprintln!("{}", status);
    if !ready {
        return Ok(ExitCode::FAILURE);
    }

    if let Some(text) = &args.text {
        analyze(&session, text, &args).await?;
        session.teardown();
        return Ok(ExitCode::SUCCESS);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).split(b'\n');
    loop {
        let segment = tokio::select! {
            _ = session.torn_down() => break,
            segment = lines.next_segment() => segment?,
        };
        let Some(bytes) = segment else { break };
        let Some(line) = decode_line(bytes) else { continue };
        if !analyze(&session, &line, &args).await? {
            break;
        }
    }

    session.teardown();
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use toxicheck::{ModelLoader, ToxicityModel};

    struct Unavailable;

    #[async_trait]
    impl ModelLoader for Unavailable {
        async fn load(&self, _: f32, _: &[String]) -> Result<Arc<dyn ToxicityModel>, ClassifierError> {
            Err(ClassifierError::LoadFailure("network unreachable".into()))
        }
    }

    #[tokio::test]
    async fn test_failed_load_reports_only_status() {
        let session = ClassifierSession::builder().with_loader(Unavailable).build().unwrap();
        let state = session.initialize(DEFAULT_THRESHOLD, vec![]).await.unwrap();

        let (status, ready) = settled_status(Locale::Fr, state, DEFAULT_THRESHOLD);
        assert!(!ready);
        assert_eq!(status, "Modèle indisponible");
        assert!(!status.contains("network unreachable"));

        let (status, _) = settled_status(Locale::En, state, DEFAULT_THRESHOLD);
        assert_eq!(status, "Model not available");
    }

    #[test]
    fn test_ready_status_shows_threshold() {
        let (status, ready) = settled_status(Locale::Fr, SessionState::Ready, 0.85);
        assert!(ready);
        assert_eq!(status, "Modèle prêt (seuil : 85%)");
    }

    #[test]
    fn test_invalid_utf8_line_is_skipped() {
        assert_eq!(decode_line(b"You are wonderful\r".to_vec()).as_deref(), Some("You are wonderful\r"));
        assert_eq!(decode_line(vec![0x66, 0xff, 0xfe]), None);
    }
}
