use crate::{bundle_with, Bundle, BundleConfig, Error, Inliner, Locale, Renderer, Result};
use std::sync::mpsc::{self, Sender};
use std::thread;
use tokio::sync::oneshot;
use url::Url;

enum Command {
    Convert(String, Locale, oneshot::Sender<Result<Bundle>>),
    Inline(String, String, oneshot::Sender<Result<Bundle>>),
    Close(oneshot::Sender<()>),
}

/// An async-friendly converter backed by a dedicated worker thread.
///
/// The worker owns the renderer and runs each conversion to completion with
/// the blocking pipeline, so async callers never block their executor and
/// the inliner's own runtime is never nested inside theirs. Conversions are
/// processed one at a time in submission order.
#[derive(Clone)]
pub struct Converter {
    cmd_tx: Sender<Command>,
}

impl Converter {
    /// Start a converter whose renderer is built on the worker thread by
    /// `make_renderer`.
    pub async fn new<R, F>(config: BundleConfig, make_renderer: F) -> Result<Self>
    where
        R: Renderer + 'static,
        F: FnOnce(&BundleConfig) -> Result<R> + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx) = oneshot::channel::<Result<()>>();

        thread::spawn(move || {
            let mut renderer = match make_renderer(&config) {
                Ok(r) => r,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };
            let _ = init_tx.send(Ok(()));

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::Convert(url, locale, resp) => {
                        let run_config = BundleConfig {
                            locale,
                            ..config.clone()
                        };
                        let res = bundle_with(&mut renderer, &url, &run_config);
                        let _ = resp.send(res);
                    }
                    Command::Inline(html, source_url, resp) => {
                        let _ = resp.send(inline_on_worker(&html, &source_url, &config));
                    }
                    Command::Close(resp) => {
                        let _ = resp.send(());
                        break;
                    }
                }
            }
        });

        init_rx
            .await
            .map_err(|e| Error::Other(format!("Worker init canceled: {}", e)))??;

        Ok(Self { cmd_tx })
    }

    /// Start a converter with the default renderer for this build.
    pub async fn with_default_renderer(config: BundleConfig) -> Result<Self> {
        Self::new(config, |cfg| crate::new_renderer(cfg)).await
    }

    /// Capture and inline `url` for `locale`.
    pub async fn convert(&self, url: &str, locale: Locale) -> Result<Bundle> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Convert(url.to_string(), locale, tx))
            .map_err(|_| Error::Other("Converter worker has stopped".into()))?;
        rx.await
            .map_err(|e| Error::Other(format!("Convert canceled: {}", e)))?
    }

    /// Inline the resources of already-rendered `html` against `source_url`,
    /// using this converter's configuration.
    pub async fn inline(&self, html: &str, source_url: &str) -> Result<Bundle> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Inline(html.to_string(), source_url.to_string(), tx))
            .map_err(|_| Error::Other("Converter worker has stopped".into()))?;
        rx.await
            .map_err(|e| Error::Other(format!("Inline canceled: {}", e)))?
    }

    /// Stop the worker thread. Pending conversions finish first.
    pub async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Close(tx));
        rx.await
            .map_err(|e| Error::Other(format!("Close canceled: {}", e)))
    }
}

fn inline_on_worker(html: &str, source_url: &str, config: &BundleConfig) -> Result<Bundle> {
    let base = Url::parse(source_url)?;
    let inliner = Inliner::new(config)?;
    Ok(inliner.inline(html, &base))
}
