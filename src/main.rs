//! stdio harness for the widget bridge.
//!
//! Reads inbound frames (`{"origin": ..., "data": {...}}`) or DOM observations
//! (`{"dom": {...}}`) as JSON lines on stdin and writes every outbound
//! envelope as a JSON line on stdout. Logs go to stderr.
//!
//! `--demo` skips stdin and plays the host itself: it answers `ready` with a
//! fresh token, initializes the built-in echo widget and sends it a ping.

use std::rc::Rc;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tokio::task::LocalSet;
use tracing_subscriber::EnvFilter;
use url::Url;
use uuid::Uuid;
use widget_bridge::{
    Bridge, BridgeConfig, BridgeInput, ChannelPort, DomObservation, Envelope, GuestModule,
    HttpStylesheetLoader, InboundFrame, InboundMessage, ModuleRegistry, SessionToken,
    WidgetContext,
};

const ECHO_MODULE_PATH: &str = "echo.js";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HarnessLine {
    Dom { dom: DomObservation },
    Frame(InboundFrame),
}

fn main() -> Result<()> {
    let demo = std::env::args().skip(1).any(|arg| arg == "--demo");

    let subscriber_result = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    if subscriber_result.is_err() {
        // tracing was already initialised; continue silently
    }

    let config = BridgeConfig::from_env().context("load bridge config")?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;
    let local = LocalSet::new();
    local.block_on(&rt, run(config, demo))
}

async fn run(config: BridgeConfig, demo: bool) -> Result<()> {
    let origin = config.expected_origin();
    let base_url = format!("{origin}/");

    let registry = Rc::new(ModuleRegistry::new());
    let echo_url = Url::parse(&base_url)
        .and_then(|base| base.join(ECHO_MODULE_PATH))
        .context("build echo module URL")?;
    registry.register(&echo_url, echo_module());

    let stylesheets = Rc::new(HttpStylesheetLoader::new().context("build stylesheet loader")?);
    let (port, mut outbound) = ChannelPort::new();
    let bridge = Bridge::new(config, registry, stylesheets, Rc::new(port));

    // Guest handlers keep the bridge (and so the port) alive, so the writer
    // stops on an explicit signal rather than on channel close.
    let (done_tx, mut done_rx) = oneshot::channel::<()>();
    let writer = tokio::task::spawn_local(async move {
        let mut stdout = tokio::io::stdout();
        loop {
            tokio::select! {
                biased;
                Some(envelope) = outbound.recv() => {
                    write_envelope(&mut stdout, &envelope).await?;
                }
                _ = &mut done_rx => {
                    while let Ok(envelope) = outbound.try_recv() {
                        write_envelope(&mut stdout, &envelope).await?;
                    }
                    break;
                }
            }
        }
        Ok::<_, anyhow::Error>(())
    });

    let (tx, rx) = mpsc::unbounded_channel();
    if demo {
        queue_demo_session(&tx, &origin, &base_url)?;
    } else {
        tokio::task::spawn_local(read_stdin(tx.clone()));
    }
    drop(tx);

    let outcome = bridge.run(rx).await;
    let _ = done_tx.send(());
    writer.await.context("join stdout writer")??;
    outcome.context("bridge session failed")
}

async fn write_envelope(stdout: &mut tokio::io::Stdout, envelope: &Envelope) -> Result<()> {
    let mut line = serde_json::to_string(envelope).context("encode outbound envelope")?;
    line.push('\n');
    stdout
        .write_all(line.as_bytes())
        .await
        .context("write outbound envelope")?;
    stdout.flush().await.context("flush stdout")
}

async fn read_stdin(tx: mpsc::UnboundedSender<BridgeInput>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                tracing::error!(error = %err, "failed to read stdin");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let input = match serde_json::from_str::<HarnessLine>(&line) {
            Ok(HarnessLine::Frame(frame)) => BridgeInput::Frame(frame),
            Ok(HarnessLine::Dom { dom }) => BridgeInput::Dom(dom),
            Err(err) => {
                tracing::warn!(error = %err, "skipping malformed input line");
                continue;
            }
        };
        if tx.send(input).is_err() {
            break;
        }
    }
}

fn queue_demo_session(
    tx: &mpsc::UnboundedSender<BridgeInput>,
    origin: &str,
    base_url: &str,
) -> Result<()> {
    let token = SessionToken::new(Uuid::new_v4().to_string());
    let messages = [
        InboundMessage::ReadyReply {
            token,
            base_url: base_url.to_string(),
            js_path: ECHO_MODULE_PATH.to_string(),
        },
        InboundMessage::Init {
            data: json!({"greeting": "hello"}),
        },
        InboundMessage::Event {
            event: "ping".to_string(),
            payload: json!({"n": 1}),
        },
    ];
    let mut inputs = Vec::with_capacity(messages.len() + 1);
    for message in &messages {
        let frame = InboundFrame::from_message(origin, message).context("encode demo frame")?;
        inputs.push(BridgeInput::Frame(frame));
    }
    inputs.push(BridgeInput::Dom(DomObservation::BodyResized {
        content_height: 48.0,
    }));

    for input in inputs {
        if tx.send(input).is_err() {
            tracing::warn!("bridge input closed; dropping remaining demo inputs");
            break;
        }
    }
    Ok(())
}

/// Widget that renders its init data and answers every `ping` with a `pong`.
fn echo_module() -> GuestModule {
    GuestModule::new().with_function("render", |ctx: &WidgetContext, data| {
        ctx.root()
            .replace(format!("<pre class=\"echo\">{data}</pre>"));
        let reply = ctx.clone();
        ctx.handle_event("ping", move |payload| {
            reply.push_event("pong", Some(payload));
            Ok(())
        })?;
        Ok(())
    })
}
