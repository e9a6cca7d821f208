use std::rc::Rc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use engine_logging::{engine_debug, engine_info, engine_warn};
use transcript_core::{Message, TranscriptResponse};
use transcript_engine::{
    ChannelResponder, EngineSettings, LiveDocument, LocalMessenger, Tab, TabController,
    TranscriptEngine,
};

use crate::scenario::{Scenario, Step};

const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Replays `scenario` and returns every response the engine sent back, in order.
///
/// Must run inside a tokio `LocalSet`.
pub async fn run(scenario: &Scenario, settings: EngineSettings) -> anyhow::Result<Vec<TranscriptResponse>> {
    let document = LiveDocument::new(&scenario.url, &scenario.html)?;
    if scenario.loaded {
        document.finish_loading();
    }
    let settle = settings.debounce_window * 2;
    let mut engine = TranscriptEngine::new(document.clone(), settings)?;
    let watching = engine.start();
    engine_info!("watching {}: {}", scenario.url, watching);

    let (responder, mut replies) = ChannelResponder::new();
    let mut controller = TabController::new(LocalMessenger::new(engine.router(), REPLY_TIMEOUT));

    for (index, step) in scenario.steps.iter().enumerate() {
        engine_debug!("step {}: {:?}", index, step);
        match step {
            Step::Request => {
                let message = Message::get_transcript(document.location());
                if !engine.router().accept(message, Rc::new(responder.clone())) {
                    engine_warn!("request at step {} was not accepted", index);
                }
            }
            Step::ActivateTab(id) => {
                let tab = Tab::new(*id, document.location());
                controller.on_active_tab_changed(Some(tab)).await;
            }
            other => apply(&document, other).with_context(|| format!("step {index}: {other:?}"))?,
        }
        if let Step::Wait(ms) = step {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
        } else {
            tokio::task::yield_now().await;
        }
    }

    tokio::time::sleep(settle).await;
    engine.stop();

    let mut responses = Vec::new();
    while let Ok(response) = replies.try_recv() {
        responses.push(response);
    }
    Ok(responses)
}

fn apply(document: &LiveDocument, step: &Step) -> anyhow::Result<()> {
    match step {
        Step::Wait(_) | Step::Request | Step::ActivateTab(_) => {}
        Step::FinishLoading => document.finish_loading(),
        Step::PushState(url) => document.history().push_state(url)?,
        Step::ReplaceState(url) => document.history().replace_state(url)?,
        Step::Back => {
            if !document.history().back() {
                engine_warn!("back requested with an empty history");
            }
        }
        Step::SetHash(fragment) => document.history().set_hash(fragment),
        Step::AppendHtml(selector, html) => {
            document.append_html(element(document, selector)?, html)?;
        }
        Step::SetInnerHtml(selector, html) => {
            document.set_inner_html(element(document, selector)?, html)?;
        }
        Step::SetText(selector, text) => {
            document.set_text_content(element(document, selector)?, text)?;
        }
        Step::Remove(selector) => document.remove(element(document, selector)?)?,
    }
    Ok(())
}

fn element(document: &LiveDocument, selector: &str) -> anyhow::Result<transcript_engine::NodeId> {
    document
        .query(selector)?
        .ok_or_else(|| anyhow!("no element matches {selector}"))
}
