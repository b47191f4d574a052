//! Non-interactive `call` command

use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::events::CallEvent;
use crate::api::{CallTarget, CapabilityKind};
use crate::cli::{CallArgs, CliContext};
use crate::core::arguments::{fill_from_schema, ArgumentInput, ToolDescriptor};
use crate::core::constants::DEFAULT_CANCEL_REASON;
use crate::core::correlator::EventLogEntry;
use crate::core::inspector::{
    ActiveCall, ActivityEntry, ActivitySink, CallPhase, CallRequest, InspectorController,
    NotificationKind,
};
use crate::utils::logging::ActivityLog;

pub async fn run_call(context: &CliContext, args: CallArgs) -> Result<(), Box<dyn Error>> {
    let backend = context.connect()?;
    let mut controller = InspectorController::new(backend);
    if let Some(sink) = activity_sink(context.log_file.clone())? {
        controller = controller.with_activity_sink(sink);
    }

    let target = args.target.to_target(&context.config);
    let tool = lookup_tool(&controller, &target, &args.tool).await;
    let arguments = argument_input(&args, &tool)?;
    let request = CallRequest::new(tool, target.clone())
        .with_arguments(arguments)
        .with_timeout_ms(args.timeout_ms.unwrap_or_else(|| context.config.timeout_ms()));

    let started = match controller.select(CapabilityKind::Tool, &target).await {
        Ok(_) => controller.start_call(request).await,
        Err(err) => Err(err),
    };
    print_notifications(&mut controller);
    if started.is_err() {
        shutdown(controller).await;
        std::process::exit(1);
    }

    let phase = follow_call(&mut controller).await?;
    info!(
        call_id = controller.panel().last_call_id().unwrap_or_default(),
        phase = phase.as_str(),
        "Call settled"
    );
    print_notifications(&mut controller);
    if let Some(result) = controller.panel().result().filter(|_| phase == CallPhase::Done) {
        println!("{}", serde_json::to_string_pretty(result)?);
    }
    shutdown(controller).await;

    if phase != CallPhase::Done {
        std::process::exit(exit_code(phase));
    }
    Ok(())
}

/// Fetches the tool's descriptor so arguments can be checked locally.
/// Listing failures fall back to an unchecked descriptor.
pub(crate) async fn lookup_tool(
    controller: &InspectorController,
    target: &CallTarget,
    name: &str,
) -> ToolDescriptor {
    match controller.list_tools(target).await {
        Ok(tools) => match tools.into_iter().find(|tool| tool.name == name) {
            Some(tool) => tool,
            None => {
                warn!(
                    tool = %name,
                    target = %target.label(),
                    "Tool not listed; dispatching without a schema"
                );
                ToolDescriptor::named(name)
            }
        },
        Err(err) => {
            warn!(tool = %name, "Could not list tools, dispatching without a schema: {err}");
            ToolDescriptor::named(name)
        }
    }
}

pub(crate) fn argument_input(
    args: &CallArgs,
    tool: &ToolDescriptor,
) -> Result<ArgumentInput, Box<dyn Error>> {
    if let Some(path) = args.args_file.as_ref() {
        let text = fs::read_to_string(path)
            .map_err(|err| format!("Failed to read arguments from {}: {err}", path.display()))?;
        return Ok(ArgumentInput::Raw(text));
    }
    if let Some(text) = args.args.as_ref() {
        return Ok(ArgumentInput::Raw(text.clone()));
    }
    match (args.fill, tool.input_schema.as_ref()) {
        (Some(fill), Some(schema)) => Ok(ArgumentInput::Structured(fill_from_schema(
            schema,
            fill.into(),
        ))),
        (Some(_), None) => {
            warn!(tool = %tool.name, "Tool has no input schema; sending no arguments");
            Ok(ArgumentInput::Empty)
        }
        (None, _) => Ok(ArgumentInput::Empty),
    }
}

fn activity_sink(log_file: Option<String>) -> Result<Option<ActivitySink>, Box<dyn Error>> {
    let Some(path) = log_file else {
        return Ok(None);
    };
    let log = ActivityLog::open(path)?;
    debug!(path = %log.path(), "Recording call activity");
    let log = Arc::new(Mutex::new(log));
    let sink: ActivitySink = Arc::new(move |entry: &ActivityEntry| {
        let Ok(log) = log.lock() else {
            return;
        };
        if let Err(err) = log.record(&entry.to_string()) {
            warn!("Failed to write activity log: {err}");
        }
    });
    Ok(Some(sink))
}

/// Prints events as they arrive. The first Ctrl+C requests cancellation,
/// a second one stops following the call.
async fn follow_call(controller: &mut InspectorController) -> Result<CallPhase, Box<dyn Error>> {
    let mut printed = 0;
    let mut cancel_requested = false;

    while controller
        .panel()
        .active_call()
        .is_some_and(ActiveCall::is_subscribed)
    {
        let interrupted = tokio::select! {
            received = controller.next_update() => {
                if !received {
                    break;
                }
                false
            }
            signal = tokio::signal::ctrl_c() => signal.is_ok(),
        };

        for entry in controller.panel().events().since(printed) {
            if let Some(line) = format_event_line(entry) {
                println!("{line}");
            }
            printed = entry.sequence;
        }
        io::stdout().flush()?;
        print_notifications(controller);

        if !interrupted {
            continue;
        }
        if cancel_requested {
            let running_for = controller
                .panel()
                .active_call()
                .map(|call| (Utc::now() - call.started_at).num_seconds())
                .unwrap_or_default();
            eprintln!("⚠️  Stopped following the call after {running_for}s");
            eprintln!("   It may still be running on the backend");
            controller.stop_following();
            break;
        }
        cancel_requested = true;
        eprintln!("Cancelling… press Ctrl+C again to stop waiting");
        if controller.cancel(DEFAULT_CANCEL_REASON).await.is_err() {
            print_notifications(controller);
        }
    }

    Ok(controller.panel().phase())
}

pub(crate) fn format_event_line(entry: &EventLogEntry) -> Option<String> {
    let stamp = entry.received_at.format("%H:%M:%S%.3f");
    let text = match &entry.event {
        CallEvent::Started { session_id } => match session_id {
            Some(session_id) => format!("started (session {session_id})"),
            None => "started".to_string(),
        },
        CallEvent::Progress {
            progress,
            total,
            message,
        } => {
            let mut text = match total {
                Some(total) => format!("progress {progress}/{total}"),
                None => format!("progress {progress}"),
            };
            if let Some(message) = message.as_deref().filter(|m| !m.is_empty()) {
                text.push_str(": ");
                text.push_str(message);
            }
            text
        }
        CallEvent::Log {
            logger,
            level,
            data,
        } => {
            let level = level.as_deref().unwrap_or("info");
            let data = match data {
                Some(Value::String(text)) => text.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            };
            match logger {
                Some(logger) => format!("log [{level}] {logger}: {data}"),
                None => format!("log [{level}] {data}"),
            }
        }
        // Terminal events are reported once the call settles.
        _ => return None,
    };
    Some(format!("[{stamp}] {text}"))
}

fn print_notifications(controller: &mut InspectorController) {
    for notification in controller.panel_mut().drain_notifications() {
        match notification.kind {
            NotificationKind::Error => eprintln!("❌ {}", notification.message),
            NotificationKind::Warning => eprintln!("⚠️  {}", notification.message),
            NotificationKind::Success => eprintln!("✅ {}", notification.message),
            NotificationKind::Info => eprintln!("{}", notification.message),
        }
    }
}

pub(crate) fn exit_code(phase: CallPhase) -> i32 {
    match phase {
        CallPhase::Done => 0,
        CallPhase::Cancelled => 130,
        _ => 1,
    }
}

async fn shutdown(controller: InspectorController) {
    if let Err(err) = controller.shutdown().await {
        warn!("Failed to close session: {err}");
    }
}
