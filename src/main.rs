use reach_mode::display::{DisplayLayout, Rotation};
use reach_mode::input::TouchEvent;
use reach_mode::organizer::ImmediateOrganizer;
use reach_mode::service::ModeService;
use reach_mode::settings::Settings;
use reach_mode::settings_observer::SettingsStore;
use reach_mode::task_stack::TaskStackListenerImpl;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

const HELP: &str = "commands: start | stop | enable | disable | lock | unlock | \
keyguard on|off | rotate 0|90|180|270 | touch <x> <y> | app <task-id> | \
timeout <secs> | status | events | quit";

fn main() -> anyhow::Result<()> {
    let settings_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("settings.json"));
    let initial = Settings::load(&settings_path)?;
    reach_mode::logging::init(initial.debug_logging, initial.log_file.clone().map(PathBuf::from));

    let store = Arc::new(SettingsStore::open(&settings_path)?);
    let organizer = Arc::new(ImmediateOrganizer::default());
    let task_stack = Arc::new(TaskStackListenerImpl::new());
    let mut display = DisplayLayout::default();
    let service = ModeService::builder(organizer, store.clone())
        .task_stack(task_stack.clone())
        .display(display)
        .offset_percentage(initial.offset_percentage())
        .build()?;

    println!("{HELP}");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let Some(parts) = shlex::split(line.trim()) else {
            println!("could not parse: {line}");
            continue;
        };
        let args: Vec<&str> = parts.iter().map(String::as_str).collect();
        match args.as_slice() {
            [] => continue,
            ["start"] => service.start_mode(),
            ["stop"] => service.stop_mode(),
            ["enable"] => update_settings(&store, |s| s.enabled = true),
            ["disable"] => update_settings(&store, |s| s.enabled = false),
            ["lock"] => service.set_locked_disabled(true, false),
            ["unlock"] => service.set_locked_disabled(false, false),
            ["keyguard", "on"] => service.on_keyguard_visibility_changed(true),
            ["keyguard", "off"] => service.on_keyguard_visibility_changed(false),
            ["rotate", degrees] => {
                let rotation = match *degrees {
                    "0" => Rotation::Rotation0,
                    "90" => Rotation::Rotation90,
                    "180" => Rotation::Rotation180,
                    "270" => Rotation::Rotation270,
                    other => {
                        println!("unknown rotation: {other}");
                        continue;
                    }
                };
                display = display.rotated(rotation);
                service.on_display_changed(display);
            }
            ["touch", x, y] => match (x.parse::<f32>(), y.parse::<f32>()) {
                (Ok(x), Ok(y)) => {
                    let outcome = service.handle_touch(TouchEvent { x, y });
                    println!("{outcome:?}");
                }
                _ => println!("touch expects two numbers"),
            },
            ["app", task] => match task.parse::<i32>() {
                Ok(task_id) => task_stack.on_task_moved_to_front(task_id),
                Err(_) => println!("app expects a task id"),
            },
            ["timeout", secs] => match secs.parse::<u64>() {
                Ok(secs) => update_settings(&store, |s| s.timeout_secs = secs),
                Err(_) => println!("timeout expects seconds"),
            },
            ["status"] => {
                if let Some(state) = service.state() {
                    println!("{}", serde_json::to_string_pretty(&state)?);
                }
            }
            ["events"] => {
                for record in service.recent_events() {
                    println!("{} {:?}", record.at.format("%H:%M:%S%.3f"), record.event);
                }
            }
            ["quit"] | ["exit"] => break,
            _ => println!("{HELP}"),
        }
    }

    service.shutdown();
    Ok(())
}

fn update_settings<F>(store: &SettingsStore, f: F)
where
    F: FnOnce(&mut Settings),
{
    if let Err(err) = store.update(f) {
        tracing::error!(?err, "failed to update settings");
        println!("settings not saved: {err}");
    }
}
