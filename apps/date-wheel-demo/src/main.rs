use std::cell::RefCell;
use std::rc::Rc;

use wheel_core::{DependencySpec, SlotConfig};
use wheel_runtime_std::StdWheelRuntime;

const BASE_YEAR: i32 = 2000;
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn date_slots(log: Rc<RefCell<Vec<String>>>) -> Vec<SlotConfig> {
    vec![
        SlotConfig::new(31, 30)
            .with_stable_id("day")
            .with_width(48.0)
            .with_formatter(|day| (day + 1).to_string())
            .with_dependency(DependencySpec::days_in_month(1, 2, BASE_YEAR))
            .with_on_change(move |day| log.borrow_mut().push(format!("day -> {}", day + 1))),
        SlotConfig::new(12, 0)
            .with_stable_id("month")
            .with_formatter(|month| MONTHS[month % 12].to_string()),
        SlotConfig::new(50, 24)
            .with_stable_id("year")
            .with_width(72.0)
            .with_formatter(|offset| (BASE_YEAR + offset as i32).to_string()),
    ]
}

fn describe(runtime: &StdWheelRuntime) -> String {
    let manager = runtime.manager();
    let labels: Vec<String> = manager
        .configs()
        .iter()
        .zip(manager.selections())
        .map(|(config, &selection)| config.label(selection))
        .collect();
    let days = manager.configs().first().map_or(0, |day| day.item_count);
    format!("{} ({days} days in month)", labels.join(" "))
}

fn main() {
    env_logger::init();

    let day_changes = Rc::new(RefCell::new(Vec::new()));
    let mut runtime = StdWheelRuntime::default();
    runtime.manager_mut().subscribe(|event| {
        log::info!("revision {}: slots {:?} changed", event.revision, event.slots);
    });

    if let Err(err) = runtime
        .manager_mut()
        .initialize(date_slots(Rc::clone(&day_changes)))
    {
        log::error!("failed to initialize date picker: {err}");
        return;
    }
    println!("start:     {}", describe(&runtime));

    let steps = [("february", 1, 1), ("2023", 2, 23), ("july", 1, 6), ("2024", 2, 24)];
    for (name, slot, value) in steps {
        runtime.manager_mut().update_selection(slot, value);
        runtime.pump_frame();
        println!("{name:<10} {}", describe(&runtime));
    }

    let stats = runtime.manager().handle_stats();
    println!(
        "handles: {} allocated, {} reused, {} pooled, {} disposed",
        stats.allocated, stats.reused, stats.pooled, stats.disposed
    );
    for change in day_changes.borrow().iter() {
        println!("on_change: {change}");
    }
}
